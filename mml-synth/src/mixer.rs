//! Song-level mixing: accumulates each track's rendered buffer into one
//! output buffer (spec.md §4.6 "Song rendering").
//!
//! Shape follows `nether-qoa/src/encode.rs`'s frame-accumulation loop
//! style: a plain index-driven fold, no intermediate allocation beyond the
//! output itself.

/// Sums every track's left/right samples into one pair of buffers sized to
/// the longest track, saturating each sample to the renderer's canonical
/// `[0, 255]` amplitude domain. Shorter tracks simply stop contributing
/// once their own samples run out.
pub fn mix_tracks(tracks: &[(Vec<i32>, Vec<i32>)]) -> (Vec<i32>, Vec<i32>) {
    let total_len = tracks.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
    let mut left = vec![0i32; total_len];
    let mut right = vec![0i32; total_len];

    for (track_left, track_right) in tracks {
        for i in 0..track_left.len() {
            left[i] = (left[i] + track_left[i]).clamp(0, 255);
            right[i] = (right[i] + track_right[i]).clamp(0, 255);
        }
    }

    (left, right)
}
