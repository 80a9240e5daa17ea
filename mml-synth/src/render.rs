//! Per-track and per-note rendering (spec.md §4.6).
//!
//! Grounded on `examples/original_source/src/synth_note.c`'s
//! `synth_note_synthesize` (phase computation, pan gating) and spec.md's
//! reverse node-walk loop-expansion strategy (the same walk direction as
//! `mml_core::length`, so a loop's body is rendered once and the repeats
//! are a backward `copy_within` rather than re-synthesized).
//!
//! Per-sample amplitude stays in the `[0, 255]` domain spec.md §4.6 steps
//! 1-3 describe (`left = amp*(100-pan)/100`, `right = amp*pan/100`); the
//! original C scales straight to a 16-bit range with a `0x7fff`/`25600`
//! constant because it only ever emits 16-bit audio, but since this output
//! also supports 8-bit and signed modes, that scaling is deferred to
//! `format.rs` (step 4), which is the only stage that knows the target
//! width and sign.

use mml_core::arena::{Arena, TrackId};
use mml_core::length::range_length;
use mml_core::model::{Node, Note};

use crate::freq;
use crate::prng::Prng;
use crate::waveform;

/// Renders one track to a fresh stereo buffer pair, sized to the track's
/// cached total length. `finalize_track` must have already run for this
/// track at `sample_rate`.
pub fn render_track(arena: &Arena, track_id: TrackId, sample_rate: u32, prng: &mut Prng) -> (Vec<i32>, Vec<i32>) {
    let track = arena.track(track_id);
    let total = track
        .cached_total_length()
        .expect("track must be finalized (mml_core::length::finalize_track) before rendering") as usize;
    let mut left = vec![0i32; total];
    let mut right = vec![0i32; total];
    let range = track.nodes;
    render_range(arena, range.start, range.start + range.len, sample_rate, prng, &mut left, &mut right);
    (left, right)
}

/// Walks `[start, end)` in reverse, writing samples backward into `left`/
/// `right` (both exactly as long as this range's total sample count).
fn render_range(
    arena: &Arena,
    start: u32,
    end: u32,
    sample_rate: u32,
    prng: &mut Prng,
    left: &mut [i32],
    right: &mut [i32],
) {
    let mut cursor = left.len();
    let mut index = end;
    while index > start {
        index -= 1;
        match arena.node(index) {
            Node::Note(note) => {
                let len = note.duration_samples as usize;
                cursor -= len;
                render_note(arena, note, sample_rate, prng, &mut left[cursor..cursor + len], &mut right[cursor..cursor + len]);
            }
            Node::Loop(loop_node) => {
                let body_start = loop_node.jump_position;
                let body_len = range_length(arena, body_start, index) as usize;
                cursor -= body_len;
                let block_end = cursor + body_len;
                render_range(arena, body_start, index, sample_rate, prng, &mut left[cursor..block_end], &mut right[cursor..block_end]);

                // parse_loop_stmt rejects repeat_count == 0 (infinite loops
                // aren't implemented yet), so repeat_count is always >= 1
                // here; the remaining repetitions are the same samples, so
                // copy rather than re-synthesize.
                let mut block_start = cursor;
                for _ in 1..loop_node.repeat_count {
                    let new_start = block_start - body_len;
                    left.copy_within(block_start..block_start + body_len, new_start);
                    right.copy_within(block_start..block_start + body_len, new_start);
                    block_start = new_start;
                }
                cursor = block_start;
            }
        }
    }
}

/// Synthesizes one note into `left`/`right` (each exactly
/// `note.duration_samples` long). Rest notes leave the buffers silent.
fn render_note(arena: &Arena, note: &Note, sample_rate: u32, prng: &mut Prng, left: &mut [i32], right: &mut [i32]) {
    let Some(note_freq) = freq::note_frequency_hz(note) else {
        return;
    };
    let spc = (sample_rate / note_freq.max(1)).max(1);
    let duration = note.duration_samples.max(1) as u64;
    let envelope = arena.envelope(note.envelope);

    let to_position = |samples: u32| -> u16 { ((samples as u64 * 1024) / duration).min(1023) as u16 };
    let attack_pos = to_position(note.attack);
    let keyoff_pos = to_position(note.keyoff);
    let release_pos = to_position(note.release);

    for i in 0..left.len() {
        let phase = (((i as u64 % spc as u64) * 1024) / spc as u64) as u16;
        let wave_amp = waveform::amplitude_at(note.waveform, phase, prng) as u32;
        let env_pos = to_position(i as u32);
        let env_amp = envelope.amplitude_at(env_pos, (attack_pos, keyoff_pos, release_pos)) as u32;
        let mut amp = wave_amp * env_amp / 255;

        // Gate to zero at keyoff, ramping linearly over [keyoff, release].
        if i as u32 >= note.release {
            amp = 0;
        } else if i as u32 >= note.keyoff {
            let span = (note.release - note.keyoff).max(1);
            let remaining = note.release - i as u32;
            amp = amp * remaining / span;
        }

        left[i] += (amp * (100 - note.pan as u32) / 100) as i32;
        right[i] += (amp * note.pan as u32 / 100) as i32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mml_core::Compiler;

    #[test]
    fn test_rest_track_is_silent() {
        let compiler = Compiler::new(8000);
        let (song, arena) = compiler.compile("MML B60 K4/4 l4 r;").unwrap();
        let mut prng = Prng::new(1);
        let (left, right) = render_track(&arena, song.tracks[0], 8000, &mut prng);
        assert!(left.iter().all(|&s| s == 0));
        assert!(right.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_tone_track_produces_sound() {
        let compiler = Compiler::new(8000);
        let (song, arena) = compiler.compile("MML B60 K4/4 l4 o4 c;").unwrap();
        let mut prng = Prng::new(1);
        let (left, right) = render_track(&arena, song.tracks[0], 8000, &mut prng);
        assert!(left.iter().any(|&s| s != 0) || right.iter().any(|&s| s != 0));
    }

    #[test]
    fn test_buffer_length_matches_cached_total() {
        let compiler = Compiler::new(8000);
        let (song, arena) = compiler.compile("MML B60 K4/4 l4 c c c c;").unwrap();
        let track = arena.track(song.tracks[0]);
        let total = track.cached_total_length().unwrap() as usize;
        let mut prng = Prng::new(1);
        let (left, right) = render_track(&arena, song.tracks[0], 8000, &mut prng);
        assert_eq!(left.len(), total);
        assert_eq!(right.len(), total);
    }

    #[test]
    fn test_loop_expansion_renders_repeated_blocks_identically() {
        let compiler = Compiler::new(8000);
        let (song, arena) = compiler.compile("MML B60 K4/4 l8 [ c d ] 3;").unwrap();
        let mut prng = Prng::new(1);
        // Use a fixed-output waveform path: noise would differ per call, so
        // this check only makes sense for deterministic waveforms, which is
        // the instrument default (Square50).
        let (left, _right) = render_track(&arena, song.tracks[0], 8000, &mut prng);
        let third = left.len() / 3;
        assert_eq!(left[0..third], left[third..2 * third]);
        assert_eq!(left[0..third], left[2 * third..3 * third]);
    }
}
