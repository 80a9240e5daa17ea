//! Length computation and duration finalization (spec.md §4.5)
//!
//! Grounded on `examples/original_source/src/synth_renderer.c`'s
//! `synthRenderer_getNoteLengthAndUpdate` (the samples-per-compass formula
//! and bit-accumulation duration conversion) and the node-list reverse walk
//! the renderer itself uses to expand loops without re-synthesizing their
//! bodies. The walk direction is preserved per design note §9 ("reverse
//! iteration... is preserved, not an implementation accident").

use crate::arena::{Arena, TrackId};
use crate::error::CompileError;
use crate::model::{Node, Song};

/// Converts a track's `duration_units` note sequence into concrete sample
/// counts and caches the track's total/intro lengths.
///
/// Must run once per `(track, sample_rate)` pair before rendering; a
/// second call with the same sample rate is a no-op (the cache check in
/// `Track::cached_total_length`).
pub fn finalize_track(arena: &mut Arena, track_id: TrackId, song: &Song, sample_rate: u32) -> Result<(), CompileError> {
    if arena.track(track_id).cached_total_length().is_some() {
        return Ok(());
    }

    let samples_per_compass = (sample_rate as u64 * 240 / song.bpm.max(1) as u64) as u32;
    let time_signature = song.time_signature.max(1);

    let range = arena.track(track_id).nodes;
    let mut compass_position: u16 = 0;
    let mut compass_accrued: u32 = 0;

    for index in range.iter() {
        let units = match arena.node(index) {
            Node::Note(note) => note.duration_units,
            Node::Loop(_) => continue,
        };
        let (samples, new_position, new_accrued) =
            note_length_and_update(units, compass_position, compass_accrued, time_signature, samples_per_compass);
        compass_position = new_position;
        compass_accrued = new_accrued;

        if let Node::Note(note) = arena.node_mut(index) {
            note.duration_samples = samples;
            note.attack = (note.attack * samples as u32) / 100;
            note.keyoff = (note.keyoff * samples as u32) / 100;
            note.release = (note.release * samples as u32) / 100;
            note.check_invariant();
        }
    }

    let total = total_length(arena, range, None);
    let intro = match arena.track(track_id).loop_point {
        Some(loop_point) => total_length(arena, range, Some(loop_point)),
        None => total,
    };
    arena.track(track_id).set_cached_lengths(total, intro);
    Ok(())
}

/// `synthRenderer_getNoteLengthAndUpdate`: converts one note's duration
/// units into samples, absorbing integer-division rounding error at the
/// boundary of each compass so that compasses always sum to exactly
/// `samples_per_compass` regardless of how unevenly the fixed-point units
/// divide it.
fn note_length_and_update(
    units: u8,
    compass_position: u16,
    compass_accrued: u32,
    time_signature: u16,
    samples_per_compass: u32,
) -> (u32, u16, u32) {
    let new_position = compass_position + units as u16;
    if new_position >= time_signature {
        let samples = samples_per_compass - compass_accrued;
        (samples, new_position - time_signature, 0)
    } else {
        let samples = (samples_per_compass as u64 * units as u64 / time_signature as u64) as u32;
        (samples, new_position, compass_accrued + samples)
    }
}

/// Sums sample durations across a node range, expanding loop nodes by
/// their repeat count. Walked in reverse so that on hitting a loop
/// marker the cursor can jump straight past its body to
/// `jump_position`, having already folded the body's samples into
/// `repeat_count * (sum of nodes from jump_position up to the marker)` —
/// a forward walk would sum the body once on the way to the marker and
/// then again when expanding it (spec.md §4.5, design note §9: "reverse
/// iteration... is preserved, not an implementation accident").
///
/// `stop_before` restricts the sum to the prefix preceding that absolute
/// node index (used for intro-length: the span before the loop point).
fn total_length(arena: &Arena, range: crate::arena::NodeRange, stop_before: Option<u32>) -> u32 {
    let limit = stop_before.unwrap_or(range.start + range.len);
    let mut total: u32 = 0;
    let mut index = limit;
    while index > range.start {
        index -= 1;
        match arena.node(index) {
            Node::Note(note) => total += note.duration_samples,
            Node::Loop(loop_node) => {
                let body_len = range_length(arena, loop_node.jump_position, index);
                total += body_len * loop_node.repeat_count;
                // Skip the body entirely; its samples are already folded
                // into `body_len` above.
                index = loop_node.jump_position;
            }
        }
    }
    total
}

/// Sums sample durations of the nodes in `[start, end)`, expanding any
/// loop nodes found within by their repeat count. A forward walk is safe
/// here (unlike [`total_length`]'s outer walk) because this range never
/// itself straddles the boundary of an enclosing loop's body — it either
/// *is* one loop's body or a loop-free span.
///
/// Exposed for renderers that need to size a loop body's output buffer
/// before synthesizing into it.
pub fn range_length(arena: &Arena, start: u32, end: u32) -> u32 {
    let mut total = 0;
    let mut index = start;
    while index < end {
        match arena.node(index) {
            Node::Note(note) => total += note.duration_samples,
            Node::Loop(loop_node) => {
                let body_len = range_length(arena, loop_node.jump_position, index);
                total += body_len * loop_node.repeat_count;
            }
        }
        index += 1;
    }
    total
}

/// Checks whether every track in a song can be expressed as a single
/// open-ended loop for seamless playback: each track must have a loop
/// point, and the sample offset of that loop point must be identical
/// across tracks (otherwise the tracks would drift out of phase on
/// repeat). Returns `Ok(())` if so, else the specific mismatch error.
///
/// Requires `finalize_track` to have already run for every track in
/// `song`; a track whose lengths aren't cached yet reports `NotLoopable`
/// the same as one with no loop point at all, since neither can answer
/// the question this function asks.
pub fn check_song_loopable(arena: &Arena, song: &Song) -> Result<(), CompileError> {
    let mut reference_intro: Option<u32> = None;
    for &track_id in &song.tracks {
        let track = arena.track(track_id);
        if track.loop_point.is_none() {
            return Err(CompileError::NotLoopable);
        }
        let intro = track.cached_intro_length().ok_or(CompileError::NotLoopable)?;
        match reference_intro {
            None => reference_intro = Some(intro),
            Some(expected) if expected != intro => return Err(CompileError::ComplexLoopPoint),
            Some(_) => {}
        }
    }
    Ok(())
}
