//! End-to-end scenarios from spec.md §8, exercised through the public
//! `Compiler` entry point rather than any single internal module.

use mml_core::{CompileError, Compiler};

#[test]
fn scenario_constant_rest() {
    let compiler = Compiler::new(44100);
    let (song, arena) = compiler.compile("MML B60 K4/4 l4 r;").unwrap();
    let track = arena.track(song.tracks[0]);
    assert_eq!(track.cached_total_length(), Some(44100));
    assert_eq!(track.cached_intro_length(), Some(44100));
}

#[test]
fn scenario_loop_expansion_note_sequence() {
    let compiler = Compiler::new(44100);
    let (song, arena) = compiler.compile("MML B60 K4/4 l8 [ c d ] 3;").unwrap();
    let track = arena.track(song.tracks[0]);
    let eighth = 44100 * 4 / 8;
    assert_eq!(track.cached_total_length(), Some(eighth * 6));
}

#[test]
fn scenario_compass_overflow_within_a_bar() {
    let compiler = Compiler::new(44100);
    // Three quarter notes then a half note overshoots 4/4 from within the
    // bar; a plain fifth quarter note would not (the compass resets after
    // the fourth note exactly fills the bar — see
    // mml_core::parser::tests::test_compass_resets_at_bar_boundary).
    let err = compiler.compile("MML B60 K4/4 l4 c c c c2;").unwrap_err();
    assert_eq!(err.error, CompileError::CompassOverflow);
}

#[test]
fn scenario_straight_sequence_spans_multiple_bars() {
    let compiler = Compiler::new(44100);
    let (song, arena) = compiler.compile("MML B120 K4/4 l4 o4 c d e f g a b o5 c;").unwrap();
    let track = arena.track(song.tracks[0]);
    assert_eq!(track.nodes.len, 8);
}

#[test]
fn scenario_loop_point_intro_and_total() {
    let compiler = Compiler::new(44100);
    let (song, arena) = compiler.compile("MML B60 K4/4 l4 c $ d e f;").unwrap();
    let track = arena.track(song.tracks[0]);
    let quarter = 44100;
    assert_eq!(track.cached_intro_length(), Some(quarter));
    assert_eq!(track.cached_total_length(), Some(quarter * 4));
    assert_eq!(compiler.check_loopable(&arena, &song), Ok(()));
}

#[test]
fn scenario_octave_wrap_transposes_frequency() {
    let compiler = Compiler::new(44100);
    let (song, arena) = compiler.compile("MML B60 K4/4 l8 o4 b+ c;").unwrap();
    let track = arena.track(song.tracks[0]);
    let nodes = arena.node_range(track.nodes);
    let first = nodes[0].as_note().unwrap();
    let second = nodes[1].as_note().unwrap();
    // b+ in octave 4 must land on the same (pitch, octave) as a plain c5.
    assert_eq!((first.pitch, first.octave), (second.pitch, second.octave));
}

#[test]
fn scenario_macro_expansion_end_to_end() {
    let mut compiler = Compiler::new(44100);
    compiler.define_macro("arp", "c8 e8 g8");
    let (song, arena) = compiler.compile("MML B60 K4/4 j _arp_;").unwrap();
    let track = arena.track(song.tracks[0]);
    assert_eq!(track.nodes.len, 3);
}

#[test]
fn scenario_multi_track_song_shares_header() {
    let compiler = Compiler::new(44100);
    let (song, arena) = compiler.compile("MML B60 K4/4 l4 o4 c d e f; l4 o5 g a b c;").unwrap();
    assert_eq!(song.tracks.len(), 2);
    for &track_id in &song.tracks {
        let track = arena.track(track_id);
        assert_eq!(track.cached_total_length(), Some(44100 * 4));
    }
}

#[test]
fn scenario_not_loopable_reports_error_not_panic() {
    let compiler = Compiler::new(44100);
    let (song, arena) = compiler.compile("MML B60 K4/4 l4 c;").unwrap();
    assert_eq!(compiler.check_loopable(&arena, &song), Err(CompileError::NotLoopable));
}
