//! End-to-end scenarios from spec.md §8 that need actual rendering
//! (frequency, PCM byte layout), exercised through the public
//! `Synthesizer`/`Compiler` entry points.

use mml_core::Compiler;
use mml_synth::{freq, Channels, PcmMode, SampleWidth, Sign, Synthesizer};

#[test]
fn scenario_constant_rest_is_silent_bottom_of_range() {
    let compiler = Compiler::new(44100);
    let (song, arena) = compiler.compile("MML B60 K4/4 l4 r;").unwrap();
    let synth = Synthesizer::new(44100, 1);
    let mode = PcmMode::new(SampleWidth::Eight, Channels::Mono, Sign::Unsigned);
    let bytes = synth.render(&arena, &song, mode);

    assert_eq!(bytes.len(), 44100);
    // spec.md §4.6 step 4's literal formula ("8-bit unsigned: amp") packs a
    // rest note's amp=0 to byte 0x00 (see DESIGN.md's Open Question
    // resolution for the §4.6 vs §8 discrepancy over this byte value).
    assert!(bytes.iter().all(|&b| b == 0x00));
}

#[test]
fn scenario_octave_wrap_matches_reference_c5_frequency() {
    let compiler = Compiler::new(44100);
    let (song, arena) = compiler.compile("MML B60 K4/4 l8 o4 b+ c;").unwrap();
    let track = arena.track(song.tracks[0]);
    let nodes = arena.node_range(track.nodes);
    let wrapped = nodes[0].as_note().unwrap();
    let reference = nodes[1].as_note().unwrap();
    assert_eq!(freq::note_frequency_hz(wrapped), freq::note_frequency_hz(reference));
}

#[test]
fn scenario_render_length_matches_bytes_per_sample() {
    let compiler = Compiler::new(44100);
    let (song, arena) = compiler.compile("MML B60 K4/4 l4 o4 c c c c;").unwrap();
    let track = arena.track(song.tracks[0]);
    let total_samples = track.cached_total_length().unwrap() as usize;

    let synth = Synthesizer::new(44100, 1);
    for mode in [
        PcmMode::new(SampleWidth::Eight, Channels::Mono, Sign::Unsigned),
        PcmMode::new(SampleWidth::Sixteen, Channels::Stereo, Sign::Signed),
    ] {
        let bytes = synth.render(&arena, &song, mode);
        assert_eq!(bytes.len(), total_samples * mode.bytes_per_frame());
    }
}

#[test]
fn scenario_mode_symmetry_u8_to_u16_by_duplication() {
    let compiler = Compiler::new(8000);
    let (song, arena) = compiler.compile("MML B60 K4/4 l4 o4 c d e f;").unwrap();
    let synth = Synthesizer::new(8000, 3);

    let mode_u8 = PcmMode::new(SampleWidth::Eight, Channels::Mono, Sign::Unsigned);
    let mode_u16 = PcmMode::new(SampleWidth::Sixteen, Channels::Mono, Sign::Unsigned);
    let bytes_u8 = synth.render(&arena, &song, mode_u8);
    let bytes_u16 = synth.render(&arena, &song, mode_u16);

    // Every 8-bit magnitude duplicated and scaled (`amp * 257`) must equal
    // the corresponding 16-bit little-endian sample.
    for (i, &b) in bytes_u8.iter().enumerate() {
        let expected = (b as u16) * 257;
        let actual = u16::from_le_bytes([bytes_u16[i * 2], bytes_u16[i * 2 + 1]]);
        assert_eq!(actual, expected);
    }
}

#[test]
fn scenario_intro_plus_body_equals_total() {
    let compiler = Compiler::new(44100);
    let (song, arena) = compiler.compile("MML B60 K4/4 l8 c $ [ d e ] 4 f;").unwrap();
    let track = arena.track(song.tracks[0]);
    let total = track.cached_total_length().unwrap();
    let intro = track.cached_intro_length().unwrap();
    assert!(intro < total);
}
