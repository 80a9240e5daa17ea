//! Software synthesizer rendering `mml-core` compiled songs to raw PCM.
//!
//! Pipeline: [`render::render_track`] synthesizes each track into a stereo
//! `[0, 255]`-amplitude scratch buffer, [`mixer::mix_tracks`] accumulates
//! them with saturation, and a [`format::PcmMode`] packs the result into
//! bytes. [`Synthesizer`] wires the three stages together for a whole song.

pub mod format;
pub mod freq;
pub mod mixer;
pub mod prng;
pub mod render;
pub mod waveform;

use mml_core::arena::Arena;
use mml_core::model::Song;

pub use format::{Channels, PcmMode, SampleWidth, Sign};
pub use prng::Prng;

/// Renders a whole compiled song to PCM bytes at a given sample rate and
/// output mode. Each track gets its own [`Prng`] instance seeded from a
/// running counter derived from `seed`, per spec.md §5's "each thread
/// needs its own PRNG instance if any track uses noise" — rendering one
/// song single-threaded still keeps the streams independent so adding a
/// noise track never perturbs its neighbors' output.
pub struct Synthesizer {
    sample_rate: u32,
    seed: u32,
}

impl Synthesizer {
    pub fn new(sample_rate: u32, seed: u32) -> Self {
        Synthesizer { sample_rate, seed }
    }

    /// Renders every track in `song` and mixes them into one `[0, 255]`-
    /// amplitude stereo buffer pair, before any PCM packing. Exposed so
    /// callers that need the raw mix (e.g. a WAV container writer that
    /// wants standard centered samples regardless of the requested
    /// [`PcmMode`]'s sign) don't have to re-render to get it.
    pub fn render_mixed(&self, arena: &Arena, song: &Song) -> (Vec<i32>, Vec<i32>) {
        let buffers: Vec<(Vec<i32>, Vec<i32>)> = song
            .tracks
            .iter()
            .enumerate()
            .map(|(i, &track_id)| {
                let mut prng = Prng::new(self.seed.wrapping_add(i as u32));
                render::render_track(arena, track_id, self.sample_rate, &mut prng)
            })
            .collect();
        mixer::mix_tracks(&buffers)
    }

    /// Renders every track in `song` and mixes them into one PCM byte
    /// buffer in `mode`. `arena` must already be finalized for this
    /// synthesizer's sample rate (`mml_core::length::finalize_track` for
    /// every track in the song).
    pub fn render(&self, arena: &Arena, song: &Song, mode: PcmMode) -> Vec<u8> {
        let (left, right) = self.render_mixed(arena, song);
        mode.pack(&left, &right)
    }
}
