//! MML (Music Macro Language) lexer, parser, and compiled song model.
//!
//! The pipeline is lex -> parse -> finalize: [`parser::Parser`] drives the
//! [`lexer::Lexer`] to build a [`model::Song`] of tracks in an [`arena::Arena`],
//! then [`length::finalize_track`] converts each note's fixed-point duration
//! into concrete sample counts for a chosen sample rate. [`Compiler`] wraps
//! all three stages behind one call.

pub mod arena;
pub mod error;
pub mod length;
pub mod lexer;
pub mod macros;
pub mod model;
pub mod parser;
pub mod token;
pub mod volume;

pub use arena::Arena;
pub use error::{CompileError, ContextualError, LineContext};
pub use macros::MacroTable;
pub use model::{Instrument, Node, Song, Track, Waveform};

/// Compiles MML source text into a [`Song`] housed in an [`Arena`], with
/// every track's note durations resolved to samples at a fixed sample rate.
///
/// Mirrors the source's `synth_compile` entry point: one call that takes
/// source text and a host-supplied macro/instrument environment and returns
/// either a fully finalized song or the first error encountered.
pub struct Compiler {
    macros: MacroTable,
    sample_rate: u32,
}

impl Compiler {
    pub fn new(sample_rate: u32) -> Self {
        Compiler { macros: MacroTable::new(), sample_rate }
    }

    /// Registers a macro body available to `j STRING` / `m STRING` calls.
    pub fn define_macro(&mut self, name: impl Into<String>, body: impl Into<String>) {
        self.macros.define(name, body);
    }

    /// Lexes, parses, and finalizes `source` into a [`Song`] backed by a
    /// fresh [`Arena`]. To supply instrument presets (the grammar has no
    /// syntax for *defining* one, only for recalling it via `i NUMBER`),
    /// push them onto your own `Arena` first and call
    /// [`compile_into`](Self::compile_into) instead.
    pub fn compile(&self, source: &str) -> Result<(Song, Arena), ContextualError> {
        let mut arena = Arena::new();
        let song = self.compile_into(source, &mut arena)?;
        Ok((song, arena))
    }

    /// Same as [`compile`](Self::compile), but parses into a caller-owned
    /// arena so instrument presets registered beforehand remain reachable
    /// by the `i NUMBER` command.
    pub fn compile_into(&self, source: &str, arena: &mut Arena) -> Result<Song, ContextualError> {
        let song = {
            let mut parser = parser::Parser::new(source, arena, &self.macros);
            parser.parse_song()?
        };
        for &track_id in &song.tracks {
            let ctx_err = |e: CompileError| ContextualError {
                error: e,
                context: LineContext { line: 0, column: 0, excerpt: String::new() },
            };
            length::finalize_track(arena, track_id, &song, self.sample_rate).map_err(ctx_err)?;
        }
        Ok(song)
    }

    /// Checks whether the song can be expressed as a single open-ended loop
    /// (every track shares a loop point at the same sample offset). Requires
    /// the song to have already gone through [`compile`](Self::compile) or
    /// [`compile_into`](Self::compile_into).
    pub fn check_loopable(&self, arena: &Arena, song: &Song) -> Result<(), CompileError> {
        length::check_song_loopable(arena, song)
    }
}
