//! Recursive-descent parser: tokens -> compiled song (spec.md §4.4)
//!
//! Control flow follows `nether-xm::parser` (`Result`-returning functions
//! walking a cursor, one function per structural unit); semantic checks
//! (compass overflow, loop-point uniqueness, octave range) are grounded on
//! `examples/original_source/src/synth_parser.c` and `synth_track.c`.

use std::collections::VecDeque;

use crate::arena::{Arena, InstrumentId, NodeRange, TrackId};
use crate::error::{CompileError, ContextualError, LineContext};
use crate::lexer::Lexer;
use crate::macros::MacroTable;
use crate::model::{Instrument, LoopNode, Node, Note, Song, Track, Waveform};
use crate::token::{Pitch, Token};
use crate::volume::Envelope;

/// A power-of-two duration number converted to 6-bit fixed-point compass
/// units (spec.md's glossary: a whole note is `0x40`).
fn duration_units_from_number(n: u16) -> Option<u8> {
    match n {
        1 => Some(64),
        2 => Some(32),
        4 => Some(16),
        8 => Some(8),
        16 => Some(4),
        32 => Some(2),
        64 => Some(1),
        _ => None,
    }
}

struct MacroFrame {
    name: String,
    tokens: VecDeque<Token>,
}

/// Parser state for a single `compile` call. Constructed fresh per
/// compilation; owns no long-lived global state (design note §9).
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    arena: &'a mut Arena,
    macros: &'a MacroTable,
    frames: Vec<MacroFrame>,
    current: Token,

    octave: u8,
    default_duration: Option<u8>,
    /// Whether `l NUMBER` has been seen yet in this track. Notes fall back
    /// to a quarter-note default even before this is true; the
    /// attack/keyoff/release percentage commands require it explicitly
    /// (spec.md §4.4: "setting them before setting duration is an error").
    duration_explicitly_set: bool,
    /// The "current instrument": copied onto every note pushed from this
    /// point on (copy-on-write, spec.md §4.4) until the next `w`/`p`/`t`/
    /// `k`/`q`/`v`/`i` mutates it again.
    instrument: Instrument,

    compass_accum: u16,
    time_signature: u16,
    /// Depth of currently-open `[ ... ]` loops in this track.
    loop_depth: u32,
    loop_point: Option<u32>,
    track_node_count: u32,
    bpm: u8,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, arena: &'a mut Arena, macros: &'a MacroTable) -> Self {
        Parser {
            lexer: Lexer::new(source),
            arena,
            macros,
            frames: Vec::new(),
            current: Token::EndOfInput,
            octave: 4,
            default_duration: Some(16), // quarter note, matches common MML defaults
            duration_explicitly_set: false,
            instrument: Instrument::default(),
            compass_accum: 0,
            time_signature: 0x40, // 4/4 default: four quarter notes (16 units each)
            loop_depth: 0,
            loop_point: None,
            track_node_count: 0,
            bpm: 120,
        }
    }

    fn line_context(&self) -> LineContext {
        self.lexer.line_context()
    }

    fn fail(&self, error: CompileError) -> ContextualError {
        ContextualError { error, context: self.line_context() }
    }

    fn next_raw(&mut self) -> Result<Token, CompileError> {
        loop {
            if let Some(frame) = self.frames.last_mut() {
                if let Some(tok) = frame.tokens.pop_front() {
                    return Ok(tok);
                }
                self.frames.pop();
                continue;
            }
            return self.lexer.get_next_token(self.arena);
        }
    }

    fn advance(&mut self) -> Result<(), CompileError> {
        loop {
            let tok = self.next_raw()?;
            if matches!(tok, Token::Comment) {
                continue;
            }
            self.current = tok;
            return Ok(());
        }
    }

    fn expect_number(&mut self) -> Result<u16, CompileError> {
        match self.current {
            Token::Number(n) => {
                self.advance()?;
                Ok(n)
            }
            other => Err(CompileError::UnexpectedToken { expected: "NUMBER", found: other.name() }),
        }
    }

    // ------------------------------------------------------------------
    // Macro expansion
    // ------------------------------------------------------------------

    fn expand_macro(&mut self) -> Result<(), CompileError> {
        // `self.current` is LOAD or MACRO; consume it and read the name.
        self.advance()?;
        let name = match self.current {
            Token::String(id) => self.arena.string(id).to_string(),
            other => {
                return Err(CompileError::UnexpectedToken { expected: "STRING", found: other.name() })
            }
        };
        if self.frames.iter().any(|f| f.name == name) {
            return Err(CompileError::MacroRecursion { name });
        }
        let body = self.macros.get(&name).ok_or(CompileError::InvalidIndex)?.to_string();
        let mut tokens = VecDeque::new();
        {
            let mut sub_lexer = Lexer::new(&body);
            loop {
                let t = sub_lexer.get_next_token(self.arena)?;
                match t {
                    Token::EndOfInput => break,
                    Token::Comment => continue,
                    other => tokens.push_back(other),
                }
            }
        }
        self.frames.push(MacroFrame { name, tokens });
        self.advance()
    }

    // ------------------------------------------------------------------
    // Grammar
    // ------------------------------------------------------------------

    /// `song := header track ( END track )*`
    pub fn parse_song(&mut self) -> Result<Song, ContextualError> {
        self.advance().map_err(|e| self.fail(e))?;
        self.parse_header().map_err(|e| self.fail(e))?;

        let mut tracks = Vec::new();
        loop {
            let track_id = self.parse_track()?;
            tracks.push(track_id);
            if matches!(self.current, Token::EndOfTrack) {
                self.advance().map_err(|e| self.fail(e))?;
            }
            if matches!(self.current, Token::EndOfInput) {
                break;
            }
        }

        Ok(Song { tracks, bpm: self.bpm, time_signature: self.time_signature, use_new_envelope: true })
    }

    /// `header := ( MML )? ( BPM NUMBER )? ( KEY NUMBER '/' NUMBER )?`
    fn parse_header(&mut self) -> Result<(), CompileError> {
        if matches!(self.current, Token::Unknown(b'M')) {
            // "MML" marker: a fixed three-letter keyword outside the
            // single-character catalog (spec.md §8's scenarios all begin
            // with it). Recognized here as a literal lookahead rather than
            // by the lexer, since it is the sole multi-character keyword
            // in the grammar.
            self.consume_mml_marker()?;
        }
        if matches!(self.current, Token::Bpm) {
            self.advance()?;
            let n = self.expect_number()?;
            if !(6..=255).contains(&n) {
                return Err(CompileError::ValueRange { max_value: 255 });
            }
            self.bpm = n as u8;
        }
        if matches!(self.current, Token::TimeSignature) {
            self.advance()?;
            let num = self.expect_number()?;
            match self.current {
                Token::Slash => self.advance()?,
                other => {
                    return Err(CompileError::UnexpectedToken { expected: "/", found: other.name() })
                }
            }
            let den = self.expect_number()?;
            if den == 0 {
                return Err(CompileError::ValueRange { max_value: 64 });
            }
            // `num` beats of a `den`th note: in 6-bit fixed-point units
            // that's num * (64 / den).
            let unit = duration_units_from_number(den).ok_or(CompileError::ValueRange { max_value: 64 })?;
            self.time_signature = num * unit as u16;
        }
        Ok(())
    }

    /// Matches the literal "MML" keyword by peeking two more raw
    /// characters after the 'M' the lexer already tagged `Unknown`.
    fn consume_mml_marker(&mut self) -> Result<(), CompileError> {
        // `self.current` is Unknown(b'M'); read two more tokens expecting
        // 'M' then 'L', both of which the plain lexer also reports as
        // Unknown since neither is in the single-character catalog.
        self.advance()?;
        if !matches!(self.current, Token::Unknown(b'M')) {
            return Err(CompileError::InvalidToken);
        }
        self.advance()?;
        if !matches!(self.current, Token::Unknown(b'L')) {
            // 'L' is likewise outside the single-char catalog.
            return Err(CompileError::InvalidToken);
        }
        self.advance()
    }

    /// `track := ( stmt )* ( LOOP_POINT ( stmt )* )?`
    fn parse_track(&mut self) -> Result<TrackId, ContextualError> {
        self.compass_accum = 0;
        self.loop_depth = 0;
        self.loop_point = None;
        self.duration_explicitly_set = false;
        let start = self.arena.next_node_index();
        self.track_node_count = 0;

        while !matches!(self.current, Token::EndOfTrack | Token::EndOfInput) {
            self.parse_stmt().map_err(|e| self.fail(e))?;
        }

        if self.loop_depth != 0 {
            return Err(self.fail(CompileError::BadLoopStart));
        }
        if self.track_node_count == 0 {
            return Err(self.fail(CompileError::EmptySequence));
        }

        let range = NodeRange { start, len: self.arena.next_node_index() - start };
        let track = Track::new(range, self.loop_point);
        Ok(self.arena.push_track(track))
    }

    fn parse_stmt(&mut self) -> Result<(), CompileError> {
        match self.current {
            Token::Note(_) => self.parse_note_stmt(),
            Token::LoopStart => self.parse_loop_stmt(),
            Token::LoopEnd => Err(CompileError::BadLoopEnd),
            Token::Repeat => self.parse_loop_point(),
            Token::Load | Token::Macro => self.expand_macro(),
            _ => self.parse_mod_stmt(),
        }
    }

    fn parse_loop_point(&mut self) -> Result<(), CompileError> {
        if self.loop_point.is_some() {
            return Err(CompileError::BadLoopPoint);
        }
        self.loop_point = Some(self.arena.next_node_index());
        self.advance()
    }

    /// `loop_stmt := LOOP_START stmt+ LOOP_END ( NUMBER )?`
    fn parse_loop_stmt(&mut self) -> Result<(), CompileError> {
        self.advance()?; // consume '['
        let body_start = self.arena.next_node_index();
        self.loop_depth += 1;

        let mut body_count = 0u32;
        while !matches!(self.current, Token::LoopEnd) {
            if matches!(self.current, Token::EndOfTrack | Token::EndOfInput) {
                return Err(CompileError::BadLoopStart);
            }
            self.parse_stmt()?;
            body_count += 1;
        }
        if body_count == 0 {
            return Err(CompileError::EmptySequence);
        }
        self.advance()?; // consume ']'

        let repeat_count = if let Token::Number(n) = self.current {
            self.advance()?;
            n as u32
        } else {
            2
        };
        // spec.md §3: `repeat_count == 0` means infinite, only legal at the
        // end of a track. Neither `length::total_length` nor `render::
        // render_range` implement unbounded loop bodies yet (both size their
        // buffers from a finite cached total), so this is rejected for now
        // rather than silently producing a track that panics on render.
        if repeat_count == 0 {
            return Err(CompileError::FunctionNotImplemented);
        }

        self.loop_depth -= 1;
        self.arena.push_node(Node::Loop(LoopNode { repeat_count, jump_position: body_start }));
        self.track_node_count += 1;
        Ok(())
    }

    /// `note_stmt := NOTE ( NUMBER )? ( HALF_DURATION )* ( NOTE_EXTENSION ... )*`
    fn parse_note_stmt(&mut self) -> Result<(), CompileError> {
        let pitch = match self.current {
            Token::Note(p) => p,
            _ => unreachable!("parse_note_stmt called on non-NOTE token"),
        };
        self.advance()?;

        // Octave wrap persists: raising B into C (or lowering C into B)
        // shifts the parser's octave context itself, not just this one
        // note (spec.md §8 scenario 6 — the following note inherits it).
        let resolved_pitch = resolve_octave_wrap(pitch, &mut self.octave);
        let octave = self.octave;

        let mut duration_units = self.parse_duration_and_dots()?;
        while matches!(self.current, Token::NoteExtension) {
            self.advance()?;
            duration_units = duration_units.saturating_add(self.parse_duration_and_dots()?);
        }

        self.accumulate_compass(duration_units)?;

        let envelope = self.instrument.envelope;
        // `attack`/`keyoff`/`release` hold the instrument's percentages
        // (0-100) until `length::finalize_track` converts them to sample
        // offsets once a sample rate is known (spec.md §4.4/§4.5: duration
        // and lifecycle points both bottom out on the render-time sample
        // rate, not something the parser has).
        let note = Note {
            pitch: resolved_pitch,
            octave,
            duration_units,
            duration_samples: 0,
            pan: self.instrument.pan,
            waveform: self.instrument.waveform,
            envelope,
            attack: self.instrument.attack_percent as u32,
            keyoff: self.instrument.keyoff_percent as u32,
            release: self.instrument.release_percent as u32,
        };
        self.arena.push_node(Node::Note(note));
        self.track_node_count += 1;
        Ok(())
    }

    /// Parses an optional duration NUMBER followed by zero or more `.`
    /// dot-duration modifiers, defaulting to the track's current default
    /// duration. Returns the total in 6-bit fixed-point compass units.
    fn parse_duration_and_dots(&mut self) -> Result<u8, CompileError> {
        let base = if let Token::Number(n) = self.current {
            self.advance()?;
            duration_units_from_number(n).ok_or(CompileError::ValueRange { max_value: 64 })?
        } else {
            self.default_duration.ok_or(CompileError::BadLoopPoint)?
        };

        let mut total = base as u16;
        let mut extra = base as u16;
        while matches!(self.current, Token::HalfDuration) {
            self.advance()?;
            extra /= 2;
            total += extra;
        }
        Ok(total.min(u8::MAX as u16) as u8)
    }

    /// Running compass sum over the flat (non-loop-expanded) note sequence
    /// as written, grounded on `synth_renderer.c::synthRenderer_getNoteLengthAndUpdate`:
    /// a note that pushes the sum past the time signature is
    /// `CompassOverflow`; a note that fills it exactly closes the compass
    /// and resets the sum to zero, so a straight sequence spanning more than
    /// one bar (e.g. eight quarter notes in two bars of 4/4) keeps
    /// compiling bar after bar instead of overflowing on the fifth note.
    fn accumulate_compass(&mut self, duration: u8) -> Result<(), CompileError> {
        let sum = self.compass_accum + duration as u16;
        if sum > self.time_signature {
            return Err(CompileError::CompassOverflow);
        }
        self.compass_accum = if sum == self.time_signature { 0 } else { sum };
        Ok(())
    }

    fn parse_mod_stmt(&mut self) -> Result<(), CompileError> {
        match self.current {
            Token::Octave => {
                self.advance()?;
                let n = self.expect_number()?;
                if !(1..=8).contains(&n) {
                    return Err(CompileError::ValueRange { max_value: 8 });
                }
                self.octave = n as u8;
            }
            Token::IncreaseOctave => {
                self.octave = (self.octave + 1).min(8);
                self.advance()?;
            }
            Token::DecreaseOctave => {
                self.octave = self.octave.saturating_sub(1).max(1);
                self.advance()?;
            }
            Token::DefaultDuration => {
                self.advance()?;
                let n = self.expect_number()?;
                self.default_duration =
                    Some(duration_units_from_number(n).ok_or(CompileError::ValueRange { max_value: 64 })?);
                self.duration_explicitly_set = true;
            }
            Token::Instrument => {
                self.advance()?;
                let n = self.expect_number()?;
                let id = InstrumentId(n as u32);
                if id.index() >= self.arena.instrument_count() {
                    return Err(CompileError::InvalidIndex);
                }
                self.instrument = *self.arena.instrument(id);
            }
            Token::Wave => {
                self.advance()?;
                let n = self.expect_number()?;
                self.instrument.waveform =
                    Waveform::from_index(n).ok_or(CompileError::ValueRange { max_value: 6 })?;
            }
            Token::Panning => {
                self.advance()?;
                let n = self.expect_number()?.min(100);
                self.instrument.pan = n as u8;
            }
            Token::Attack => {
                self.advance()?;
                let n = self.expect_number()?.min(100);
                if !self.duration_explicitly_set {
                    return Err(CompileError::BadLoopPoint);
                }
                self.instrument.attack_percent = n as u8;
            }
            Token::Keyoff => {
                self.advance()?;
                let n = self.expect_number()?.min(100);
                if !self.duration_explicitly_set {
                    return Err(CompileError::BadLoopPoint);
                }
                self.instrument.keyoff_percent = n as u8;
            }
            Token::Release => {
                self.advance()?;
                let n = self.expect_number()?.min(100);
                if !self.duration_explicitly_set {
                    return Err(CompileError::BadLoopPoint);
                }
                self.instrument.release_percent = n as u8;
            }
            Token::Envelope => {
                self.advance()?;
                self.parse_envelope()?;
            }
            Token::Tempo => {
                self.advance()?;
                let n = self.expect_number()?;
                if !(6..=255).contains(&n) {
                    return Err(CompileError::ValueRange { max_value: 255 });
                }
                self.bpm = n as u8;
            }
            other => {
                return Err(CompileError::UnexpectedToken { expected: "statement", found: other.name() })
            }
        }
        Ok(())
    }

    /// `ENVELOPE NUMBER ( ',' NUMBER )*` — 1 value is constant, 2 is
    /// linear, 5 is the piecewise 5-point curve.
    fn parse_envelope(&mut self) -> Result<(), CompileError> {
        let mut values = vec![self.expect_number()?.min(255) as u8];
        while matches!(self.current, Token::Comma) {
            self.advance()?;
            values.push(self.expect_number()?.min(255) as u8);
        }
        let envelope = match values.as_slice() {
            [a] => Envelope::Constant(*a),
            [a, b] => Envelope::Linear { start: *a, end: *b },
            [a, b, c, d, e] => Envelope::FivePoint {
                pre_attack: *a,
                hold: *b,
                decay: *c,
                release: *d,
                post_release: *e,
            },
            _ => {
                return Err(CompileError::UnexpectedToken {
                    expected: "1, 2 or 5 envelope values",
                    found: "NUMBER list",
                })
            }
        };
        self.instrument.envelope = self.arena.intern_envelope(envelope);
        Ok(())
    }
}

/// Resolves the lexical rest-transition pitches (`Cb`, `B#`) produced by
/// `+`/`-` modifiers at an octave boundary into the neighboring octave
/// (spec.md §4.2, §8 scenario 6).
fn resolve_octave_wrap(pitch: Pitch, octave: &mut u8) -> Pitch {
    match pitch {
        Pitch::BSharp => {
            *octave = (*octave + 1).min(8);
            Pitch::C
        }
        Pitch::Cb => {
            *octave = octave.saturating_sub(1).max(1);
            Pitch::B
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> Result<(Song, Arena), ContextualError> {
        let mut arena = Arena::new();
        let macros = MacroTable::new();
        let song = {
            let mut parser = Parser::new(source, &mut arena, &macros);
            parser.parse_song()?
        };
        Ok((song, arena))
    }

    #[test]
    fn test_simple_rest_track() {
        let (song, arena) = compile("MML B60 K4/4 l4 r;").unwrap();
        assert_eq!(song.tracks.len(), 1);
        let track = arena.track(song.tracks[0]);
        assert_eq!(track.nodes.len, 1);
    }

    #[test]
    fn test_octave_range_error() {
        let err = compile("MML B60 K4/4 o9 c;").unwrap_err();
        assert_eq!(err.error, CompileError::ValueRange { max_value: 8 });
    }

    #[test]
    fn test_compass_overflow() {
        // Three quarter notes (48 units) then a half note (32 units)
        // overshoots 4/4's 64-unit bar from within the bar, not across it.
        let err = compile("MML B60 K4/4 l4 c c c c2;").unwrap_err();
        assert_eq!(err.error, CompileError::CompassOverflow);
    }

    #[test]
    fn test_compass_resets_at_bar_boundary() {
        // Eight quarter notes span two full bars of 4/4 and must not
        // overflow on the fifth note: the compass closes and resets after
        // the fourth note exactly fills the first bar.
        let (song, arena) = compile("MML B120 K4/4 l4 o4 c d e f g a b o5 c;").unwrap();
        let track = arena.track(song.tracks[0]);
        assert_eq!(track.nodes.len, 8);
    }

    #[test]
    fn test_loop_expansion_sequence() {
        let (_song, arena) = compile("MML B60 K4/4 l8 [ c d ] 3;").unwrap();
        let track = arena.track(_song.tracks[0]);
        let nodes = arena.node_range(track.nodes);
        assert_eq!(nodes.len(), 3); // c, d, loop-marker
        assert!(matches!(nodes[2], Node::Loop(LoopNode { repeat_count: 3, .. })));
    }

    #[test]
    fn test_bad_loop_start() {
        let err = compile("MML B60 K4/4 l4 [ c;").unwrap_err();
        assert_eq!(err.error, CompileError::BadLoopStart);
    }

    #[test]
    fn test_zero_repeat_count_rejected() {
        let err = compile("MML B60 K4/4 l4 [ c ] 0;").unwrap_err();
        assert_eq!(err.error, CompileError::FunctionNotImplemented);
    }

    #[test]
    fn test_bad_loop_end() {
        let err = compile("MML B60 K4/4 l4 c ] ;").unwrap_err();
        assert_eq!(err.error, CompileError::BadLoopEnd);
    }

    #[test]
    fn test_empty_sequence() {
        let err = compile("MML B60 K4/4 ;").unwrap_err();
        assert_eq!(err.error, CompileError::EmptySequence);
    }

    #[test]
    fn test_loop_point_once() {
        let (song, arena) = compile("MML B60 K4/4 l4 c $ d e f;").unwrap();
        let track = arena.track(song.tracks[0]);
        assert!(track.loop_point.is_some());
    }

    #[test]
    fn test_duplicate_loop_point_is_error() {
        let err = compile("MML B60 K4/4 l4 c $ d $ e;").unwrap_err();
        assert_eq!(err.error, CompileError::BadLoopPoint);
    }

    #[test]
    fn test_octave_wrap_b_sharp() {
        let (song, arena) = compile("MML B60 K4/4 l8 o4 b+ c;").unwrap();
        let track = arena.track(song.tracks[0]);
        let nodes = arena.node_range(track.nodes);
        let first = nodes[0].as_note().unwrap();
        let second = nodes[1].as_note().unwrap();
        assert_eq!(first.pitch, Pitch::C);
        assert_eq!(first.octave, 5);
        assert_eq!(second.octave, 5);
    }

    #[test]
    fn test_macro_expansion() {
        let mut arena = Arena::new();
        let mut macros = MacroTable::new();
        macros.define("arp", "c8 d8 e8");
        let song = {
            let mut parser = Parser::new("MML B60 K4/4 l8 j _arp_;", &mut arena, &macros);
            parser.parse_song().unwrap()
        };
        let track = arena.track(song.tracks[0]);
        assert_eq!(track.nodes.len, 3);
    }

    #[test]
    fn test_macro_recursion_rejected() {
        let mut arena = Arena::new();
        let mut macros = MacroTable::new();
        macros.define("loopy", "c8 j _loopy_");
        let mut parser = Parser::new("MML B60 K4/4 l8 j _loopy_;", &mut arena, &macros);
        let err = parser.parse_song().unwrap_err();
        assert!(matches!(err.error, CompileError::MacroRecursion { .. }));
    }
}
