//! Char-stream tokenizer (spec.md §4.2)
//!
//! Grounded on `examples/original_source/src/synth_lexer.c`'s state
//! machine: whitespace skipping, one-character unget, 1-based line/column
//! tracking, and the comment/string/number/note sub-machines. Re-architected
//! per design note §9 as a value type borrowing the source text rather than
//! a process-wide singleton.

use crate::arena::Arena;
use crate::error::{CompileError, LineContext};
use crate::token::{Pitch, Token};

/// A single-pass tokenizer over ASCII MML source text.
///
/// Holds the current token, the source position, 1-based line/column, and
/// an unget budget of exactly one character (spec.md §4.2). Non-ASCII
/// bytes are lexed as `Token::Unknown`.
pub struct Lexer<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
    at_line_start: bool,
    unget_buf: Option<(u8, u32, u32)>,
    current: Option<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 0,
            at_line_start: false,
            unget_buf: None,
            current: None,
        }
    }

    /// Rewinds to the beginning of the source, as if freshly constructed.
    pub fn rewind(&mut self) {
        self.pos = 0;
        self.line = 1;
        self.column = 0;
        self.at_line_start = false;
        self.unget_buf = None;
        self.current = None;
    }

    pub fn current_token(&self) -> Option<Token> {
        self.current
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    /// Reads the next raw byte, skipping only `\r` (so CRLF line endings
    /// behave like LF), restoring unget state first if present.
    fn advance_raw(&mut self) -> u8 {
        if let Some((c, line, column)) = self.unget_buf.take() {
            self.line = line;
            self.column = column;
            return c;
        }
        loop {
            if self.pos >= self.bytes.len() {
                self.column += 1;
                return 0;
            }
            let c = self.bytes[self.pos];
            self.pos += 1;
            if c == b'\r' {
                continue;
            }
            if self.at_line_start {
                self.line += 1;
                self.column = 1;
                self.at_line_start = false;
            } else {
                self.column += 1;
            }
            if c == b'\n' {
                self.at_line_start = true;
            }
            return c;
        }
    }

    /// Pushes one character back. Only one character of unget is
    /// guaranteed; a second call before an intervening read overwrites the
    /// first.
    fn unget(&mut self, c: u8) {
        self.unget_buf = Some((c, self.line, self.column));
    }

    /// A two-line error-context string: a caret under the current column,
    /// then the current line's prefix up to and including that column,
    /// prefixed by the line number (spec.md §4.2 `get_lexer_line`).
    pub fn line_context(&self) -> LineContext {
        let last = self.pos.saturating_sub(1).min(self.bytes.len().saturating_sub(1).max(0));
        let mut start = 0usize;
        if !self.bytes.is_empty() {
            let mut i = last.min(self.bytes.len() - 1);
            loop {
                if self.bytes[i] == b'\n' {
                    start = i + 1;
                    break;
                }
                if i == 0 {
                    break;
                }
                i -= 1;
            }
        }
        let mut end = start;
        while end < self.bytes.len() && self.bytes[end] != b'\n' {
            end += 1;
        }
        let full_line = String::from_utf8_lossy(&self.bytes[start..end]).to_string();
        let excerpt: String = full_line.chars().take(self.column as usize).collect();
        LineContext { line: self.line, column: self.column, excerpt }
    }

    fn set_current(&mut self, token: Token) -> Token {
        self.current = Some(token);
        token
    }

    fn lex_comment(&mut self) -> Token {
        loop {
            let c = self.advance_raw();
            if c == b'\n' {
                self.unget(c);
                break;
            }
            if c == 0 {
                self.unget(c);
                break;
            }
        }
        self.set_current(Token::Comment)
    }

    fn lex_string(&mut self, arena: &mut Arena) -> Result<Token, CompileError> {
        let mut buf = String::new();
        loop {
            let c = self.advance_raw();
            if c == b'_' {
                break;
            }
            if c == 0 {
                return Err(CompileError::Eos);
            }
            buf.push(c as char);
        }
        if buf.is_empty() {
            return Err(CompileError::InvalidToken);
        }
        let id = arena.push_string(buf);
        Ok(self.set_current(Token::String(id)))
    }

    fn lex_number(&mut self, first_digit: u8) -> Result<Token, CompileError> {
        let mut value: u32 = (first_digit - b'0') as u32;
        loop {
            let c = self.advance_raw();
            if c.is_ascii_digit() {
                value = value * 10 + (c - b'0') as u32;
                if value > 0xFFFF {
                    return Err(CompileError::InvalidToken);
                }
            } else {
                self.unget(c);
                break;
            }
        }
        Ok(self.set_current(Token::Number(value as u16)))
    }

    fn lex_note(&mut self, letter: u8) -> Result<Token, CompileError> {
        if letter == b'r' {
            let next = self.advance_raw();
            if next == b'+' || next == b'-' {
                return Err(CompileError::InvalidToken);
            }
            self.unget(next);
            return Ok(self.set_current(Token::Note(Pitch::Rest)));
        }
        let base = match letter {
            b'a' => Pitch::A,
            b'b' => Pitch::B,
            b'c' => Pitch::C,
            b'd' => Pitch::D,
            b'e' => Pitch::E,
            b'f' => Pitch::F,
            b'g' => Pitch::G,
            _ => unreachable!("lex_note called with non-note letter"),
        };
        let modifier = self.advance_raw();
        let pitch = match modifier {
            b'+' => base.raise().ok_or(CompileError::InvalidToken)?,
            b'-' => base.lower().ok_or(CompileError::InvalidToken)?,
            _ => {
                self.unget(modifier);
                base
            }
        };
        Ok(self.set_current(Token::Note(pitch)))
    }

    /// Consumes whitespace, reads one character, and dispatches to the
    /// matching token production (spec.md §4.2).
    pub fn get_next_token(&mut self, arena: &mut Arena) -> Result<Token, CompileError> {
        loop {
            let c = self.advance_raw();
            let token = match c {
                b' ' | b'\t' | b'\n' => continue,
                0 => Token::EndOfInput,
                b'.' => Token::HalfDuration,
                b'^' => Token::NoteExtension,
                b'o' => Token::Octave,
                b'>' => Token::IncreaseOctave,
                b'<' => Token::DecreaseOctave,
                b'l' => Token::DefaultDuration,
                b'j' => Token::Load,
                b'i' => Token::Instrument,
                b'v' => Token::Envelope,
                b'w' => Token::Wave,
                b'p' => Token::Panning,
                b't' => Token::Attack,
                b'k' => Token::Keyoff,
                b'q' => Token::Release,
                b'[' => Token::LoopStart,
                b']' => Token::LoopEnd,
                b'$' => Token::Repeat,
                b'm' => Token::Macro,
                b';' => Token::EndOfTrack,
                b'B' => Token::Bpm,
                b'K' => Token::TimeSignature,
                b'T' => Token::Tempo,
                b'/' => Token::Slash,
                b',' => Token::Comma,
                b'#' => self.lex_comment(),
                b'_' => return self.lex_string(arena),
                b'0'..=b'9' => return self.lex_number(c),
                b'a'..=b'g' | b'r' => return self.lex_note(c),
                other => Token::Unknown(other),
            };
            return Ok(self.set_current(token));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        let mut arena = Arena::new();
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let t = lexer.get_next_token(&mut arena).expect("lex error");
            let done = matches!(t, Token::EndOfInput | Token::Unknown(_));
            out.push(t);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn test_lexer_totality_terminates() {
        // any byte string terminated by \0 must eventually hit END_OF_INPUT
        // or UNKNOWN and never diverge.
        let toks = tokens("MML B60 K4/4 l4 o4 a r ;");
        assert!(matches!(toks.last().unwrap(), Token::EndOfInput));
    }

    #[test]
    fn test_single_char_tokens() {
        let toks = tokens("[].;$m");
        assert_eq!(
            &toks[..6],
            &[
                Token::LoopStart,
                Token::LoopEnd,
                Token::HalfDuration,
                Token::EndOfTrack,
                Token::Repeat,
                Token::Macro,
            ]
        );
    }

    #[test]
    fn test_unget_roundtrip() {
        let mut arena = Arena::new();
        let mut lexer = Lexer::new("ab");
        let first = lexer.get_next_token(&mut arena).unwrap();
        let (line, col) = (lexer.line(), lexer.column());
        // Unget the raw char that was just classified (here: 'a', a NOTE).
        lexer.unget(b'a');
        let again = lexer.get_next_token(&mut arena).unwrap();
        assert_eq!(first, again);
        assert_eq!((lexer.line(), lexer.column()), (line, col));
    }

    #[test]
    fn test_number_token() {
        let toks = tokens("123 r");
        assert_eq!(toks[0], Token::Number(123));
    }

    #[test]
    fn test_number_overflow_is_invalid_token() {
        let mut arena = Arena::new();
        let mut lexer = Lexer::new("99999");
        let err = lexer.get_next_token(&mut arena).unwrap_err();
        assert_eq!(err, CompileError::InvalidToken);
    }

    #[test]
    fn test_note_with_sharp_and_flat() {
        let toks = tokens("c+ c- r");
        assert_eq!(toks[0], Token::Note(Pitch::CSharp));
        assert_eq!(toks[1], Token::Note(Pitch::Cb));
    }

    #[test]
    fn test_rest_modifier_is_error() {
        let mut arena = Arena::new();
        let mut lexer = Lexer::new("r+");
        let err = lexer.get_next_token(&mut arena).unwrap_err();
        assert_eq!(err, CompileError::InvalidToken);
    }

    #[test]
    fn test_string_token() {
        let mut arena = Arena::new();
        let mut lexer = Lexer::new("_hello_ r");
        let tok = lexer.get_next_token(&mut arena).unwrap();
        match tok {
            Token::String(id) => assert_eq!(arena.string(id), "hello"),
            _ => panic!("expected STRING"),
        }
    }

    #[test]
    fn test_empty_string_is_error() {
        let mut arena = Arena::new();
        let mut lexer = Lexer::new("__ r");
        let err = lexer.get_next_token(&mut arena).unwrap_err();
        assert_eq!(err, CompileError::InvalidToken);
    }

    #[test]
    fn test_comment_is_a_token() {
        let toks = tokens("# a comment\nr");
        assert_eq!(toks[0], Token::Comment);
        assert_eq!(toks[1], Token::Note(Pitch::Rest));
    }

    #[test]
    fn test_unknown_character() {
        let toks = tokens("@");
        assert_eq!(toks[0], Token::Unknown(b'@'));
    }

    #[test]
    fn test_line_tracking() {
        let mut arena = Arena::new();
        let mut lexer = Lexer::new("r\nr\nr");
        lexer.get_next_token(&mut arena).unwrap();
        assert_eq!(lexer.line(), 1);
        lexer.get_next_token(&mut arena).unwrap();
        assert_eq!(lexer.line(), 2);
        lexer.get_next_token(&mut arena).unwrap();
        assert_eq!(lexer.line(), 3);
    }
}
