//! In-arena data for compiled MML programs (spec.md §3)
//!
//! Shape follows `nether-xm::module` (`XmModule`/`XmPattern`/`XmNote`/
//! `XmInstrument`): plain owned structs with small `impl` accessor blocks,
//! `#[derive(Debug, Clone, ...)]` where the fields allow it.

use std::cell::Cell;

use crate::arena::{EnvelopeId, NodeRange, TrackId};
use crate::token::Pitch;

/// One of the seven waveform generators (spec.md §4.6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Waveform {
    Pulse12,
    Pulse25,
    Square50,
    Pulse75,
    Triangle,
    Sawtooth,
    Noise,
}

impl Waveform {
    /// Parses the `w NUMBER` instrument-mutation operand.
    pub fn from_index(i: u16) -> Option<Self> {
        Some(match i {
            0 => Waveform::Pulse12,
            1 => Waveform::Pulse25,
            2 => Waveform::Square50,
            3 => Waveform::Pulse75,
            4 => Waveform::Triangle,
            5 => Waveform::Sawtooth,
            6 => Waveform::Noise,
            _ => return None,
        })
    }
}

/// The parser's "current instrument": pan, attack/keyoff/release
/// percentages, waveform and envelope, copied into the arena on first
/// per-track mutation (copy-on-write, spec.md §4.4).
///
/// The source packs this into 4-bit/3-bit bitfields to save memory; there
/// is no equivalent pressure on the arena's `Vec<T>`-backed storage, so
/// this is a plain struct. The *ranges* the packed fields encoded (pan
/// 0..6, percentages as 3-bit fields) are preserved as logical range
/// invariants enforced by the setters in `parser.rs`, not as a bit layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instrument {
    pub pan: u8,
    pub attack_percent: u8,
    pub keyoff_percent: u8,
    pub release_percent: u8,
    pub waveform: Waveform,
    pub envelope: EnvelopeId,
}

impl Default for Instrument {
    fn default() -> Self {
        Instrument {
            pan: 50,
            attack_percent: 0,
            keyoff_percent: 75,
            release_percent: 100,
            waveform: Waveform::Square50,
            envelope: EnvelopeId(0),
        }
    }
}

/// A compiled note (spec.md §3 "Note (compiled)").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    pub pitch: Pitch,
    pub octave: u8,
    /// Duration in 6-bit fixed-point compass units (e.g. a whole note is
    /// `1 << 6`).
    pub duration_units: u8,
    /// Derived duration in samples, filled in by the length computer.
    pub duration_samples: u32,
    pub pan: u8,
    pub waveform: Waveform,
    pub envelope: EnvelopeId,
    /// Sample offset of the attack/keyoff/release lifecycle points.
    /// The parser writes the instrument's 0-100 percentages into these
    /// fields directly; `length::finalize_track` overwrites them with
    /// real sample offsets once `duration_samples` is known.
    pub attack: u32,
    pub keyoff: u32,
    pub release: u32,
}

impl Note {
    /// Asserts the lifecycle-point invariant from spec.md §3:
    /// `0 <= attack <= keyoff <= release <= duration_samples`.
    pub fn check_invariant(&self) {
        debug_assert!(self.attack <= self.keyoff);
        debug_assert!(self.keyoff <= self.release);
        debug_assert!(self.release <= self.duration_samples);
    }

    pub fn is_rest(&self) -> bool {
        matches!(self.pitch, Pitch::Rest)
    }
}

/// A loop node: a distinguished node variant that repeats the nodes from
/// `jump_position` through the node preceding the loop marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopNode {
    /// 0 means infinite — only legal at the end of a track. Not yet
    /// producible: `Parser::parse_loop_stmt` rejects `repeat_count == 0`
    /// until the length/render pipeline can handle an unbounded body.
    pub repeat_count: u32,
    /// Node index within the owning track's node range; always less than
    /// this loop node's own index.
    pub jump_position: u32,
}

/// A track node: either a playable note or a loop marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Note(Note),
    Loop(LoopNode),
}

impl Node {
    pub fn as_note(&self) -> Option<&Note> {
        match self {
            Node::Note(n) => Some(n),
            Node::Loop(_) => None,
        }
    }

    pub fn as_loop(&self) -> Option<&LoopNode> {
        match self {
            Node::Loop(l) => Some(l),
            Node::Note(_) => None,
        }
    }
}

/// Per-track cached lengths, computed lazily by `length::compute` and
/// stable thereafter (spec.md §4.5: "subsequent calls are O(1)").
#[derive(Debug, Default)]
struct LengthCache {
    total: Cell<Option<u32>>,
    intro: Cell<Option<u32>>,
}

/// An ordered sequence of nodes, plus an optional loop point.
#[derive(Debug)]
pub struct Track {
    pub nodes: NodeRange,
    /// Node index (absolute into the arena's node region) of the loop
    /// point, or `None` if the track has none.
    pub loop_point: Option<u32>,
    length_cache: LengthCache,
}

impl Track {
    pub fn new(nodes: NodeRange, loop_point: Option<u32>) -> Self {
        Track { nodes, loop_point, length_cache: LengthCache::default() }
    }

    pub fn cached_total_length(&self) -> Option<u32> {
        self.length_cache.total.get()
    }

    pub fn cached_intro_length(&self) -> Option<u32> {
        self.length_cache.intro.get()
    }

    pub fn set_cached_lengths(&self, total: u32, intro: u32) {
        self.length_cache.total.set(Some(total));
        self.length_cache.intro.set(Some(intro));
    }
}

/// A compiled song: its tracks, tempo, and time signature.
#[derive(Debug)]
pub struct Song {
    pub tracks: Vec<TrackId>,
    /// Beats per minute, 6-255.
    pub bpm: u8,
    /// Time signature in the same 6-bit fractional units as note duration
    /// (e.g. 4/4 is `0x40`, four quarter notes at 16 units each).
    pub time_signature: u16,
    /// Selects the 5-point envelope over the legacy 2-point one.
    pub use_new_envelope: bool,
}
