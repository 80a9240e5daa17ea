//! Per-cycle waveform shapes (spec.md §4.6 waveform table).
//!
//! Duty-cycle pulses mirror `examples/original_source/src/synth_note.c`'s
//! `W_SQUARE` branch (`perc < 512 ? volume : 0`), generalized to the other
//! three duty cycles; triangle, sawtooth and noise are supplemental per
//! spec.md (the original only implements square, leaving the rest `TODO`).

use mml_core::model::Waveform;

use crate::prng::Prng;

/// Amplitude of one waveform at cycle phase `phase` (a `[0, 1024)`
/// fractional position), normalized to `[0, 255]`. Noise draws from `prng`;
/// every other waveform is a pure function of `phase`.
pub fn amplitude_at(waveform: Waveform, phase: u16, prng: &mut Prng) -> u8 {
    match waveform {
        Waveform::Pulse12 => duty_pulse(phase, 128),
        Waveform::Pulse25 => duty_pulse(phase, 256),
        Waveform::Square50 => duty_pulse(phase, 512),
        Waveform::Pulse75 => duty_pulse(phase, 768),
        Waveform::Triangle => triangle(phase),
        Waveform::Sawtooth => sawtooth(phase),
        Waveform::Noise => noise(prng),
    }
}

fn duty_pulse(phase: u16, threshold: u16) -> u8 {
    if phase < threshold {
        255
    } else {
        0
    }
}

fn triangle(phase: u16) -> u8 {
    let raw = if phase < 512 {
        2u32 * phase as u32 * 255 / 1024
    } else {
        2u32 * (1024 - phase as u32) * 255 / 1024
    };
    raw.min(255) as u8
}

fn sawtooth(phase: u16) -> u8 {
    (phase as u32 * 255 / 1024) as u8
}

/// Gaussian white noise rescaled from `[-1, 1]` into `[0, 255]`.
fn noise(prng: &mut Prng) -> u8 {
    let g = prng.next_gaussian().clamp(-1.0, 1.0);
    (((g + 1.0) / 2.0) * 255.0) as u8
}
