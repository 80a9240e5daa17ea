//! WAV container output for the `render --wav` flag.
//!
//! Grounded on `tools/ember-export/src/audio.rs` and
//! `tools/gen-paddle-assets/src/main.rs`'s `hound::WavWriter` usage.
//!
//! The raw-PCM packer (`mml_synth::format`) preserves an unusual convention
//! where silence sits at the bottom of the sample range rather than its
//! center, so a requested output mode can be written byte-for-byte. A WAV
//! container has no such freedom: players assume standard centered PCM, so
//! this always writes centered samples from the pre-pack `[0, 255]` mix
//! buffers, honoring only the requested width and channel count.

use anyhow::{Context, Result};
use std::path::Path;

use mml_synth::{Channels, PcmMode, SampleWidth};

pub fn write_wav(path: &Path, left: &[i32], right: &[i32], sample_rate: u32, mode: PcmMode) -> Result<()> {
    let channels = match mode.channels {
        Channels::Mono => 1,
        Channels::Stereo => 2,
    };
    let bits_per_sample = match mode.width {
        SampleWidth::Eight => 8,
        SampleWidth::Sixteen => 16,
    };
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer =
        hound::WavWriter::create(path, spec).with_context(|| format!("failed to create {:?}", path))?;

    for i in 0..left.len() {
        match mode.channels {
            Channels::Mono => {
                let sum = (left[i] + right[i]).clamp(0, 255);
                write_centered(&mut writer, sum, mode.width)?;
            }
            Channels::Stereo => {
                write_centered(&mut writer, left[i], mode.width)?;
                write_centered(&mut writer, right[i], mode.width)?;
            }
        }
    }

    writer.finalize().context("failed to finalize WAV file")?;
    Ok(())
}

/// Centers one `[0, 255]` amplitude around zero and writes it at the
/// requested bit depth. hound's own 8-bit/16-bit sample types are always
/// centered, regardless of the unsigned/signed convention our raw PCM
/// packer exposes.
fn write_centered(writer: &mut hound::WavWriter<std::io::BufWriter<std::fs::File>>, amp: i32, width: SampleWidth) -> Result<()> {
    match width {
        SampleWidth::Eight => writer.write_sample((amp - 128) as i8)?,
        SampleWidth::Sixteen => writer.write_sample(((amp - 128) * 257) as i16)?,
    }
    Ok(())
}
