//! `mml render` — compile and synthesize a song to PCM or WAV.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use mml_core::Compiler;
use mml_synth::{PcmMode, Synthesizer};

use crate::mode::PcmModeArg;
use crate::wav;

#[derive(Args)]
pub struct RenderArgs {
    /// Input .mml source file
    pub input: PathBuf,

    /// Output file. Defaults to the input path with its extension replaced
    /// (`.pcm` for raw output, `.wav` with `--wav`).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Sample rate in Hz
    #[arg(long, default_value_t = 44100)]
    pub rate: u32,

    /// PCM output configuration
    #[arg(long, value_enum, default_value_t = PcmModeArg::S16StereoSigned)]
    pub mode: PcmModeArg,

    /// PRNG seed for noise waveforms
    #[arg(long, default_value_t = 1)]
    pub seed: u32,

    /// Write a WAV container instead of raw PCM bytes
    #[arg(long)]
    pub wav: bool,
}

pub fn execute(args: RenderArgs) -> Result<()> {
    let source = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {:?}", args.input))?;

    let compiler = Compiler::new(args.rate);
    let (song, arena) = compiler
        .compile(&source)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("failed to compile {:?}", args.input))?;

    tracing::info!("compiled {} track(s) at {} Hz", song.tracks.len(), args.rate);

    let synth = Synthesizer::new(args.rate, args.seed);
    let mode: PcmMode = args.mode.into();

    let output = args.output.unwrap_or_else(|| {
        args.input.with_extension(if args.wav { "wav" } else { "pcm" })
    });

    if args.wav {
        let (left, right) = synth.render_mixed(&arena, &song);
        wav::write_wav(&output, &left, &right, args.rate, mode)?;
    } else {
        let bytes = synth.render(&arena, &song, mode);
        fs::write(&output, &bytes).with_context(|| format!("failed to write {:?}", output))?;
    }

    tracing::info!("wrote {:?}", output);
    Ok(())
}
