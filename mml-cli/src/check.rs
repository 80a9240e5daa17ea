//! `mml check` — compile only, report track/length summary or a compile error.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use mml_core::Compiler;

#[derive(Args)]
pub struct CheckArgs {
    /// Input .mml source file
    pub input: PathBuf,

    /// Sample rate to finalize lengths against
    #[arg(long, default_value_t = 44100)]
    pub rate: u32,
}

pub fn execute(args: CheckArgs) -> Result<()> {
    let source = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {:?}", args.input))?;

    let compiler = Compiler::new(args.rate);
    let (song, arena) = match compiler.compile(&source) {
        Ok(result) => result,
        Err(err) => {
            // spec.md §7: the CLI prints the error string with line context
            // and exits non-zero, which `anyhow::bail!` gives us via Display.
            anyhow::bail!("{err}");
        }
    };

    println!("{} track(s)", song.tracks.len());
    for (i, &track_id) in song.tracks.iter().enumerate() {
        let track = arena.track(track_id);
        let total = track.cached_total_length().unwrap_or(0);
        match track.cached_intro_length() {
            Some(intro) if track.loop_point.is_some() => {
                println!("  track {i}: {total} samples ({intro} samples before loop point)");
            }
            _ => println!("  track {i}: {total} samples"),
        }
    }

    match compiler.check_loopable(&arena, &song) {
        Ok(()) => println!("loopable: yes"),
        Err(_) => println!("loopable: no"),
    }

    Ok(())
}
