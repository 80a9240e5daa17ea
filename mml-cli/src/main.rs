//! mml-cli - Command-line front end for the MML compiler and synthesizer
//!
//! # Commands
//!
//! - `mml render <INPUT.mml>` - Compile and synthesize a song to raw PCM or
//!   a WAV container (`--wav`)
//! - `mml check <INPUT.mml>` - Compile only, report track/length summary

mod check;
mod mode;
mod render;
mod wav;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mml")]
#[command(about = "MML compiler and software synthesizer")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and render a song to PCM or WAV
    Render(render::RenderArgs),

    /// Compile a song and report its track/length summary
    Check(check::CheckArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render(args) => render::execute(args),
        Commands::Check(args) => check::execute(args),
    }
}
