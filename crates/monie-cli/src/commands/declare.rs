//! `monie-plugin declare` -- print the handshake frames.
//!
//! Prints exactly what `serve` writes before its first request, one frame
//! per line, and exits.

use clap::Args;

use monie_runtime::Handshake;

use super::{load_config, load_registry};

/// Arguments for the `monie-plugin declare` subcommand.
#[derive(Args)]
pub struct DeclareArgs {
    /// Pretty-print each frame.
    #[arg(long)]
    pub pretty: bool,

    /// Plugin base directory (overrides BASE_DIR).
    #[arg(long)]
    pub base_dir: Option<String>,
}

/// Run the declare command.
pub fn run(args: DeclareArgs) -> anyhow::Result<()> {
    let config = load_config(args.base_dir.as_deref())?;
    let registry = load_registry(&config)?;

    let frames = Handshake::new(&registry, config.asset_chunk_size).frames()?;
    for frame in &frames {
        let line = if args.pretty {
            serde_json::to_string_pretty(frame)?
        } else {
            serde_json::to_string(frame)?
        };
        println!("{line}");
    }
    Ok(())
}
