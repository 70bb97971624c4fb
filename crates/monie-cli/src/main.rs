//! `monie-plugin` -- demo plugin binary for the monie line protocol.
//!
//! Provides the following subcommands:
//!
//! - `monie-plugin serve` -- Declare the plugin and answer requests on stdio.
//! - `monie-plugin declare` -- Print the handshake frames and exit.

use std::time::Duration;

use clap::{Parser, Subcommand};

mod commands;
mod demo;

/// monie demo plugin.
#[derive(Parser)]
#[command(name = "monie-plugin", about = "monie demo plugin", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Serve the plugin over stdin/stdout until stdin closes.
    Serve(commands::serve::ServeArgs),

    /// Print the handshake frames to stdout.
    Declare(commands::declare::DeclareArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries protocol frames only.
    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(async {
        match cli.command {
            Commands::Serve(args) => commands::serve::run(args).await,
            Commands::Declare(args) => commands::declare::run(args),
        }
    });

    // A pending stdin read sits on a blocking thread that cannot be
    // cancelled; don't wait for it.
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_serve_defaults() {
        let cli = Cli::try_parse_from(["monie-plugin", "serve"]).unwrap();
        assert!(!cli.verbose);
        match cli.command {
            Commands::Serve(args) => {
                assert!(args.max_workers.is_none());
                assert!(!args.disable_worker);
                assert!(!args.no_parent_watch);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn parse_serve_overrides() {
        let cli = Cli::try_parse_from([
            "monie-plugin", "-v", "serve",
            "--max-workers", "3",
            "--heartbeat-interval", "2",
            "--disable-worker",
            "--base-dir", "/tmp/plugin",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.max_workers, Some(3));
                assert_eq!(args.heartbeat_interval, Some(2));
                assert!(args.disable_worker);
                assert_eq!(args.base_dir.as_deref(), Some("/tmp/plugin"));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn parse_declare_pretty() {
        let cli = Cli::try_parse_from(["monie-plugin", "declare", "--pretty"]).unwrap();
        match cli.command {
            Commands::Declare(args) => assert!(args.pretty),
            _ => panic!("expected declare"),
        }
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::try_parse_from(["monie-plugin", "declare", "--verbose"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn rejects_bad_worker_count() {
        assert!(Cli::try_parse_from(["monie-plugin", "serve", "--max-workers", "many"]).is_err());
    }

    #[test]
    fn requires_subcommand() {
        assert!(Cli::try_parse_from(["monie-plugin"]).is_err());
    }
}
