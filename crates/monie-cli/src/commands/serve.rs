//! `monie-plugin serve` -- run the demo plugin over stdio.
//!
//! Writes the handshake to stdout, then answers request lines from stdin
//! until stdin closes, the parent process exits or Ctrl-C is pressed.
//!
//! # Example
//!
//! ```text
//! monie-plugin serve
//! MAX_WORKERS=4 monie-plugin serve --heartbeat-interval 5
//! ```

use clap::Args;
use tracing::{info, warn};

use monie_runtime::{IoServer, RuntimeConfig};

use super::{load_config, load_registry};
use crate::demo;

/// Arguments for the `monie-plugin serve` subcommand.
#[derive(Args)]
pub struct ServeArgs {
    /// Seconds between heartbeat frames (overrides HEARTBEAT_INTERVAL).
    #[arg(long)]
    pub heartbeat_interval: Option<u64>,

    /// CPU worker threads (overrides MAX_WORKERS).
    #[arg(long)]
    pub max_workers: Option<usize>,

    /// Run CPU-bound requests on the async runtime.
    #[arg(long)]
    pub disable_worker: bool,

    /// Plugin base directory (overrides BASE_DIR).
    #[arg(long)]
    pub base_dir: Option<String>,

    /// Milliseconds between parent-process checks.
    #[arg(long, default_value_t = 500)]
    pub parent_check_interval: u64,

    /// Keep running when the parent process exits.
    #[arg(long)]
    pub no_parent_watch: bool,
}

impl ServeArgs {
    /// Environment-derived configuration with the flags applied on top.
    pub fn config(&self) -> anyhow::Result<RuntimeConfig> {
        let mut config = load_config(self.base_dir.as_deref())?;
        if let Some(secs) = self.heartbeat_interval {
            config.heartbeat_interval_secs = secs;
        }
        if let Some(workers) = self.max_workers {
            config.max_workers = workers;
        }
        if self.disable_worker {
            config.disable_worker = true;
        }
        config.parent_check_interval_ms =
            (!self.no_parent_watch).then_some(self.parent_check_interval);
        Ok(config)
    }
}

/// Run the serve command.
pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    let config = args.config()?;
    let registry = load_registry(&config)?;

    let server = IoServer::builder(config, registry)
        .cpu_predicate(demo::is_cpu_bound)
        .build(tokio::io::stdout())?;

    let interrupt = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping");
            if let Err(e) = interrupt.stop().await {
                warn!(error = %e, "stop after interrupt failed");
            }
        }
    });

    server.start(tokio::io::stdin()).await?;
    Ok(())
}
