//! Line-protocol runtime for monie plugins.
//!
//! A plugin binary builds a [`PluginRegistry`](monie_plugin::PluginRegistry),
//! hands it to an [`IoServer`] and calls [`IoServer::start`] with stdin.
//! The server declares the plugin to the host, then answers request frames
//! on stdout until stdin closes.
//!
//! # Module Structure
//!
//! - [`codec`] -- [`FrameReader`] / [`FrameWriter`] for newline-delimited JSON
//! - [`router`] -- ordered `(filter, decoder, handler)` routes with panic isolation
//! - [`executor`] -- the standard tool / model / endpoint / agent-strategy routes
//! - [`server`] -- [`IoServer`]: handshake, read loop, CPU offload, shutdown
//! - [`pool`] -- rayon-backed [`WorkerPool`] for CPU-bound requests
//! - [`heartbeat`] -- periodic liveness frames
//! - [`declaration`] -- startup [`Handshake`] frames
//! - [`session`] -- per-request [`Session`]
//! - [`config`] -- [`RuntimeConfig`] and its environment overrides

pub mod codec;
pub mod config;
pub mod declaration;
pub mod error;
pub mod executor;
pub mod heartbeat;
pub mod pool;
pub mod router;
pub mod server;
pub mod session;

pub use codec::{FrameReader, FrameWriter, Inbound};
pub use config::RuntimeConfig;
pub use declaration::Handshake;
pub use error::{Result, RuntimeError};
pub use executor::PluginExecutor;
pub use heartbeat::HeartbeatService;
pub use pool::{PoolInfo, WorkerPool};
pub use router::{ResponseStream, RouteOutcome, RouteOutput, Router};
pub use server::{CpuPredicate, IoServer, IoServerBuilder, ServerInfo};
pub use session::Session;
