//! Wire types for the monie plugin protocol.
//!
//! The host daemon and a plugin subprocess exchange newline-delimited JSON
//! documents over stdio. This crate defines both directions of that
//! exchange and nothing else -- no I/O, no dispatch.
//!
//! # Module Structure
//!
//! - [`event`] -- inbound envelope ([`StreamMessage`]) and outbound frames
//!   ([`StreamFrame`], [`SessionPayload`], [`LogEvent`], [`AssetChunk`])
//! - [`request`] -- typed invocation requests carried in `data`
//! - [`model`] -- model type enumeration shared by requests and registries
//! - [`error`] -- [`ErrorResponse`], the structured error sent to the host

pub mod error;
pub mod event;
pub mod model;
pub mod request;

pub use error::ErrorResponse;
pub use event::{
    AssetChunk, InboundEvent, LogEvent, LogLevel, OutboundEvent, SessionPayload, StreamFrame,
    StreamMessage,
};
pub use model::ModelType;
pub use request::{InvokeType, RequestKey};
