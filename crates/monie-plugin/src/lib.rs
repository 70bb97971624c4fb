//! Capability contracts and discovery for monie plugins.
//!
//! This crate defines what a plugin can implement and how the runtime finds
//! those implementations. It performs no I/O beyond reading asset files.
//!
//! # Contract Overview
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`Tool`] / [`ToolProvider`] | Tool execution and provider credential checks |
//! | [`ModelProvider`] / [`AiModel`] | Model providers and their typed models |
//! | [`Endpoint`] | HTTP-shaped request handlers |
//! | [`AgentStrategy`] | Agent reasoning strategies |
//! | [`SessionContext`] | Host-facing session handle passed to instances |
//!
//! # Discovery
//!
//! Plugin code is compiled into the plugin binary and registered by path
//! with a [`StaticModuleResolver`]. Each module exports [`ClassDef`]s that
//! pick up capability [`Marker`]s by extending a [`Contract`]. The
//! [`ModuleClassScanner`] classifies classes by marker and the
//! [`PluginRegistry`] resolves a [`PluginDefinition`] into live providers
//! and factories.
//!
//! # Endpoints
//!
//! [`endpoint`] parses raw HTTP requests and matches them against
//! `:param` path patterns.

pub mod asset;
pub mod class;
pub mod contract;
pub mod endpoint;
pub mod error;
pub mod manifest;
pub mod registry;
pub mod scanner;
pub mod traits;

// Re-export core types at crate root for convenience.
pub use asset::{PluginAsset, load_assets};
pub use class::{ClassDef, Constructor};
pub use contract::{Contract, Marker};
pub use endpoint::{
    EndpointRoute, EndpointTable, HttpRequest, PathMatch, PathPattern, parse_raw_http_request,
};
pub use error::PluginError;
pub use manifest::{
    AgentStrategyDeclaration, AgentStrategyProviderDeclaration, EndpointDeclaration,
    EndpointProviderDeclaration, ModelProviderDeclaration, ModuleBinding, PluginDefinition,
    PluginManifest, ToolDeclaration, ToolProviderDeclaration,
};
pub use registry::PluginRegistry;
pub use scanner::{
    ClassInfo, ModuleClassScanner, ModuleResolver, PluginModule, StaticModuleResolver,
};
pub use traits::{
    AgentRuntime, AgentStrategy, AiModel, AudioStream, Credentials, Endpoint, InvokeOutput,
    LargeLanguageModel, ModelProvider, ModerationModel, RerankModel, SessionContext,
    SessionHandle, Speech2TextModel, TextEmbeddingModel, Tool, ToolProvider, ToolRuntime,
    TtsModel, ValueStream,
};
