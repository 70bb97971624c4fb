//! Capability contracts.
//!
//! The traits a plugin implements, one per [`Contract`](crate::Contract):
//! - [`Tool`] / [`ToolProvider`]
//! - [`ModelProvider`] / [`AiModel`] and its subtypes ([`LargeLanguageModel`],
//!   [`TextEmbeddingModel`], [`RerankModel`], [`Speech2TextModel`],
//!   [`TtsModel`], [`ModerationModel`])
//! - [`Endpoint`]
//! - [`AgentStrategy`]
//!
//! Plus [`SessionContext`], the host-facing side of an invocation.
//!
//! All traits are `Send + Sync`. Async methods use `#[async_trait]`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use serde_json::{Map, Value};

use monie_types::event::LogLevel;
use monie_types::request::{
    CredentialType, ModelGetLlmNumTokensRequest, ModelGetTtsVoicesRequest,
    ModelInvokeLlmRequest, ModelInvokeModerationRequest, ModelInvokeRerankRequest,
    ModelInvokeSpeech2TextRequest, ModelInvokeTtsRequest, ModelTextEmbeddingRequest,
};
use monie_types::ModelType;

use crate::endpoint::HttpRequest;
use crate::error::PluginError;

/// Credentials as supplied by the host.
pub type Credentials = Map<String, Value>;

/// A stream of JSON chunks.
pub type ValueStream = BoxStream<'static, Result<Value, PluginError>>;

/// A stream of raw audio chunks.
pub type AudioStream = BoxStream<'static, Result<Vec<u8>, PluginError>>;

// ---------------------------------------------------------------------------
// Invocation output
// ---------------------------------------------------------------------------

/// What a handler produces: one value, or a stream of chunks.
pub enum InvokeOutput {
    Value(Value),
    Stream(ValueStream),
}

impl InvokeOutput {
    /// Serialize `value` into a single-value output.
    pub fn value<T: Serialize>(value: T) -> Result<Self, PluginError> {
        Ok(Self::Value(serde_json::to_value(value)?))
    }

    /// Wrap a chunk stream.
    pub fn stream<S>(chunks: S) -> Self
    where
        S: futures_util::Stream<Item = Result<Value, PluginError>> + Send + 'static,
    {
        Self::Stream(chunks.boxed())
    }

    /// A stream over already-computed chunks.
    pub fn chunks(items: Vec<Value>) -> Self {
        Self::Stream(stream::iter(items.into_iter().map(Ok)).boxed())
    }
}

impl fmt::Debug for InvokeOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The session an invocation belongs to.
///
/// Implemented by the runtime; plugins use it to read envelope metadata and
/// to send `log` frames back to the host.
#[async_trait]
pub trait SessionContext: Send + Sync {
    fn session_id(&self) -> &str;

    fn conversation_id(&self) -> Option<&str>;

    fn message_id(&self) -> Option<&str>;

    fn app_id(&self) -> Option<&str>;

    fn endpoint_id(&self) -> Option<&str>;

    /// Free-form context forwarded by the host.
    fn context(&self) -> Option<&Value>;

    /// Send a log line to the host. Failures are swallowed.
    async fn log(&self, level: LogLevel, message: String);
}

/// Shared handle to a session.
pub type SessionHandle = Arc<dyn SessionContext>;

/// Per-invocation tool runtime.
#[derive(Debug, Clone, Default)]
pub struct ToolRuntime {
    pub credentials: Credentials,
    pub credential_type: CredentialType,
    pub user_id: String,
    pub session_id: String,
}

/// Per-invocation agent strategy runtime.
#[derive(Debug, Clone, Default)]
pub struct AgentRuntime {
    pub user_id: String,
}

// ---------------------------------------------------------------------------
// Tool
// ---------------------------------------------------------------------------

/// A tool, constructed fresh for every invocation.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Run the tool.
    async fn invoke(&self, parameters: Map<String, Value>) -> Result<InvokeOutput, PluginError>;

    /// Parameters resolved at runtime (e.g. options fetched with the
    /// caller's credentials).
    async fn get_runtime_parameters(&self) -> Result<Vec<Value>, PluginError> {
        Ok(Vec::new())
    }
}

/// Groups tools and owns their credential check.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    async fn validate_credentials(&self, credentials: &Credentials) -> Result<(), PluginError>;
}

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

/// Owns the provider-level credential check for a set of models.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn validate_provider_credentials(
        &self,
        credentials: &Credentials,
    ) -> Result<(), PluginError>;
}

/// Common base of all model kinds.
///
/// Each concrete model overrides exactly one of the `as_*` accessors to
/// expose its subtype.
#[async_trait]
pub trait AiModel: Send + Sync {
    fn model_type(&self) -> ModelType;

    async fn validate_credentials(
        &self,
        model: &str,
        credentials: &Credentials,
    ) -> Result<(), PluginError>;

    /// Schema of a customizable model, if the provider supports it.
    async fn get_model_schema(
        &self,
        _model: &str,
        _credentials: &Credentials,
    ) -> Result<Option<Value>, PluginError> {
        Ok(None)
    }

    fn as_llm(&self) -> Option<&dyn LargeLanguageModel> {
        None
    }

    fn as_text_embedding(&self) -> Option<&dyn TextEmbeddingModel> {
        None
    }

    fn as_rerank(&self) -> Option<&dyn RerankModel> {
        None
    }

    fn as_speech2text(&self) -> Option<&dyn Speech2TextModel> {
        None
    }

    fn as_tts(&self) -> Option<&dyn TtsModel> {
        None
    }

    fn as_moderation(&self) -> Option<&dyn ModerationModel> {
        None
    }
}

#[async_trait]
pub trait LargeLanguageModel: AiModel {
    /// Complete a chat. Streaming requests should return
    /// [`InvokeOutput::Stream`] of chunk objects.
    async fn invoke(&self, request: &ModelInvokeLlmRequest) -> Result<InvokeOutput, PluginError>;

    async fn get_num_tokens(&self, request: &ModelGetLlmNumTokensRequest)
    -> Result<u64, PluginError>;
}

#[async_trait]
pub trait TextEmbeddingModel: AiModel {
    async fn invoke(&self, request: &ModelTextEmbeddingRequest) -> Result<Value, PluginError>;

    /// Token count per input text.
    async fn get_num_tokens(
        &self,
        request: &ModelTextEmbeddingRequest,
    ) -> Result<Vec<u64>, PluginError>;
}

#[async_trait]
pub trait RerankModel: AiModel {
    async fn invoke(&self, request: &ModelInvokeRerankRequest) -> Result<Value, PluginError>;
}

#[async_trait]
pub trait Speech2TextModel: AiModel {
    /// Transcribe the request's audio into text.
    async fn invoke(&self, request: &ModelInvokeSpeech2TextRequest) -> Result<String, PluginError>;
}

#[async_trait]
pub trait TtsModel: AiModel {
    /// Synthesize speech as a stream of audio chunks.
    async fn invoke(&self, request: &ModelInvokeTtsRequest) -> Result<AudioStream, PluginError>;

    async fn get_voices(&self, _request: &ModelGetTtsVoicesRequest) -> Result<Vec<Value>, PluginError> {
        Ok(Vec::new())
    }
}

#[async_trait]
pub trait ModerationModel: AiModel {
    /// `true` when the text is flagged.
    async fn invoke(&self, request: &ModelInvokeModerationRequest) -> Result<bool, PluginError>;
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// An HTTP-shaped capability. Constructed fresh for every request.
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Handle `request`. `values` holds the path parameters extracted from
    /// the matched pattern.
    async fn invoke(
        &self,
        request: HttpRequest,
        values: HashMap<String, String>,
        settings: Map<String, Value>,
    ) -> Result<InvokeOutput, PluginError>;
}

// ---------------------------------------------------------------------------
// AgentStrategy
// ---------------------------------------------------------------------------

/// An agent reasoning strategy. Constructed fresh for every invocation.
#[async_trait]
pub trait AgentStrategy: Send + Sync {
    async fn invoke(&self, parameters: Map<String, Value>) -> Result<InvokeOutput, PluginError>;
}
