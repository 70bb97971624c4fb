//! Typed invocation requests.
//!
//! A request's `data` always carries `type` and `action`; together they form
//! a [`RequestKey`] that selects a route. The remaining fields decode into one
//! of the structs below. Identifying fields (`provider`, `tool`, `model`) are
//! required, everything else falls back to an empty default.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::ModelType;

/// `data.type`: which capability family a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvokeType {
    Tool,
    Model,
    Endpoint,
    AgentStrategy,
}

impl InvokeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tool => "tool",
            Self::Model => "model",
            Self::Endpoint => "endpoint",
            Self::AgentStrategy => "agent_strategy",
        }
    }
}

/// A `(type, action)` pair identifying a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub invoke_type: InvokeType,
    pub action: &'static str,
}

impl RequestKey {
    pub const fn new(invoke_type: InvokeType, action: &'static str) -> Self {
        Self {
            invoke_type,
            action,
        }
    }

    /// Whether `data.type` and `data.action` equal this key.
    pub fn matches(&self, data: &Value) -> bool {
        data.get("type").and_then(Value::as_str) == Some(self.invoke_type.as_str())
            && data.get("action").and_then(Value::as_str) == Some(self.action)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.invoke_type.as_str(), self.action)
    }
}

/// Standard route keys.
pub mod keys {
    use super::{InvokeType, RequestKey};

    pub const INVOKE_TOOL: RequestKey = RequestKey::new(InvokeType::Tool, "invoke_tool");
    pub const VALIDATE_TOOL_CREDENTIALS: RequestKey =
        RequestKey::new(InvokeType::Tool, "validate_tool_credentials");
    pub const GET_TOOL_RUNTIME_PARAMETERS: RequestKey =
        RequestKey::new(InvokeType::Tool, "get_tool_runtime_parameters");

    pub const INVOKE_AGENT_STRATEGY: RequestKey =
        RequestKey::new(InvokeType::AgentStrategy, "invoke_agent_strategy");

    pub const INVOKE_LLM: RequestKey = RequestKey::new(InvokeType::Model, "invoke_llm");
    pub const GET_LLM_NUM_TOKENS: RequestKey =
        RequestKey::new(InvokeType::Model, "get_llm_num_tokens");
    pub const INVOKE_TEXT_EMBEDDING: RequestKey =
        RequestKey::new(InvokeType::Model, "invoke_text_embedding");
    pub const GET_TEXT_EMBEDDING_NUM_TOKENS: RequestKey =
        RequestKey::new(InvokeType::Model, "get_text_embedding_num_tokens");
    pub const INVOKE_RERANK: RequestKey = RequestKey::new(InvokeType::Model, "invoke_rerank");
    pub const INVOKE_TTS: RequestKey = RequestKey::new(InvokeType::Model, "invoke_tts");
    pub const GET_TTS_MODEL_VOICES: RequestKey =
        RequestKey::new(InvokeType::Model, "get_tts_model_voices");
    pub const INVOKE_SPEECH2TEXT: RequestKey =
        RequestKey::new(InvokeType::Model, "invoke_speech2text");
    pub const INVOKE_MODERATION: RequestKey =
        RequestKey::new(InvokeType::Model, "invoke_moderation");
    pub const VALIDATE_PROVIDER_CREDENTIALS: RequestKey =
        RequestKey::new(InvokeType::Model, "validate_provider_credentials");
    pub const VALIDATE_MODEL_CREDENTIALS: RequestKey =
        RequestKey::new(InvokeType::Model, "validate_model_credentials");
    pub const GET_AI_MODEL_SCHEMAS: RequestKey =
        RequestKey::new(InvokeType::Model, "get_ai_model_schemas");

    pub const INVOKE_ENDPOINT: RequestKey =
        RequestKey::new(InvokeType::Endpoint, "invoke_endpoint");
}

/// How tool credentials were obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
    #[default]
    ApiKey,
    Oauth,
    BearerToken,
}

// ----------------------------------------------------------------------------
// Tool
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvokeRequest {
    #[serde(default)]
    pub user_id: String,
    pub provider: String,
    pub tool: String,
    #[serde(default)]
    pub credentials: Map<String, Value>,
    #[serde(default)]
    pub credential_type: CredentialType,
    #[serde(default)]
    pub tool_parameters: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolValidateCredentialsRequest {
    #[serde(default)]
    pub user_id: String,
    pub provider: String,
    #[serde(default)]
    pub credentials: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolGetRuntimeParametersRequest {
    #[serde(default)]
    pub user_id: String,
    pub provider: String,
    pub tool: String,
    #[serde(default)]
    pub credentials: Map<String, Value>,
}

// ----------------------------------------------------------------------------
// Agent strategy
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInvokeRequest {
    #[serde(default)]
    pub user_id: String,
    pub agent_strategy_provider: String,
    pub agent_strategy: String,
    #[serde(default)]
    pub agent_strategy_parameters: Map<String, Value>,
}

// ----------------------------------------------------------------------------
// Model
// ----------------------------------------------------------------------------

/// Fields shared by every model request that targets a specific model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelTarget {
    #[serde(default)]
    pub user_id: String,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub model_type: ModelType,
    #[serde(default)]
    pub credentials: Map<String, Value>,
}

fn default_stream() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInvokeLlmRequest {
    #[serde(flatten)]
    pub target: ModelTarget,
    #[serde(default)]
    pub prompt_messages: Vec<Value>,
    #[serde(default)]
    pub model_parameters: Map<String, Value>,
    #[serde(default)]
    pub stop: Option<Vec<String>>,
    #[serde(default)]
    pub tools: Option<Vec<Value>>,
    #[serde(default = "default_stream")]
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelGetLlmNumTokensRequest {
    #[serde(flatten)]
    pub target: ModelTarget,
    #[serde(default)]
    pub prompt_messages: Vec<Value>,
    #[serde(default)]
    pub tools: Vec<Value>,
}

/// Shared by `invoke_text_embedding` and `get_text_embedding_num_tokens`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelTextEmbeddingRequest {
    #[serde(flatten)]
    pub target: ModelTarget,
    #[serde(default)]
    pub texts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInvokeRerankRequest {
    #[serde(flatten)]
    pub target: ModelTarget,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub docs: Vec<String>,
    #[serde(default)]
    pub score_threshold: Option<f64>,
    #[serde(default)]
    pub top_n: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInvokeTtsRequest {
    #[serde(flatten)]
    pub target: ModelTarget,
    #[serde(default)]
    pub content_text: String,
    #[serde(default)]
    pub voice: String,
    #[serde(default)]
    pub tenant_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelGetTtsVoicesRequest {
    #[serde(flatten)]
    pub target: ModelTarget,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInvokeSpeech2TextRequest {
    #[serde(flatten)]
    pub target: ModelTarget,
    /// Hex-encoded audio.
    #[serde(default)]
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInvokeModerationRequest {
    #[serde(flatten)]
    pub target: ModelTarget,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelValidateProviderCredentialsRequest {
    #[serde(default)]
    pub user_id: String,
    pub provider: String,
    #[serde(default)]
    pub credentials: Map<String, Value>,
}

/// Target-only model requests: `validate_model_credentials` and
/// `get_ai_model_schemas`.
pub type ModelTargetRequest = ModelTarget;

// ----------------------------------------------------------------------------
// Endpoint
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointInvokeRequest {
    #[serde(default)]
    pub user_id: String,
    /// Raw HTTP/1.1 request text (`\r\n` line endings).
    pub raw_http_request: String,
    #[serde(default)]
    pub settings: Map<String, Value>,
}
