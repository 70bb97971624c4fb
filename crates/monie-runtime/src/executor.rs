//! Standard request handlers.
//!
//! [`PluginExecutor`] turns typed requests into calls on the capabilities of
//! a loaded [`PluginRegistry`]. [`PluginExecutor::register_routes`] installs
//! one route per `(type, action)` pair.

use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;

use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use monie_plugin::{
    AgentRuntime, AiModel, InvokeOutput, PluginError, PluginRegistry, SessionHandle, ToolRuntime,
    parse_raw_http_request,
};
use monie_types::ModelType;
use monie_types::RequestKey;
use monie_types::request::{
    AgentInvokeRequest, EndpointInvokeRequest, ModelGetLlmNumTokensRequest,
    ModelGetTtsVoicesRequest, ModelInvokeLlmRequest, ModelInvokeModerationRequest,
    ModelInvokeRerankRequest, ModelInvokeSpeech2TextRequest, ModelInvokeTtsRequest, ModelTarget,
    ModelTargetRequest, ModelTextEmbeddingRequest, ModelValidateProviderCredentialsRequest,
    ToolGetRuntimeParametersRequest, ToolInvokeRequest, ToolValidateCredentialsRequest, keys,
};

use crate::router::Router;

type Result<T> = std::result::Result<T, PluginError>;

/// Runs standard requests against a registry.
#[derive(Debug)]
pub struct PluginExecutor {
    registry: Arc<PluginRegistry>,
}

impl PluginExecutor {
    pub fn new(registry: Arc<PluginRegistry>) -> Arc<Self> {
        Arc::new(Self { registry })
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Install every standard route on `router`.
    pub fn register_routes(self: &Arc<Self>, router: &mut Router) {
        self.route(router, keys::INVOKE_TOOL, Self::invoke_tool);
        self.route(router, keys::VALIDATE_TOOL_CREDENTIALS, Self::validate_tool_credentials);
        self.route(router, keys::GET_TOOL_RUNTIME_PARAMETERS, Self::get_tool_runtime_parameters);

        self.route(router, keys::INVOKE_AGENT_STRATEGY, Self::invoke_agent_strategy);

        self.route(router, keys::INVOKE_LLM, Self::invoke_llm);
        self.route(router, keys::GET_LLM_NUM_TOKENS, Self::get_llm_num_tokens);
        self.route(router, keys::INVOKE_TEXT_EMBEDDING, Self::invoke_text_embedding);
        self.route(
            router,
            keys::GET_TEXT_EMBEDDING_NUM_TOKENS,
            Self::get_text_embedding_num_tokens,
        );
        self.route(router, keys::INVOKE_RERANK, Self::invoke_rerank);
        self.route(router, keys::INVOKE_TTS, Self::invoke_tts);
        self.route(router, keys::GET_TTS_MODEL_VOICES, Self::get_tts_model_voices);
        self.route(router, keys::INVOKE_SPEECH2TEXT, Self::invoke_speech2text);
        self.route(router, keys::INVOKE_MODERATION, Self::invoke_moderation);
        self.route(
            router,
            keys::VALIDATE_PROVIDER_CREDENTIALS,
            Self::validate_provider_credentials,
        );
        self.route(router, keys::VALIDATE_MODEL_CREDENTIALS, Self::validate_model_credentials);
        self.route(router, keys::GET_AI_MODEL_SCHEMAS, Self::get_ai_model_schemas);

        self.route(router, keys::INVOKE_ENDPOINT, Self::invoke_endpoint);
    }

    fn route<T, F, Fut>(self: &Arc<Self>, router: &mut Router, key: RequestKey, handler: F)
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(Arc<Self>, SessionHandle, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<InvokeOutput>> + Send + 'static,
    {
        let executor = Arc::clone(self);
        router.register_typed(key, move |session, request| {
            handler(Arc::clone(&executor), session, request)
        });
    }

    // ── Tools ───────────────────────────────────────────────────────────

    pub async fn invoke_tool(
        self: Arc<Self>,
        session: SessionHandle,
        request: ToolInvokeRequest,
    ) -> Result<InvokeOutput> {
        let factory = self
            .registry
            .tool_class(&request.provider, &request.tool)
            .ok_or_else(|| tool_not_found(&request.provider, &request.tool))?;

        let runtime = ToolRuntime {
            credentials: request.credentials,
            credential_type: request.credential_type,
            user_id: request.user_id,
            session_id: session.session_id().to_string(),
        };
        debug!(provider = %request.provider, tool = %request.tool, "invoking tool");
        let tool = factory(runtime, session);
        tool.invoke(request.tool_parameters).await
    }

    pub async fn validate_tool_credentials(
        self: Arc<Self>,
        _session: SessionHandle,
        request: ToolValidateCredentialsRequest,
    ) -> Result<InvokeOutput> {
        let provider = self
            .registry
            .tool_provider(&request.provider)
            .ok_or_else(|| PluginError::NotFound(format!("tool provider '{}'", request.provider)))?;
        provider.validate_credentials(&request.credentials).await?;
        InvokeOutput::value(json!({ "result": true }))
    }

    pub async fn get_tool_runtime_parameters(
        self: Arc<Self>,
        session: SessionHandle,
        request: ToolGetRuntimeParametersRequest,
    ) -> Result<InvokeOutput> {
        let factory = self
            .registry
            .tool_class(&request.provider, &request.tool)
            .ok_or_else(|| tool_not_found(&request.provider, &request.tool))?;

        let runtime = ToolRuntime {
            credentials: request.credentials,
            user_id: request.user_id,
            session_id: session.session_id().to_string(),
            ..Default::default()
        };
        let parameters = factory(runtime, session).get_runtime_parameters().await?;
        InvokeOutput::value(json!({ "parameters": parameters }))
    }

    // ── Agent strategies ────────────────────────────────────────────────

    pub async fn invoke_agent_strategy(
        self: Arc<Self>,
        session: SessionHandle,
        request: AgentInvokeRequest,
    ) -> Result<InvokeOutput> {
        let factory = self
            .registry
            .agent_strategy(&request.agent_strategy_provider, &request.agent_strategy)
            .ok_or_else(|| {
                PluginError::NotFound(format!(
                    "agent strategy '{}' of provider '{}'",
                    request.agent_strategy, request.agent_strategy_provider
                ))
            })?;

        let runtime = AgentRuntime {
            user_id: request.user_id,
        };
        factory(runtime, session)
            .invoke(request.agent_strategy_parameters)
            .await
    }

    // ── Models ──────────────────────────────────────────────────────────

    fn model(&self, target: &ModelTarget, model_type: ModelType) -> Result<Arc<dyn AiModel>> {
        self.registry
            .model(&target.provider, model_type)
            .cloned()
            .ok_or_else(|| {
                PluginError::NotFound(format!(
                    "{model_type} model of provider '{}'",
                    target.provider
                ))
            })
    }

    pub async fn invoke_llm(
        self: Arc<Self>,
        _session: SessionHandle,
        request: ModelInvokeLlmRequest,
    ) -> Result<InvokeOutput> {
        let model = self.model(&request.target, ModelType::Llm)?;
        let llm = model.as_llm().ok_or_else(|| not_a(ModelType::Llm))?;
        llm.invoke(&request).await
    }

    pub async fn get_llm_num_tokens(
        self: Arc<Self>,
        _session: SessionHandle,
        request: ModelGetLlmNumTokensRequest,
    ) -> Result<InvokeOutput> {
        let model = self.model(&request.target, ModelType::Llm)?;
        let llm = model.as_llm().ok_or_else(|| not_a(ModelType::Llm))?;
        let num_tokens = llm.get_num_tokens(&request).await?;
        InvokeOutput::value(json!({ "numTokens": num_tokens }))
    }

    pub async fn invoke_text_embedding(
        self: Arc<Self>,
        _session: SessionHandle,
        request: ModelTextEmbeddingRequest,
    ) -> Result<InvokeOutput> {
        let model = self.model(&request.target, ModelType::TextEmbedding)?;
        let embedding = model
            .as_text_embedding()
            .ok_or_else(|| not_a(ModelType::TextEmbedding))?;
        Ok(InvokeOutput::Value(embedding.invoke(&request).await?))
    }

    pub async fn get_text_embedding_num_tokens(
        self: Arc<Self>,
        _session: SessionHandle,
        request: ModelTextEmbeddingRequest,
    ) -> Result<InvokeOutput> {
        let model = self.model(&request.target, ModelType::TextEmbedding)?;
        let embedding = model
            .as_text_embedding()
            .ok_or_else(|| not_a(ModelType::TextEmbedding))?;
        let num_tokens = embedding.get_num_tokens(&request).await?;
        InvokeOutput::value(json!({ "numTokens": num_tokens }))
    }

    pub async fn invoke_rerank(
        self: Arc<Self>,
        _session: SessionHandle,
        request: ModelInvokeRerankRequest,
    ) -> Result<InvokeOutput> {
        let model = self.model(&request.target, ModelType::Rerank)?;
        let rerank = model.as_rerank().ok_or_else(|| not_a(ModelType::Rerank))?;
        Ok(InvokeOutput::Value(rerank.invoke(&request).await?))
    }

    /// Audio chunks are sent hex-encoded, one `{result}` per chunk.
    pub async fn invoke_tts(
        self: Arc<Self>,
        _session: SessionHandle,
        request: ModelInvokeTtsRequest,
    ) -> Result<InvokeOutput> {
        let model = self.model(&request.target, ModelType::Tts)?;
        let tts = model.as_tts().ok_or_else(|| not_a(ModelType::Tts))?;
        let audio = tts.invoke(&request).await?;
        Ok(InvokeOutput::stream(audio.map(|chunk| {
            chunk.map(|bytes| json!({ "result": hex_encode(&bytes) }))
        })))
    }

    pub async fn get_tts_model_voices(
        self: Arc<Self>,
        _session: SessionHandle,
        request: ModelGetTtsVoicesRequest,
    ) -> Result<InvokeOutput> {
        let model = self.model(&request.target, ModelType::Tts)?;
        let tts = model.as_tts().ok_or_else(|| not_a(ModelType::Tts))?;
        let voices = tts.get_voices(&request).await?;
        InvokeOutput::value(json!({ "voices": voices }))
    }

    pub async fn invoke_speech2text(
        self: Arc<Self>,
        _session: SessionHandle,
        request: ModelInvokeSpeech2TextRequest,
    ) -> Result<InvokeOutput> {
        let model = self.model(&request.target, ModelType::Speech2Text)?;
        let s2t = model
            .as_speech2text()
            .ok_or_else(|| not_a(ModelType::Speech2Text))?;
        let text = s2t.invoke(&request).await?;
        InvokeOutput::value(json!({ "result": text }))
    }

    pub async fn invoke_moderation(
        self: Arc<Self>,
        _session: SessionHandle,
        request: ModelInvokeModerationRequest,
    ) -> Result<InvokeOutput> {
        let model = self.model(&request.target, ModelType::Moderation)?;
        let moderation = model
            .as_moderation()
            .ok_or_else(|| not_a(ModelType::Moderation))?;
        let flagged = moderation.invoke(&request).await?;
        InvokeOutput::value(json!({ "result": flagged }))
    }

    pub async fn validate_provider_credentials(
        self: Arc<Self>,
        _session: SessionHandle,
        request: ModelValidateProviderCredentialsRequest,
    ) -> Result<InvokeOutput> {
        let provider = self
            .registry
            .model_provider(&request.provider)
            .ok_or_else(|| {
                PluginError::NotFound(format!("model provider '{}'", request.provider))
            })?;
        provider
            .validate_provider_credentials(&request.credentials)
            .await?;
        InvokeOutput::value(json!({ "result": true, "credentials": request.credentials }))
    }

    pub async fn validate_model_credentials(
        self: Arc<Self>,
        _session: SessionHandle,
        request: ModelTargetRequest,
    ) -> Result<InvokeOutput> {
        let model = self.model(&request, request.model_type)?;
        model
            .validate_credentials(&request.model, &request.credentials)
            .await?;
        InvokeOutput::value(json!({ "result": true, "credentials": request.credentials }))
    }

    pub async fn get_ai_model_schemas(
        self: Arc<Self>,
        _session: SessionHandle,
        request: ModelTargetRequest,
    ) -> Result<InvokeOutput> {
        let model = self.model(&request, request.model_type)?;
        let schema = model
            .get_model_schema(&request.model, &request.credentials)
            .await?;
        InvokeOutput::value(json!({ "modelSchema": schema }))
    }

    // ── Endpoints ───────────────────────────────────────────────────────

    pub async fn invoke_endpoint(
        self: Arc<Self>,
        session: SessionHandle,
        request: EndpointInvokeRequest,
    ) -> Result<InvokeOutput> {
        let http = parse_raw_http_request(&request.raw_http_request);
        let (factory, params) = {
            let matched = self.registry.dispatch_endpoint(&http).ok_or_else(|| {
                PluginError::NotFound(format!("no endpoint for {} {}", http.method, http.path))
            })?;
            (Arc::clone(&matched.route.target), matched.params)
        };
        debug!(method = %http.method, path = %http.path, "invoking endpoint");
        factory(session)
            .invoke(http, params, request.settings)
            .await
    }
}

fn tool_not_found(provider: &str, tool: &str) -> PluginError {
    PluginError::NotFound(format!("tool '{tool}' of provider '{provider}'"))
}

fn not_a(model_type: ModelType) -> PluginError {
    PluginError::NotImplemented(format!("model does not implement {model_type}"))
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}
