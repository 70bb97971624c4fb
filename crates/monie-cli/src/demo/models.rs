//! Demo model provider with an LLM that echoes the last user message.

use async_trait::async_trait;
use serde_json::{Value, json};

use monie_plugin::{
    AiModel, Credentials, InvokeOutput, LargeLanguageModel, ModelProvider, PluginError,
};
use monie_types::ModelType;
use monie_types::request::{ModelGetLlmNumTokensRequest, ModelInvokeLlmRequest};

pub struct DemoProvider;

#[async_trait]
impl ModelProvider for DemoProvider {
    async fn validate_provider_credentials(
        &self,
        _credentials: &Credentials,
    ) -> Result<(), PluginError> {
        Ok(())
    }
}

pub struct EchoLlm;

#[async_trait]
impl AiModel for EchoLlm {
    fn model_type(&self) -> ModelType {
        ModelType::Llm
    }

    async fn validate_credentials(
        &self,
        model: &str,
        _credentials: &Credentials,
    ) -> Result<(), PluginError> {
        if model == "echo-llm" {
            Ok(())
        } else {
            Err(PluginError::InvalidCredentials(format!("unknown model: {model}")))
        }
    }

    fn as_llm(&self) -> Option<&dyn LargeLanguageModel> {
        Some(self)
    }
}

#[async_trait]
impl LargeLanguageModel for EchoLlm {
    async fn invoke(&self, request: &ModelInvokeLlmRequest) -> Result<InvokeOutput, PluginError> {
        let text = last_content(&request.prompt_messages);
        let model = request.target.model.clone();

        if !request.stream {
            return InvokeOutput::value(json!({
                "model": model,
                "message": {"role": "assistant", "content": text},
            }));
        }

        let words: Vec<&str> = text.split_whitespace().collect();
        let last = words.len().saturating_sub(1);
        let chunks = words
            .iter()
            .enumerate()
            .map(|(index, word)| {
                let content = if index == last {
                    word.to_string()
                } else {
                    format!("{word} ")
                };
                json!({
                    "model": model,
                    "delta": {"index": index, "message": {"role": "assistant", "content": content}},
                })
            })
            .collect();
        Ok(InvokeOutput::chunks(chunks))
    }

    async fn get_num_tokens(
        &self,
        request: &ModelGetLlmNumTokensRequest,
    ) -> Result<u64, PluginError> {
        let words: usize = request
            .prompt_messages
            .iter()
            .filter_map(|m| m.get("content").and_then(Value::as_str))
            .map(|c| c.split_whitespace().count())
            .sum();
        Ok(words as u64)
    }
}

/// Text content of the last message that has any.
fn last_content(messages: &[Value]) -> String {
    messages
        .iter()
        .rev()
        .find_map(|m| m.get("content").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn request(stream: bool) -> ModelInvokeLlmRequest {
        serde_json::from_value(json!({
            "provider": "demo",
            "model": "echo-llm",
            "modelType": "llm",
            "promptMessages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "hello there duck"},
            ],
            "stream": stream,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn streams_one_chunk_per_word() {
        let InvokeOutput::Stream(stream) = EchoLlm.invoke(&request(true)).await.unwrap() else {
            panic!("expected a stream");
        };
        let chunks: Vec<Value> = stream.map(|c| c.unwrap()).collect().await;
        let text: String = chunks
            .iter()
            .map(|c| c["delta"]["message"]["content"].as_str().unwrap())
            .collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(text, "hello there duck");
    }

    #[tokio::test]
    async fn blocking_mode_returns_whole_message() {
        let InvokeOutput::Value(v) = EchoLlm.invoke(&request(false)).await.unwrap() else {
            panic!("expected a value");
        };
        assert_eq!(v["message"]["content"], "hello there duck");
    }

    #[tokio::test]
    async fn counts_words_as_tokens() {
        let req: ModelGetLlmNumTokensRequest = serde_json::from_value(json!({
            "provider": "demo",
            "model": "echo-llm",
            "promptMessages": [{"content": "a b"}, {"content": "c"}, {"role": "tool"}],
        }))
        .unwrap();
        assert_eq!(EchoLlm.get_num_tokens(&req).await.unwrap(), 3);
    }
}
