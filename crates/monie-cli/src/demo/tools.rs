//! Demo tools.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use serde_json::{Map, Value, json};

use monie_plugin::{Credentials, InvokeOutput, PluginError, SessionHandle, Tool, ToolProvider};
use monie_types::LogLevel;

/// Largest `n` whose Fibonacci number fits in a `u128`.
const MAX_FIBONACCI: u64 = 186;

pub struct DemoProvider;

#[async_trait]
impl ToolProvider for DemoProvider {
    async fn validate_credentials(&self, credentials: &Credentials) -> Result<(), PluginError> {
        match credentials.get("api_key").and_then(Value::as_str) {
            Some(key) if !key.is_empty() => Ok(()),
            _ => Err(PluginError::InvalidCredentials("api_key is required".into())),
        }
    }
}

/// Returns its parameters and logs the call to the host.
pub struct Echo {
    session: SessionHandle,
}

impl Echo {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Tool for Echo {
    async fn invoke(&self, parameters: Map<String, Value>) -> Result<InvokeOutput, PluginError> {
        self.session
            .log(LogLevel::Info, format!("echo: {} parameters", parameters.len()))
            .await;
        InvokeOutput::value(json!({ "echo": parameters }))
    }
}

pub struct Fibonacci;

#[async_trait]
impl Tool for Fibonacci {
    async fn invoke(&self, parameters: Map<String, Value>) -> Result<InvokeOutput, PluginError> {
        let n = number(&parameters, "n")?;
        if n > MAX_FIBONACCI {
            return Err(PluginError::InvalidRequest(format!(
                "n must be at most {MAX_FIBONACCI}, got {n}"
            )));
        }
        // Decimal string: JSON numbers lose precision past 2^53.
        InvokeOutput::value(json!({ "n": n, "value": fibonacci(n).to_string() }))
    }
}

fn fibonacci(n: u64) -> u128 {
    // `b` runs one step ahead and may saturate on the last step.
    let (mut a, mut b) = (0u128, 1u128);
    for _ in 0..n {
        (a, b) = (b, a.saturating_add(b));
    }
    a
}

/// Streams `n, n-1, ..., 0`, pausing `delayMs` between items.
pub struct Countdown;

#[async_trait]
impl Tool for Countdown {
    async fn invoke(&self, parameters: Map<String, Value>) -> Result<InvokeOutput, PluginError> {
        let n = number(&parameters, "n")?;
        let delay = Duration::from_millis(
            parameters.get("delayMs").and_then(Value::as_u64).unwrap_or(0),
        );
        let chunks = stream::iter((0..=n).rev()).then(move |i| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok::<_, PluginError>(json!({ "remaining": i }))
        });
        Ok(InvokeOutput::stream(chunks))
    }
}

fn number(parameters: &Map<String, Value>, key: &str) -> Result<u64, PluginError> {
    parameters
        .get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| PluginError::InvalidRequest(format!("'{key}' must be a non-negative integer")))
}
