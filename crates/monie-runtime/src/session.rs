//! Per-request session.
//!
//! A [`Session`] is created when a request line arrives and dropped after
//! its terminal frame is written. Plugin code sees it as a
//! [`SessionContext`].

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use monie_plugin::SessionContext;
use monie_types::{ErrorResponse, LogLevel, SessionPayload, StreamMessage};

use crate::codec::FrameWriter;
use crate::error::Result;

/// One in-flight request.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    conversation_id: Option<String>,
    message_id: Option<String>,
    app_id: Option<String>,
    endpoint_id: Option<String>,
    context: Option<Value>,
    writer: FrameWriter,
}

impl Session {
    /// Session for `message`. `None` when the message carries no session id.
    pub fn from_message(message: &StreamMessage, writer: FrameWriter) -> Option<Self> {
        let id = message.session_id.clone()?;
        Some(Self {
            id,
            conversation_id: message.conversation_id.clone(),
            message_id: message.message_id.clone(),
            app_id: message.app_id.clone(),
            endpoint_id: message.endpoint_id.clone(),
            context: message.context.clone(),
            writer,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Intermediate `stream` frame.
    pub async fn stream(&self, result: Value) -> Result<()> {
        self.write(&SessionPayload::Stream { result }).await
    }

    /// Terminal `end` frame.
    pub async fn end(&self, result: Option<Value>) -> Result<()> {
        self.write(&SessionPayload::End { result }).await
    }

    /// Terminal `error` frame.
    pub async fn fail(&self, error: ErrorResponse) -> Result<()> {
        self.writer.error(&self.id, error).await
    }

    pub async fn write(&self, payload: &SessionPayload) -> Result<()> {
        self.writer.session(&self.id, payload).await
    }
}

#[async_trait]
impl SessionContext for Session {
    fn session_id(&self) -> &str {
        &self.id
    }

    fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    fn app_id(&self) -> Option<&str> {
        self.app_id.as_deref()
    }

    fn endpoint_id(&self) -> Option<&str> {
        self.endpoint_id.as_deref()
    }

    fn context(&self) -> Option<&Value> {
        self.context.as_ref()
    }

    async fn log(&self, level: LogLevel, message: String) {
        if let Err(e) = self.writer.log(level, message).await {
            debug!(session_id = %self.id, error = %e, "dropped session log");
        }
    }
}
