//! Stream envelopes exchanged with the host.
//!
//! Inbound lines decode into [`StreamMessage`]; everything the plugin writes
//! is a [`StreamFrame`]. Both use camelCase keys on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorResponse;

// ── Inbound ─────────────────────────────────────────────────────────────

/// Events the host may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboundEvent {
    /// A live invocation; requires a session id.
    Request,
    /// Out-of-band host liveness ping.
    Heartbeat,
    /// Out-of-band host log line.
    Log,
    /// Anything this runtime does not understand.
    #[serde(other)]
    Unknown,
}

/// One decoded inbound line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMessage {
    /// Session identifier. `None` only for system events.
    #[serde(default, alias = "session_id")]
    pub session_id: Option<String>,

    /// Event kind.
    pub event: InboundEvent,

    /// Opaque payload, `{type, action, ...}` for requests.
    #[serde(default)]
    pub data: Value,

    #[serde(default, skip_serializing_if = "Option::is_none", alias = "conversation_id")]
    pub conversation_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", alias = "message_id")]
    pub message_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", alias = "app_id")]
    pub app_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", alias = "endpoint_id")]
    pub endpoint_id: Option<String>,

    /// Free-form invocation context forwarded by the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl StreamMessage {
    /// Build a request envelope.
    pub fn request(session_id: impl Into<String>, data: Value) -> Self {
        Self {
            session_id: Some(session_id.into()),
            event: InboundEvent::Request,
            data,
            conversation_id: None,
            message_id: None,
            app_id: None,
            endpoint_id: None,
            context: None,
        }
    }

    /// Whether this is an out-of-band system event (heartbeat or log).
    pub fn is_system_event(&self) -> bool {
        matches!(self.event, InboundEvent::Heartbeat | InboundEvent::Log)
    }

    /// `data.type`, if present.
    pub fn invoke_type(&self) -> Option<&str> {
        self.data.get("type").and_then(Value::as_str)
    }

    /// `data.action`, if present.
    pub fn action(&self) -> Option<&str> {
        self.data.get("action").and_then(Value::as_str)
    }
}

// ── Outbound ────────────────────────────────────────────────────────────

/// Events the plugin emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundEvent {
    Log,
    Heartbeat,
    Session,
    ManifestDeclaration,
    ToolDeclaration,
    ModelDeclaration,
    EndpointDeclaration,
    AgentStrategyDeclaration,
    AssetChunk,
    /// End of the declaration handshake.
    End,
}

impl OutboundEvent {
    /// Declaration and asset frames only appear during the handshake.
    pub fn is_handshake(&self) -> bool {
        matches!(
            self,
            Self::ManifestDeclaration
                | Self::ToolDeclaration
                | Self::ModelDeclaration
                | Self::EndpointDeclaration
                | Self::AgentStrategyDeclaration
                | Self::AssetChunk
                | Self::End
        )
    }
}

/// A single outbound line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamFrame {
    pub event: OutboundEvent,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl StreamFrame {
    /// Generic constructor.
    pub fn new(event: OutboundEvent, session_id: Option<String>, data: Option<Value>) -> Self {
        Self {
            event,
            session_id,
            data,
        }
    }

    /// `{"event":"heartbeat"}`.
    pub fn heartbeat() -> Self {
        Self::new(OutboundEvent::Heartbeat, None, None)
    }

    /// `{"event":"end"}`.
    pub fn end() -> Self {
        Self::new(OutboundEvent::End, None, None)
    }

    /// A log frame; never tagged with a session.
    pub fn log(log: &LogEvent) -> serde_json::Result<Self> {
        Ok(Self::new(
            OutboundEvent::Log,
            None,
            Some(serde_json::to_value(log)?),
        ))
    }

    /// A session-tagged frame.
    pub fn session(session_id: impl Into<String>, payload: &SessionPayload) -> serde_json::Result<Self> {
        Ok(Self::new(
            OutboundEvent::Session,
            Some(session_id.into()),
            Some(serde_json::to_value(payload)?),
        ))
    }

    /// A declaration frame carrying arbitrary serialized metadata.
    pub fn declaration(event: OutboundEvent, data: Value) -> Self {
        Self::new(event, None, Some(data))
    }

    /// An asset chunk frame.
    pub fn asset_chunk(chunk: &AssetChunk) -> serde_json::Result<Self> {
        Ok(Self::new(
            OutboundEvent::AssetChunk,
            None,
            Some(serde_json::to_value(chunk)?),
        ))
    }

    /// Serialize to a single newline-terminated line.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Decode the `data` of a session frame.
    pub fn session_payload(&self) -> Option<SessionPayload> {
        if self.event != OutboundEvent::Session {
            return None;
        }
        self.data
            .as_ref()
            .and_then(|d| serde_json::from_value(d.clone()).ok())
    }
}

/// Body of a `session` frame.
///
/// `Stream` frames carry intermediate chunks; exactly one `End` or `Error`
/// closes every session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionPayload {
    Stream {
        result: Value,
    },
    End {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },
    Error {
        error: ErrorResponse,
    },
}

impl SessionPayload {
    /// `End` and `Error` close a session.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Stream { .. })
    }
}

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Body of a `log` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub level: LogLevel,
    pub message: String,
    /// Unix time in seconds.
    pub timestamp: f64,
}

impl LogEvent {
    /// A log event stamped with the current time.
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        Self {
            level,
            message: message.into(),
            timestamp: millis as f64 / 1000.0,
        }
    }
}

/// One base64 fragment of a plugin asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetChunk {
    pub filename: String,
    /// Base64 (standard alphabet) encoded bytes.
    pub data: String,
    /// Set on the last chunk of `filename`.
    pub end: bool,
}
