//! Model type enumeration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kind of AI model a provider exposes.
///
/// Model providers register at most one model implementation per type.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum ModelType {
    #[default]
    #[serde(rename = "llm")]
    Llm,
    #[serde(rename = "text-embedding")]
    TextEmbedding,
    #[serde(rename = "rerank")]
    Rerank,
    #[serde(rename = "speech2text")]
    Speech2Text,
    #[serde(rename = "tts")]
    Tts,
    #[serde(rename = "moderation")]
    Moderation,
}

impl ModelType {
    pub const ALL: [ModelType; 6] = [
        ModelType::Llm,
        ModelType::TextEmbedding,
        ModelType::Rerank,
        ModelType::Speech2Text,
        ModelType::Tts,
        ModelType::Moderation,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Llm => "llm",
            Self::TextEmbedding => "text-embedding",
            Self::Rerank => "rerank",
            Self::Speech2Text => "speech2text",
            Self::Tts => "tts",
            Self::Moderation => "moderation",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown model type: {s}"))
    }
}
