//! Capability contracts and their markers.
//!
//! Every contract has a namespaced marker key (`monie.capability.<name>`).
//! A class picks up markers only by extending a contract (see
//! [`ClassDef::extends`](crate::class::ClassDef::extends)); extending a
//! subtype also adds the markers of every ancestor. Classification is a set
//! lookup on those markers and never looks at what the class can construct.

use std::fmt;

use monie_types::ModelType;

const MARKER_NAMESPACE: &str = "monie.capability.";

/// A unique, namespaced capability tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Marker(&'static str);

impl Marker {
    /// Full key, e.g. `monie.capability.tool`.
    pub fn key(&self) -> &'static str {
        self.0
    }

    /// Key without the namespace prefix.
    pub fn short_name(&self) -> &'static str {
        self.0.strip_prefix(MARKER_NAMESPACE).unwrap_or(self.0)
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// The abstract capability bases a plugin class may extend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Contract {
    Tool,
    ToolProvider,
    ModelProvider,
    AiModel,
    LargeLanguageModel,
    TextEmbeddingModel,
    RerankModel,
    Speech2TextModel,
    TtsModel,
    ModerationModel,
    Endpoint,
    AgentStrategy,
}

impl Contract {
    pub const ALL: [Contract; 12] = [
        Contract::Tool,
        Contract::ToolProvider,
        Contract::ModelProvider,
        Contract::AiModel,
        Contract::LargeLanguageModel,
        Contract::TextEmbeddingModel,
        Contract::RerankModel,
        Contract::Speech2TextModel,
        Contract::TtsModel,
        Contract::ModerationModel,
        Contract::Endpoint,
        Contract::AgentStrategy,
    ];

    /// The contract's marker.
    pub fn marker(&self) -> Marker {
        Marker(match self {
            Self::Tool => "monie.capability.tool",
            Self::ToolProvider => "monie.capability.tool_provider",
            Self::ModelProvider => "monie.capability.model_provider",
            Self::AiModel => "monie.capability.ai_model",
            Self::LargeLanguageModel => "monie.capability.large_language_model",
            Self::TextEmbeddingModel => "monie.capability.text_embedding_model",
            Self::RerankModel => "monie.capability.rerank_model",
            Self::Speech2TextModel => "monie.capability.speech2text_model",
            Self::TtsModel => "monie.capability.tts_model",
            Self::ModerationModel => "monie.capability.moderation_model",
            Self::Endpoint => "monie.capability.endpoint",
            Self::AgentStrategy => "monie.capability.agent_strategy",
        })
    }

    /// The contract this one refines, if any.
    pub fn parent(&self) -> Option<Contract> {
        match self {
            Self::LargeLanguageModel
            | Self::TextEmbeddingModel
            | Self::RerankModel
            | Self::Speech2TextModel
            | Self::TtsModel
            | Self::ModerationModel => Some(Self::AiModel),
            _ => None,
        }
    }

    /// This contract followed by its ancestors.
    pub fn lineage(&self) -> impl Iterator<Item = Contract> {
        std::iter::successors(Some(*self), Contract::parent)
    }

    /// Model type served by a concrete model contract.
    pub fn model_type(&self) -> Option<ModelType> {
        match self {
            Self::LargeLanguageModel => Some(ModelType::Llm),
            Self::TextEmbeddingModel => Some(ModelType::TextEmbedding),
            Self::RerankModel => Some(ModelType::Rerank),
            Self::Speech2TextModel => Some(ModelType::Speech2Text),
            Self::TtsModel => Some(ModelType::Tts),
            Self::ModerationModel => Some(ModelType::Moderation),
            _ => None,
        }
    }

    /// The model contract for a model type.
    pub fn for_model_type(model_type: ModelType) -> Contract {
        match model_type {
            ModelType::Llm => Self::LargeLanguageModel,
            ModelType::TextEmbedding => Self::TextEmbeddingModel,
            ModelType::Rerank => Self::RerankModel,
            ModelType::Speech2Text => Self::Speech2TextModel,
            ModelType::Tts => Self::TtsModel,
            ModelType::Moderation => Self::ModerationModel,
        }
    }

    /// Look a contract up by marker.
    pub fn from_marker(marker: Marker) -> Option<Contract> {
        Self::ALL.into_iter().find(|c| c.marker() == marker)
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker().short_name())
    }
}
