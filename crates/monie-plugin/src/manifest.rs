//! Plugin manifest and capability declarations.
//!
//! A [`PluginDefinition`] is the static description of a plugin: its
//! [`PluginManifest`] plus one declaration per tool, model, endpoint and
//! agent-strategy provider. Each declaration carries a [`ModuleBinding`]
//! naming the module (and optionally the class) that implements it. The
//! declarations are serialized as-is into the handshake frames.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use monie_types::ModelType;

use crate::error::PluginError;

/// Localized text keyed by language tag (`en_US`, `zh_Hans`, ...).
pub type I18nText = BTreeMap<String, String>;

/// Plugin manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    /// Unique plugin name (e.g., `"duck-tools"`).
    pub name: String,

    /// Semantic version string (must be valid semver).
    pub version: String,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub label: I18nText,

    #[serde(default)]
    pub description: I18nText,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,
}

impl PluginManifest {
    /// Validate the manifest. Returns an error describing the first
    /// validation failure, or `Ok(())` if the manifest is valid.
    pub fn validate(&self) -> Result<(), PluginError> {
        if self.name.is_empty() {
            return Err(PluginError::LoadFailed("manifest: name is required".into()));
        }
        if semver::Version::parse(&self.version).is_err() {
            return Err(PluginError::LoadFailed(format!(
                "manifest: invalid semver version '{}'",
                self.version
            )));
        }
        Ok(())
    }
}

/// Where a capability's implementation lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleBinding {
    /// Module path as registered with the resolver.
    pub module: String,

    /// Class name inside the module. Falls back to the default export.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
}

impl ModuleBinding {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            class: None,
        }
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDeclaration {
    pub name: String,
    #[serde(default)]
    pub label: I18nText,
    #[serde(default)]
    pub description: I18nText,
    /// Parameter schema entries.
    #[serde(default)]
    pub parameters: Vec<Value>,
    pub binding: ModuleBinding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolProviderDeclaration {
    pub name: String,
    #[serde(default)]
    pub label: I18nText,
    #[serde(default)]
    pub description: I18nText,
    #[serde(default)]
    pub credentials_for_provider: Vec<Value>,
    pub binding: ModuleBinding,
    #[serde(default)]
    pub tools: Vec<ToolDeclaration>,
}

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelProviderDeclaration {
    pub provider: String,
    #[serde(default)]
    pub label: I18nText,
    #[serde(default)]
    pub supported_model_types: Vec<ModelType>,
    /// Predefined model descriptions.
    #[serde(default)]
    pub models: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_credential_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_credential_schema: Option<Value>,
    pub binding: ModuleBinding,
    /// Modules scanned for model implementations.
    #[serde(default)]
    pub model_modules: Vec<String>,
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDeclaration {
    /// Path pattern, `:name` segments capture parameters.
    pub path: String,
    pub method: String,
    #[serde(default)]
    pub hidden: bool,
    pub binding: ModuleBinding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointProviderDeclaration {
    /// Settings schema entries shown to the user.
    #[serde(default)]
    pub settings: Vec<Value>,
    #[serde(default)]
    pub endpoints: Vec<EndpointDeclaration>,
}

// ---------------------------------------------------------------------------
// Agent strategies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStrategyDeclaration {
    pub name: String,
    #[serde(default)]
    pub label: I18nText,
    #[serde(default)]
    pub description: I18nText,
    #[serde(default)]
    pub parameters: Vec<Value>,
    #[serde(default)]
    pub features: Vec<String>,
    pub binding: ModuleBinding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStrategyProviderDeclaration {
    pub name: String,
    #[serde(default)]
    pub label: I18nText,
    #[serde(default)]
    pub strategies: Vec<AgentStrategyDeclaration>,
}

// ---------------------------------------------------------------------------
// Definition
// ---------------------------------------------------------------------------

/// Everything a plugin declares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDefinition {
    pub manifest: PluginManifest,
    #[serde(default)]
    pub tool_providers: Vec<ToolProviderDeclaration>,
    #[serde(default)]
    pub model_providers: Vec<ModelProviderDeclaration>,
    #[serde(default)]
    pub endpoint_providers: Vec<EndpointProviderDeclaration>,
    #[serde(default)]
    pub agent_strategy_providers: Vec<AgentStrategyProviderDeclaration>,
}

impl PluginDefinition {
    pub fn new(manifest: PluginManifest) -> Self {
        Self {
            manifest,
            tool_providers: Vec::new(),
            model_providers: Vec::new(),
            endpoint_providers: Vec::new(),
            agent_strategy_providers: Vec::new(),
        }
    }

    /// Parse a definition from a JSON string and validate its manifest.
    pub fn from_json(json: &str) -> Result<Self, PluginError> {
        let definition: Self = serde_json::from_str(json)?;
        definition.manifest.validate()?;
        Ok(definition)
    }
}
