//! Capability registry.
//!
//! [`PluginRegistry::load`] resolves every declaration of a
//! [`PluginDefinition`] to a classified class and keeps the resulting
//! providers, models and factories for lookup. Loading is all-or-nothing:
//! any import or selection failure fails the whole load.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use monie_types::ModelType;

use crate::asset::PluginAsset;
use crate::class::{AgentStrategyFactory, Constructor, EndpointFactory, ToolFactory};
use crate::contract::Contract;
use crate::endpoint::{EndpointMatch, EndpointTable, HttpRequest};
use crate::error::PluginError;
use crate::manifest::{
    AgentStrategyDeclaration, ModelProviderDeclaration, ModuleBinding, PluginDefinition,
    PluginManifest, ToolDeclaration, ToolProviderDeclaration,
};
use crate::scanner::{ClassInfo, ModuleClassScanner, ModuleResolver};
use crate::traits::{AiModel, ModelProvider, ToolProvider};

/// A tool class registered under its provider.
pub struct ToolRegistration {
    pub declaration: ToolDeclaration,
    pub class_name: String,
    pub factory: ToolFactory,
}

/// A tool provider instance and its tools, keyed by tool name.
pub struct ToolProviderRegistration {
    pub declaration: ToolProviderDeclaration,
    pub provider: Arc<dyn ToolProvider>,
    pub tools: HashMap<String, ToolRegistration>,
}

/// A model provider instance and one model instance per model type.
pub struct ModelProviderRegistration {
    pub declaration: ModelProviderDeclaration,
    pub provider: Arc<dyn ModelProvider>,
    pub models: HashMap<ModelType, Arc<dyn AiModel>>,
}

/// An agent strategy class.
pub struct AgentStrategyRegistration {
    pub declaration: AgentStrategyDeclaration,
    pub class_name: String,
    pub factory: AgentStrategyFactory,
}

/// Loaded capabilities of one plugin.
pub struct PluginRegistry {
    definition: PluginDefinition,
    tools: HashMap<String, ToolProviderRegistration>,
    models: HashMap<String, ModelProviderRegistration>,
    strategies: HashMap<String, HashMap<String, AgentStrategyRegistration>>,
    endpoints: EndpointTable<EndpointFactory>,
    assets: Vec<PluginAsset>,
}

impl PluginRegistry {
    /// Resolve and classify every declaration in `definition`.
    pub fn load(
        definition: PluginDefinition,
        resolver: &dyn ModuleResolver,
    ) -> Result<Self, PluginError> {
        definition.manifest.validate()?;
        let scanner = ModuleClassScanner::new(resolver);

        let mut tools = HashMap::new();
        for decl in &definition.tool_providers {
            let reg = load_tool_provider(&scanner, decl)?;
            info!(provider = %decl.name, tools = reg.tools.len(), "installed tool provider");
            tools.insert(decl.name.clone(), reg);
        }

        let mut models = HashMap::new();
        for decl in &definition.model_providers {
            let reg = load_model_provider(&scanner, decl)?;
            info!(provider = %decl.provider, models = reg.models.len(), "installed model provider");
            models.insert(decl.provider.clone(), reg);
        }

        let mut strategies: HashMap<String, HashMap<String, AgentStrategyRegistration>> =
            HashMap::new();
        for provider in &definition.agent_strategy_providers {
            let entry = strategies.entry(provider.name.clone()).or_default();
            for decl in &provider.strategies {
                let class = select_class(&scanner, &decl.binding, Contract::AgentStrategy)?;
                let factory = match class.class.constructor() {
                    Some(Constructor::AgentStrategy(f)) => f.clone(),
                    _ => {
                        return Err(wrong_constructor(&class, &decl.binding, Contract::AgentStrategy));
                    }
                };
                entry.insert(
                    decl.name.clone(),
                    AgentStrategyRegistration {
                        declaration: decl.clone(),
                        class_name: class.name,
                        factory,
                    },
                );
            }
            info!(provider = %provider.name, strategies = provider.strategies.len(), "installed agent strategy provider");
        }

        let mut endpoints = EndpointTable::new();
        for provider in &definition.endpoint_providers {
            for decl in &provider.endpoints {
                let class = select_class(&scanner, &decl.binding, Contract::Endpoint)?;
                let factory = match class.class.constructor() {
                    Some(Constructor::Endpoint(f)) => f.clone(),
                    _ => return Err(wrong_constructor(&class, &decl.binding, Contract::Endpoint)),
                };
                endpoints.add(&decl.path, vec![decl.method.clone()], factory)?;
                info!(path = %decl.path, method = %decl.method, "installed endpoint");
            }
        }

        Ok(Self {
            definition,
            tools,
            models,
            strategies,
            endpoints,
            assets: Vec::new(),
        })
    }

    /// Attach assets streamed during the handshake.
    pub fn with_assets(mut self, assets: Vec<PluginAsset>) -> Self {
        self.assets = assets;
        self
    }

    pub fn definition(&self) -> &PluginDefinition {
        &self.definition
    }

    pub fn manifest(&self) -> &PluginManifest {
        &self.definition.manifest
    }

    pub fn assets(&self) -> &[PluginAsset] {
        &self.assets
    }

    pub fn tool_provider(&self, provider: &str) -> Option<&Arc<dyn ToolProvider>> {
        self.tools.get(provider).map(|r| &r.provider)
    }

    pub fn tool_class(&self, provider: &str, tool: &str) -> Option<&ToolFactory> {
        self.tools
            .get(provider)
            .and_then(|r| r.tools.get(tool))
            .map(|t| &t.factory)
    }

    pub fn model_provider(&self, provider: &str) -> Option<&Arc<dyn ModelProvider>> {
        self.models.get(provider).map(|r| &r.provider)
    }

    pub fn model(&self, provider: &str, model_type: ModelType) -> Option<&Arc<dyn AiModel>> {
        self.models
            .get(provider)
            .and_then(|r| r.models.get(&model_type))
    }

    pub fn agent_strategy(&self, provider: &str, strategy: &str) -> Option<&AgentStrategyFactory> {
        self.strategies
            .get(provider)
            .and_then(|s| s.get(strategy))
            .map(|r| &r.factory)
    }

    /// First endpoint whose method and path match `request`.
    pub fn dispatch_endpoint(
        &self,
        request: &HttpRequest,
    ) -> Option<EndpointMatch<'_, EndpointFactory>> {
        self.endpoints.dispatch(request)
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugin", &self.definition.manifest.name)
            .field("tool_providers", &self.tools.len())
            .field("model_providers", &self.models.len())
            .field("strategy_providers", &self.strategies.len())
            .field("endpoints", &self.endpoints.len())
            .field("assets", &self.assets.len())
            .finish()
    }
}

fn load_tool_provider(
    scanner: &ModuleClassScanner<'_>,
    decl: &ToolProviderDeclaration,
) -> Result<ToolProviderRegistration, PluginError> {
    let class = select_class(scanner, &decl.binding, Contract::ToolProvider)?;
    let provider = match class.class.constructor() {
        Some(Constructor::ToolProvider(f)) => f(),
        _ => return Err(wrong_constructor(&class, &decl.binding, Contract::ToolProvider)),
    };

    let mut tools = HashMap::new();
    for tool in &decl.tools {
        let class = select_class(scanner, &tool.binding, Contract::Tool).map_err(|e| {
            PluginError::LoadFailed(format!("tool '{}' of provider '{}': {e}", tool.name, decl.name))
        })?;
        let factory = match class.class.constructor() {
            Some(Constructor::Tool(f)) => f.clone(),
            _ => return Err(wrong_constructor(&class, &tool.binding, Contract::Tool)),
        };
        debug!(provider = %decl.name, tool = %tool.name, class = %class.name, "registered tool");
        tools.insert(
            tool.name.clone(),
            ToolRegistration {
                declaration: tool.clone(),
                class_name: class.name,
                factory,
            },
        );
    }

    Ok(ToolProviderRegistration {
        declaration: decl.clone(),
        provider,
        tools,
    })
}

fn load_model_provider(
    scanner: &ModuleClassScanner<'_>,
    decl: &ModelProviderDeclaration,
) -> Result<ModelProviderRegistration, PluginError> {
    let class = select_class(scanner, &decl.binding, Contract::ModelProvider)?;
    let provider = match class.class.constructor() {
        Some(Constructor::ModelProvider(f)) => f(),
        _ => return Err(wrong_constructor(&class, &decl.binding, Contract::ModelProvider)),
    };

    let mut models = HashMap::new();
    for module in &decl.model_modules {
        for class in scanner.find_sub_classes(module, Contract::AiModel.marker(), false)? {
            // Only strict subtypes of AiModel carry a model type.
            let Some(model_type) = class.class.model_type() else {
                debug!(module = %module, class = %class.name, "skipping non-specific model class");
                continue;
            };
            let model = match class.class.constructor() {
                Some(Constructor::Model(f)) => f(),
                _ => {
                    return Err(PluginError::LoadFailed(format!(
                        "model class '{}' in {module} has no model constructor",
                        class.name
                    )));
                }
            };
            if model.model_type() != model_type {
                return Err(PluginError::LoadFailed(format!(
                    "model class '{}' extends {} but reports model type {}",
                    class.name,
                    Contract::for_model_type(model_type),
                    model.model_type()
                )));
            }
            if models.insert(model_type, model).is_some() {
                warn!(provider = %decl.provider, %model_type, class = %class.name, "model type registered twice, keeping the last");
            }
        }
    }

    Ok(ModelProviderRegistration {
        declaration: decl.clone(),
        provider,
        models,
    })
}

/// Pick the implementing class for a binding: the named class if present,
/// else the default export, else fail.
fn select_class(
    scanner: &ModuleClassScanner<'_>,
    binding: &ModuleBinding,
    contract: Contract,
) -> Result<ClassInfo, PluginError> {
    let candidates = scanner.find_sub_classes(&binding.module, contract.marker(), false)?;

    if let Some(name) = binding.class.as_deref().filter(|n| !n.is_empty()) {
        if let Some(found) = candidates.iter().find(|c| c.name == name) {
            return Ok(found.clone());
        }
    }

    candidates
        .into_iter()
        .find(|c| c.is_default)
        .ok_or_else(|| {
            PluginError::LoadFailed(format!(
                "no {contract} class found in module {}{}",
                binding.module,
                binding
                    .class
                    .as_deref()
                    .map(|c| format!(" (looked for '{c}' and the default export)"))
                    .unwrap_or_default()
            ))
        })
}

fn wrong_constructor(class: &ClassInfo, binding: &ModuleBinding, contract: Contract) -> PluginError {
    PluginError::LoadFailed(format!(
        "class '{}' in {} extends {contract} but cannot be constructed as one",
        class.name, binding.module
    ))
}
