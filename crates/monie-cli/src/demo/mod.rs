//! The demo plugin served by this binary.
//!
//! | Capability | Name | Module |
//! |------------|------|--------|
//! | tool provider | `demo` | `providers/demo` |
//! | tool | `echo` | `tools/echo` |
//! | tool | `fibonacci` (CPU-bound) | `tools/fibonacci` |
//! | tool | `countdown` (streaming) | `tools/countdown` |
//! | model provider | `demo` | `providers/demo` |
//! | LLM | `echo-llm` | `models/llm` |
//! | endpoint | `GET /duck/:id` | `endpoints/duck` |

mod endpoints;
mod models;
mod tools;

use monie_plugin::{
    ClassDef, Constructor, Contract, EndpointDeclaration, EndpointProviderDeclaration,
    ModelProviderDeclaration, ModuleBinding, PluginDefinition, PluginError, PluginManifest,
    PluginModule, PluginRegistry, StaticModuleResolver, ToolDeclaration, ToolProviderDeclaration,
};
use monie_types::{ModelType, StreamMessage};
use serde_json::json;

pub const PLUGIN_NAME: &str = "monie-demo";

/// Requests worth moving off the async runtime.
pub fn is_cpu_bound(message: &StreamMessage) -> bool {
    message.data["action"] == "invoke_tool" && message.data["tool"] == "fibonacci"
}

/// Load the demo plugin into a registry.
pub fn registry() -> Result<PluginRegistry, PluginError> {
    PluginRegistry::load(definition(), &resolver())
}

fn resolver() -> StaticModuleResolver {
    StaticModuleResolver::new()
        .module(
            "providers/demo",
            PluginModule::new()
                .export(
                    "DemoToolProvider",
                    ClassDef::new(
                        "DemoToolProvider",
                        Constructor::tool_provider(|| tools::DemoProvider),
                    )
                    .extends(Contract::ToolProvider),
                )
                .export(
                    "DemoModelProvider",
                    ClassDef::new(
                        "DemoModelProvider",
                        Constructor::model_provider(|| models::DemoProvider),
                    )
                    .extends(Contract::ModelProvider),
                ),
        )
        .module(
            "tools/echo",
            PluginModule::new().export_default(
                ClassDef::new(
                    "Echo",
                    Constructor::tool(|_runtime, session| tools::Echo::new(session)),
                )
                .extends(Contract::Tool),
            ),
        )
        .module(
            "tools/fibonacci",
            PluginModule::new().export_default(
                ClassDef::new("Fibonacci", Constructor::tool(|_, _| tools::Fibonacci))
                    .extends(Contract::Tool),
            ),
        )
        .module(
            "tools/countdown",
            PluginModule::new().export_default(
                ClassDef::new("Countdown", Constructor::tool(|_, _| tools::Countdown))
                    .extends(Contract::Tool),
            ),
        )
        .module(
            "models/llm",
            PluginModule::new().export_default(
                ClassDef::new("EchoLlm", Constructor::model(|| models::EchoLlm))
                    .extends(Contract::LargeLanguageModel),
            ),
        )
        .module(
            "endpoints/duck",
            PluginModule::new().export_default(
                ClassDef::new("Duck", Constructor::endpoint(|_session| endpoints::Duck))
                    .extends(Contract::Endpoint),
            ),
        )
}

fn tool(name: &str, description: &str, parameters: serde_json::Value) -> ToolDeclaration {
    ToolDeclaration {
        name: name.into(),
        label: [("en_US".to_string(), name.to_string())].into(),
        description: [("en_US".to_string(), description.to_string())].into(),
        parameters: vec![parameters],
        binding: ModuleBinding::new(format!("tools/{name}")),
    }
}

fn definition() -> PluginDefinition {
    let mut definition = PluginDefinition::new(PluginManifest {
        name: PLUGIN_NAME.into(),
        version: env!("CARGO_PKG_VERSION").into(),
        author: "monie".into(),
        label: [("en_US".to_string(), "Monie Demo".to_string())].into(),
        description: [(
            "en_US".to_string(),
            "Example tools, model and endpoint".to_string(),
        )]
        .into(),
        icon: Some("icon.svg".into()),
        tags: vec!["demo".into()],
    });

    definition.tool_providers.push(ToolProviderDeclaration {
        name: "demo".into(),
        label: Default::default(),
        description: Default::default(),
        credentials_for_provider: vec![json!({"name": "api_key", "type": "secret-input"})],
        binding: ModuleBinding::new("providers/demo").with_class("DemoToolProvider"),
        tools: vec![
            tool(
                "echo",
                "Return the parameters unchanged",
                json!({"name": "text", "type": "string"}),
            ),
            tool(
                "fibonacci",
                "Compute the n-th Fibonacci number",
                json!({"name": "n", "type": "number", "required": true}),
            ),
            tool(
                "countdown",
                "Stream the numbers from n down to 0",
                json!({"name": "n", "type": "number"}),
            ),
        ],
    });

    definition.model_providers.push(ModelProviderDeclaration {
        provider: "demo".into(),
        label: Default::default(),
        supported_model_types: vec![ModelType::Llm],
        models: vec![json!({"model": "echo-llm", "modelType": "llm"})],
        provider_credential_schema: None,
        model_credential_schema: None,
        binding: ModuleBinding::new("providers/demo").with_class("DemoModelProvider"),
        model_modules: vec!["models/llm".into()],
    });

    definition
        .endpoint_providers
        .push(EndpointProviderDeclaration {
            settings: vec![],
            endpoints: vec![EndpointDeclaration {
                path: "/duck/:id".into(),
                method: "GET".into(),
                hidden: false,
                binding: ModuleBinding::new("endpoints/duck"),
            }],
        });

    definition
}

#[cfg(test)]
mod tests {
    use super::*;
    use monie_plugin::HttpRequest;
    use monie_types::InboundEvent;

    #[test]
    fn demo_registry_loads() {
        let registry = registry().unwrap();
        assert_eq!(registry.manifest().name, PLUGIN_NAME);
        for name in ["echo", "fibonacci", "countdown"] {
            assert!(registry.tool_class("demo", name).is_some(), "{name}");
        }
        assert!(registry.model("demo", ModelType::Llm).is_some());
        assert_eq!(registry.endpoint_count(), 1);
    }

    #[test]
    fn duck_endpoint_matches() {
        let registry = registry().unwrap();
        let request = HttpRequest {
            method: "GET".into(),
            path: "/duck/7".into(),
            headers: Default::default(),
            query: Default::default(),
            body: String::new(),
        };
        let matched = registry.dispatch_endpoint(&request).unwrap();
        assert_eq!(matched.params["id"], "7");
    }

    #[test]
    fn only_fibonacci_is_cpu_bound() {
        let message = |tool: &str| StreamMessage {
            session_id: Some("s".into()),
            event: InboundEvent::Request,
            data: json!({"type": "tool", "action": "invoke_tool", "tool": tool}),
            conversation_id: None,
            message_id: None,
            app_id: None,
            endpoint_id: None,
            context: None,
        };
        assert!(is_cpu_bound(&message("fibonacci")));
        assert!(!is_cpu_bound(&message("echo")));
    }
}
