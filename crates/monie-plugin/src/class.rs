//! Class descriptors exported by plugin modules.
//!
//! A [`ClassDef`] is the unit the scanner classifies: a name, a set of
//! inherited [`Marker`]s, an abstract flag and an optional [`Constructor`].

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use monie_types::ModelType;

use crate::contract::{Contract, Marker};
use crate::traits::{
    AgentRuntime, AgentStrategy, AiModel, Endpoint, ModelProvider, SessionHandle, Tool,
    ToolProvider, ToolRuntime,
};

pub type ToolFactory = Arc<dyn Fn(ToolRuntime, SessionHandle) -> Box<dyn Tool> + Send + Sync>;
pub type ToolProviderFactory = Arc<dyn Fn() -> Arc<dyn ToolProvider> + Send + Sync>;
pub type ModelProviderFactory = Arc<dyn Fn() -> Arc<dyn ModelProvider> + Send + Sync>;
pub type ModelFactory = Arc<dyn Fn() -> Arc<dyn AiModel> + Send + Sync>;
pub type EndpointFactory = Arc<dyn Fn(SessionHandle) -> Box<dyn Endpoint> + Send + Sync>;
pub type AgentStrategyFactory =
    Arc<dyn Fn(AgentRuntime, SessionHandle) -> Box<dyn AgentStrategy> + Send + Sync>;

/// How to build an instance of a class.
#[derive(Clone)]
pub enum Constructor {
    Tool(ToolFactory),
    ToolProvider(ToolProviderFactory),
    ModelProvider(ModelProviderFactory),
    Model(ModelFactory),
    Endpoint(EndpointFactory),
    AgentStrategy(AgentStrategyFactory),
}

impl Constructor {
    pub fn tool<T, F>(f: F) -> Self
    where
        T: Tool + 'static,
        F: Fn(ToolRuntime, SessionHandle) -> T + Send + Sync + 'static,
    {
        Self::Tool(Arc::new(
            move |rt: ToolRuntime, session: SessionHandle| -> Box<dyn Tool> {
                Box::new(f(rt, session))
            },
        ))
    }

    pub fn tool_provider<T, F>(f: F) -> Self
    where
        T: ToolProvider + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::ToolProvider(Arc::new(move || -> Arc<dyn ToolProvider> { Arc::new(f()) }))
    }

    pub fn model_provider<T, F>(f: F) -> Self
    where
        T: ModelProvider + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::ModelProvider(Arc::new(move || -> Arc<dyn ModelProvider> { Arc::new(f()) }))
    }

    pub fn model<T, F>(f: F) -> Self
    where
        T: AiModel + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::Model(Arc::new(move || -> Arc<dyn AiModel> { Arc::new(f()) }))
    }

    pub fn endpoint<T, F>(f: F) -> Self
    where
        T: Endpoint + 'static,
        F: Fn(SessionHandle) -> T + Send + Sync + 'static,
    {
        Self::Endpoint(Arc::new(move |session: SessionHandle| -> Box<dyn Endpoint> {
            Box::new(f(session))
        }))
    }

    pub fn agent_strategy<T, F>(f: F) -> Self
    where
        T: AgentStrategy + 'static,
        F: Fn(AgentRuntime, SessionHandle) -> T + Send + Sync + 'static,
    {
        Self::AgentStrategy(Arc::new(
            move |rt: AgentRuntime, session: SessionHandle| -> Box<dyn AgentStrategy> {
                Box::new(f(rt, session))
            },
        ))
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Tool(_) => "tool",
            Self::ToolProvider(_) => "tool_provider",
            Self::ModelProvider(_) => "model_provider",
            Self::Model(_) => "model",
            Self::Endpoint(_) => "endpoint",
            Self::AgentStrategy(_) => "agent_strategy",
        }
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Constructor::{}", self.kind())
    }
}

/// A class exported by a plugin module.
#[derive(Debug, Clone)]
pub struct ClassDef {
    name: String,
    markers: BTreeSet<Marker>,
    is_abstract: bool,
    constructor: Option<Constructor>,
}

impl ClassDef {
    /// A concrete class with no markers yet.
    pub fn new(name: impl Into<String>, constructor: Constructor) -> Self {
        Self {
            name: name.into(),
            markers: BTreeSet::new(),
            is_abstract: false,
            constructor: Some(constructor),
        }
    }

    /// An abstract class: classifiable, never instantiated.
    pub fn abstract_class(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            markers: BTreeSet::new(),
            is_abstract: true,
            constructor: None,
        }
    }

    /// The abstract declaration of a contract itself. It carries the
    /// contract's markers but is excluded from classification unless
    /// abstract classes are requested.
    pub fn contract_declaration(contract: Contract) -> Self {
        let name = contract.to_string();
        Self::abstract_class(name).extends(contract)
    }

    /// Extend a contract, inheriting the markers of its whole lineage.
    pub fn extends(mut self, contract: Contract) -> Self {
        self.markers.extend(contract.lineage().map(|c| c.marker()));
        self
    }

    /// Extend another class, inheriting every marker it carries.
    pub fn inherits(mut self, parent: &ClassDef) -> Self {
        self.markers.extend(parent.markers.iter().copied());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn constructor(&self) -> Option<&Constructor> {
        self.constructor.as_ref()
    }

    pub fn markers(&self) -> impl Iterator<Item = Marker> + '_ {
        self.markers.iter().copied()
    }

    pub fn has_marker(&self, marker: Marker) -> bool {
        self.markers.contains(&marker)
    }

    /// Whether this class is a concrete implementation of `contract`.
    pub fn implements(&self, contract: Contract) -> bool {
        !self.is_abstract && self.has_marker(contract.marker())
    }

    /// Model type of a strict AiModel subtype, if any.
    pub fn model_type(&self) -> Option<ModelType> {
        ModelType::ALL
            .into_iter()
            .find(|t| self.has_marker(Contract::for_model_type(*t).marker()))
    }
}
