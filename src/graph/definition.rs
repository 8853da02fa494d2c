use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Sentinel id for the entry of every fragment's flow.
pub const START: &str = "start";
/// Sentinel id for the exit of every fragment's flow.
pub const END: &str = "end";

/// The top-level compilation unit, as read from graph JSON.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct NodeGraph {
    #[serde(default)]
    pub version: Value,
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub handlers: Vec<EventHandler>,
    #[serde(default)]
    pub filters: Vec<FilterDefinition>,
    #[serde(default)]
    pub functions: Vec<FunctionDefinition>,
    /// Named computed aggregates that `view:` references may use.
    #[serde(default)]
    pub views: Vec<ViewDeclaration>,
}

impl NodeGraph {
    pub fn from_json(json: &str) -> Result<Self, ParseError> {
        serde_json::from_str(json).map_err(|e| ParseError::Graph(e.to_string()))
    }

    /// All handlers, filters and functions in that order.
    pub fn fragments(&self) -> Vec<Fragment<'_>> {
        let handlers = self.handlers.iter().map(|h| Fragment {
            kind: UnitKind::Handler,
            name: &h.name,
            parameters: &h.parameters,
            returns: None,
            nodes: &h.nodes,
            flow: &h.flow,
        });
        let filters = self.filters.iter().map(|f| Fragment {
            kind: UnitKind::Filter,
            name: &f.name,
            parameters: &f.parameters,
            returns: None,
            nodes: &f.nodes,
            flow: &f.flow,
        });
        let functions = self.functions.iter().map(|f| Fragment {
            kind: UnitKind::Function,
            name: &f.name,
            parameters: &f.parameters,
            returns: Some(f.returns.as_str()),
            nodes: &f.nodes,
            flow: &f.flow,
        });
        handlers.chain(filters).chain(functions).collect()
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDefinition> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn view(&self, name: &str) -> Option<&ViewDeclaration> {
        self.views.iter().find(|v| v.name == name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct EventHandler {
    pub name: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub permissions: Option<Permissions>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub flow: Vec<FlowEdge>,
}

/// A pure state-to-state transform applied per viewer.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct FilterDefinition {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub flow: Vec<FlowEdge>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Return type spelling. Empty means the function returns nothing.
    #[serde(default, alias = "returnType")]
    pub returns: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub flow: Vec<FlowEdge>,
}

impl FunctionDefinition {
    pub fn has_return(&self) -> bool {
        !self.returns.trim().is_empty()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    #[serde(default)]
    pub host_only: bool,
    /// The sender must equal the value of this parameter.
    #[serde(default)]
    pub player_param: Option<String>,
    #[serde(default)]
    pub allowed_players: Vec<String>,
}

impl Permissions {
    pub fn is_empty(&self) -> bool {
        !self.host_only && self.player_param.is_none() && self.allowed_players.is_empty()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type", default)]
    pub ty: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ViewDeclaration {
    pub name: String,
    #[serde(rename = "type", default)]
    pub ty: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, Value>,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            inputs: BTreeMap::new(),
        }
    }

    pub fn with_input(mut self, port: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(port.into(), value.into());
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FlowEdge {
    pub from: String,
    pub to: String,
    #[serde(default, alias = "condition", skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl FlowEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            label: None,
        }
    }

    pub fn labeled(from: impl Into<String>, to: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            label: Some(label.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnitKind {
    Handler,
    Filter,
    Function,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitKind::Handler => write!(f, "handler"),
            UnitKind::Filter => write!(f, "filter"),
            UnitKind::Function => write!(f, "function"),
        }
    }
}

/// A borrowed, kind-agnostic view of one handler, filter or function.
#[derive(Debug, Clone, Copy)]
pub struct Fragment<'a> {
    pub kind: UnitKind,
    pub name: &'a str,
    pub parameters: &'a [Parameter],
    /// The declared return type spelling; `None` outside functions.
    pub returns: Option<&'a str>,
    pub nodes: &'a [Node],
    pub flow: &'a [FlowEdge],
}

impl<'a> Fragment<'a> {
    pub fn node(&self, id: &str) -> Option<&'a Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn parameter(&self, name: &str) -> Option<&'a Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Human-readable location, e.g. `handler 'OnJoin'`.
    pub fn location(&self) -> String {
        format!("{} '{}'", self.kind, self.name)
    }

    pub fn node_location(&self, id: &str) -> String {
        format!("{} '{}' / node '{}'", self.kind, self.name, id)
    }
}
