use super::BuiltinKind;
use crate::codegen::EmitContext;
use crate::error::GenerateError;
use crate::graph::Node;
use crate::schema::ValueType;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Defines the contract for emitting the statements of one node kind.
pub trait NodeBehavior: Send + Sync {
    fn emit(&self, ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError>;
}

impl<F> NodeBehavior for F
where
    F: Fn(&mut EmitContext<'_>, &Node) -> Result<(), GenerateError> + Send + Sync,
{
    fn emit(&self, ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
        self(ctx, node)
    }
}

/// Broad grouping used for catalog listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeCategory {
    Flow,
    Math,
    Logic,
    State,
    Geo,
    Session,
    Text,
    Custom,
}

/// How a node kind participates in control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowShape {
    /// One outgoing edge.
    Linear,
    /// Two outgoing edges labelled `true` and `false`.
    Decision,
    /// A loop: either one edge, or a `body` edge plus a continuation.
    Iteration,
    /// Ends the unit; no outgoing edge except an optional one to `end`.
    Terminal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortSpec {
    pub name: String,
    pub ty: ValueType,
    pub required: bool,
    pub default: Option<Value>,
}

/// What produces the statements of a node kind.
#[derive(Clone)]
pub enum Emitter {
    Builtin(BuiltinKind),
    Behavior(Arc<dyn NodeBehavior>),
    /// Registered without a callback; emits a placeholder.
    Missing,
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Emitter::Builtin(kind) => write!(f, "Builtin({:?})", kind),
            Emitter::Behavior(_) => write!(f, "Behavior(..)"),
            Emitter::Missing => write!(f, "Missing"),
        }
    }
}

/// The port contract and emitter of one node kind.
#[derive(Debug, Clone)]
pub struct NodeDefinition {
    pub kind: String,
    pub category: NodeCategory,
    pub shape: FlowShape,
    pub inputs: Vec<PortSpec>,
    pub outputs: Vec<PortSpec>,
    /// Uses the live session, so it cannot appear in a filter.
    pub session_only: bool,
    /// Accepts inputs beyond the declared ports.
    pub variadic: bool,
    pub emitter: Emitter,
}

impl NodeDefinition {
    pub fn new(kind: impl Into<String>, category: NodeCategory) -> Self {
        Self {
            kind: kind.into(),
            category,
            shape: FlowShape::Linear,
            inputs: Vec::new(),
            outputs: Vec::new(),
            session_only: false,
            variadic: false,
            emitter: Emitter::Missing,
        }
    }

    /// Adds a required input port.
    pub fn input(mut self, name: impl Into<String>, ty: ValueType) -> Self {
        self.inputs.push(PortSpec {
            name: name.into(),
            ty,
            required: true,
            default: None,
        });
        self
    }

    /// Adds an input port that falls back to `default` when absent.
    pub fn input_or(mut self, name: impl Into<String>, ty: ValueType, default: Value) -> Self {
        self.inputs.push(PortSpec {
            name: name.into(),
            ty,
            required: false,
            default: Some(default),
        });
        self
    }

    /// Adds an input port that may be left out entirely.
    pub fn optional_input(mut self, name: impl Into<String>, ty: ValueType) -> Self {
        self.inputs.push(PortSpec {
            name: name.into(),
            ty,
            required: false,
            default: None,
        });
        self
    }

    pub fn output(mut self, name: impl Into<String>, ty: ValueType) -> Self {
        self.outputs.push(PortSpec {
            name: name.into(),
            ty,
            required: false,
            default: None,
        });
        self
    }

    pub fn session_only(mut self) -> Self {
        self.session_only = true;
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn behavior(mut self, behavior: impl NodeBehavior + 'static) -> Self {
        self.emitter = Emitter::Behavior(Arc::new(behavior));
        self
    }

    pub(crate) fn shape(mut self, shape: FlowShape) -> Self {
        self.shape = shape;
        self
    }

    pub(crate) fn builtin(mut self, kind: BuiltinKind) -> Self {
        self.emitter = Emitter::Builtin(kind);
        self
    }

    pub fn input_spec(&self, name: &str) -> Option<&PortSpec> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output_spec(&self, name: &str) -> Option<&PortSpec> {
        self.outputs.iter().find(|p| p.name == name)
    }

    pub fn has_emitter(&self) -> bool {
        !matches!(self.emitter, Emitter::Missing)
    }
}
