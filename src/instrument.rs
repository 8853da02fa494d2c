//! # Instrumentation
//!
//! Two opt-in behaviours layered over node emission:
//!
//! - **Tracing**: trace points around every node and every handler or function
//!   invocation, reported to a pluggable sink in the generated runtime.
//! - **Cancellable waits**: `wait` and `waitUntil` race a timer against a
//!   cancellation signal. A unit that waits, or calls a function that does,
//!   takes a cancellation token and passes it on.
//!
//! Neither behaviour changes how node kinds are written; the generator and
//! the printers apply them uniformly.

use crate::graph::{FunctionDefinition, Node, NodeGraph, UnitKind};
use crate::registry::{BuiltinKind, Emitter, Registry};
use std::collections::BTreeSet;
use std::fmt;

/// The trace message vocabulary understood by debug consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceKind {
    EventStart,
    EventEnd,
    NodeStart,
    NodeEnd,
    NodeError,
    NodeWait,
    NodeResume,
}

impl TraceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceKind::EventStart => "event:start",
            TraceKind::EventEnd => "event:end",
            TraceKind::NodeStart => "node:start",
            TraceKind::NodeEnd => "node:end",
            TraceKind::NodeError => "node:error",
            TraceKind::NodeWait => "node:wait",
            TraceKind::NodeResume => "node:resume",
        }
    }
}

impl fmt::Display for TraceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Instrumentation {
    pub tracing: bool,
}

impl Instrumentation {
    pub fn new(tracing: bool) -> Self {
        Self { tracing }
    }

    /// Filters are pure transforms and are never traced.
    pub fn traces(&self, kind: UnitKind) -> bool {
        self.tracing && kind != UnitKind::Filter
    }
}

/// Which functions need a cancellation token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cancellation {
    functions: BTreeSet<String>,
}

impl Cancellation {
    /// Marks every function that waits, then every function that calls a
    /// marked one, until nothing changes.
    pub fn analyze(graph: &NodeGraph, registry: &Registry) -> Self {
        let mut functions: BTreeSet<String> = graph
            .functions
            .iter()
            .filter(|f| f.nodes.iter().any(|n| is_wait(registry, n)))
            .map(|f| f.name.clone())
            .collect();

        loop {
            let before = functions.len();
            for function in &graph.functions {
                if !functions.contains(&function.name) && calls_any(function, &functions) {
                    functions.insert(function.name.clone());
                }
            }
            if functions.len() == before {
                break;
            }
        }

        tracing::debug!(count = functions.len(), "cancellable functions resolved");
        Self { functions }
    }

    pub fn is_function_cancellable(&self, name: &str) -> bool {
        self.functions.contains(name)
    }

    /// Whether a unit with these nodes needs a cancellation token.
    pub fn needs_token(&self, registry: &Registry, nodes: &[Node]) -> bool {
        nodes.iter().any(|n| {
            is_wait(registry, n)
                || called_function(n).is_some_and(|f| self.functions.contains(f))
        })
    }
}

fn is_wait(registry: &Registry, node: &Node) -> bool {
    registry
        .lookup(&node.kind)
        .is_some_and(|def| matches!(def.emitter, Emitter::Builtin(kind) if kind.is_wait()))
}

/// The function named by a `callFunction` node.
pub(crate) fn called_function(node: &Node) -> Option<&str> {
    if node.kind != BuiltinKind::CallFunction.as_str() {
        return None;
    }
    node.inputs.get("function").and_then(|v| v.as_str())
}

fn calls_any(function: &FunctionDefinition, names: &BTreeSet<String>) -> bool {
    function
        .nodes
        .iter()
        .filter_map(called_function)
        .any(|f| names.contains(f))
}
