//! # Graph validation
//!
//! Static checks run once before any code is generated. Every check runs on
//! every handler, filter and function, and all violations are returned
//! together in one [`ValidationErrors`]. The graph is never modified.
//!
//! Node-level checks live here; checks over the flow edges are in
//! [`structure`].

mod structure;

use crate::error::{ValidationError, ValidationErrorKind, ValidationErrors};
use crate::graph::{END, Fragment, Node, NodeGraph, START, UnitKind};
use crate::registry::{BuiltinKind, NodeDefinition, Registry};
use ahash::AHashSet;
use std::sync::Arc;

/// Checks `graph` against the kinds known to `registry`.
pub fn validate(graph: &NodeGraph, registry: &Registry) -> Result<(), ValidationErrors> {
    GraphValidator::new(graph, registry).run()
}

/// Collects violations across one pass over a graph.
pub struct GraphValidator<'a> {
    graph: &'a NodeGraph,
    registry: &'a Registry,
    errors: Vec<ValidationError>,
}

impl<'a> GraphValidator<'a> {
    pub fn new(graph: &'a NodeGraph, registry: &'a Registry) -> Self {
        Self {
            graph,
            registry,
            errors: Vec::new(),
        }
    }

    pub fn run(mut self) -> Result<(), ValidationErrors> {
        let fragments = self.graph.fragments();
        for fragment in &fragments {
            self.validate_fragment(fragment);
        }

        tracing::debug!(
            units = fragments.len(),
            errors = self.errors.len(),
            "validation finished"
        );
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(self.errors))
        }
    }

    fn add_error(
        &mut self,
        kind: ValidationErrorKind,
        location: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.errors.push(ValidationError::new(kind, location, message));
    }

    fn validate_fragment(&mut self, fragment: &Fragment<'a>) {
        let mut seen = AHashSet::new();
        for node in fragment.nodes {
            let location = fragment.node_location(&node.id);

            if node.id == START || node.id == END {
                self.add_error(
                    ValidationErrorKind::DuplicateId,
                    &location,
                    format!("node id '{}' collides with a flow sentinel", node.id),
                );
            } else if !seen.insert(node.id.as_str()) {
                self.add_error(
                    ValidationErrorKind::DuplicateId,
                    &location,
                    format!("node id '{}' is used more than once", node.id),
                );
            }

            let Some(def) = self.registry.lookup(&node.kind) else {
                self.add_error(
                    ValidationErrorKind::UnknownKind,
                    &location,
                    format!("node kind '{}' is not registered", node.kind),
                );
                continue;
            };

            self.validate_inputs(&location, node, &def);

            if fragment.kind == UnitKind::Filter && def.session_only {
                self.add_error(
                    ValidationErrorKind::NotAllowedInFilter,
                    &location,
                    format!(
                        "node kind '{}' needs the live session and cannot run in a filter",
                        node.kind
                    ),
                );
            }

            if node.kind == BuiltinKind::CallFunction.as_str() {
                self.validate_call(&location, node);
            }
        }

        structure::StructureCheck::new(*fragment, self.registry).run(&mut self.errors);
    }

    fn validate_inputs(&mut self, location: &str, node: &Node, def: &Arc<NodeDefinition>) {
        for port in &def.inputs {
            if port.required && port.default.is_none() && !node.inputs.contains_key(&port.name) {
                self.add_error(
                    ValidationErrorKind::MissingInput,
                    location,
                    format!("required input '{}' is missing", port.name),
                );
            }
        }

        // Scans take their collection from either a path or a value.
        let scans = [BuiltinKind::ForEach, BuiltinKind::ForEachWhere];
        if scans.iter().any(|k| k.as_str() == node.kind)
            && !node.inputs.contains_key("path")
            && !node.inputs.contains_key("collection")
        {
            self.add_error(
                ValidationErrorKind::MissingInput,
                location,
                "one of the inputs 'path' or 'collection' is required",
            );
        }
    }

    fn validate_call(&mut self, location: &str, node: &Node) {
        // A missing `function` input is already reported as a missing input.
        let Some(target) = node.inputs.get("function") else {
            return;
        };
        let Some(name) = target.as_str() else {
            self.add_error(
                ValidationErrorKind::UnknownFunction,
                location,
                "input 'function' must name a function literally",
            );
            return;
        };
        let Some(function) = self.graph.function(name) else {
            self.add_error(
                ValidationErrorKind::UnknownFunction,
                location,
                format!("function '{}' is not defined", name),
            );
            return;
        };
        for param in &function.parameters {
            if !node.inputs.contains_key(&param.name) {
                self.add_error(
                    ValidationErrorKind::MissingInput,
                    location,
                    format!(
                        "argument '{}' of function '{}' is missing",
                        param.name, function.name
                    ),
                );
            }
        }
    }
}
