//! Checks over the flow edges of one fragment.

use crate::error::{ValidationError, ValidationErrorKind};
use crate::graph::{END, FlowEdge, FlowIndex, Fragment, START};
use crate::registry::{BuiltinKind, Emitter, FlowShape, Registry};
use ahash::{AHashMap, AHashSet};
use itertools::Itertools;

pub(super) struct StructureCheck<'a> {
    fragment: Fragment<'a>,
    index: FlowIndex<'a>,
    /// Shape of every node whose kind is registered.
    shapes: AHashMap<&'a str, (FlowShape, Option<BuiltinKind>)>,
    errors: Vec<ValidationError>,
}

impl<'a> StructureCheck<'a> {
    pub(super) fn new(fragment: Fragment<'a>, registry: &Registry) -> Self {
        let shapes = fragment
            .nodes
            .iter()
            .filter_map(|node| {
                registry.lookup(&node.kind).map(|def| {
                    let builtin = match def.emitter {
                        Emitter::Builtin(kind) => Some(kind),
                        _ => None,
                    };
                    (node.id.as_str(), (def.shape, builtin))
                })
            })
            .collect();
        Self {
            fragment,
            index: FlowIndex::new(fragment.flow),
            shapes,
            errors: Vec::new(),
        }
    }

    pub(super) fn run(mut self, errors: &mut Vec<ValidationError>) {
        self.check_edges();
        self.check_start();
        self.check_reachable();
        self.check_arity();
        let acyclic = self.check_cycles();
        // The region and return walks assume loops only close through
        // iteration nodes.
        if acyclic {
            self.check_regions();
            self.check_returns();
        }
        errors.append(&mut self.errors);
    }

    fn add_error(
        &mut self,
        kind: ValidationErrorKind,
        location: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.errors.push(ValidationError::new(kind, location, message));
    }

    fn is_node(&self, id: &str) -> bool {
        self.fragment.node(id).is_some()
    }

    fn edge_location(&self, edge: &FlowEdge) -> String {
        format!(
            "{} / edge '{} -> {}'",
            self.fragment.location(),
            edge.from,
            edge.to
        )
    }

    fn check_edges(&mut self) {
        for edge in self.fragment.flow {
            if edge.from != START && !self.is_node(&edge.from) {
                self.add_error(
                    ValidationErrorKind::DanglingEdge,
                    self.edge_location(edge),
                    format!("edge starts at unknown node '{}'", edge.from),
                );
            }
            if edge.to != END && !self.is_node(&edge.to) {
                self.add_error(
                    ValidationErrorKind::DanglingEdge,
                    self.edge_location(edge),
                    format!("edge points at unknown node '{}'", edge.to),
                );
            }
        }
    }

    fn check_start(&mut self) {
        if self.fragment.nodes.is_empty() {
            return;
        }
        let starts = self.index.outgoing(START).len();
        match starts {
            0 => self.add_error(
                ValidationErrorKind::MissingStart,
                self.fragment.location(),
                "no flow edge leaves 'start'",
            ),
            1 => {}
            n => self.add_error(
                ValidationErrorKind::EdgeArity,
                self.fragment.location(),
                format!("{} flow edges leave 'start'; expected one", n),
            ),
        }
    }

    /// Nodes `start` never leads to would be dropped from the output.
    fn check_reachable(&mut self) {
        let Some(first) = self.index.start() else {
            return;
        };
        let reached = self.index.reachable(first);
        let unreached: Vec<&str> = self
            .fragment
            .nodes
            .iter()
            .map(|node| node.id.as_str())
            .filter(|id| !reached.contains(id))
            .unique()
            .collect();
        for id in unreached {
            self.add_error(
                ValidationErrorKind::UnreachableNode,
                self.fragment.node_location(id),
                "node is not reachable from 'start'",
            );
        }
    }

    fn check_arity(&mut self) {
        for node in self.fragment.nodes {
            let Some(&(shape, _)) = self.shapes.get(node.id.as_str()) else {
                continue;
            };
            let edges = self.index.outgoing(&node.id);
            let labels: Vec<Option<&str>> = edges.iter().map(|e| e.label.as_deref()).collect();

            let problem = match shape {
                FlowShape::Linear if edges.len() != 1 => Some(format!(
                    "expected exactly one outgoing edge, found {}",
                    edges.len()
                )),
                FlowShape::Decision => {
                    let labelled = edges.len() == 2
                        && labels.contains(&Some("true"))
                        && labels.contains(&Some("false"));
                    (!labelled).then(|| {
                        "expected two outgoing edges labelled 'true' and 'false'".to_string()
                    })
                }
                FlowShape::Iteration => {
                    let valid = match labels.as_slice() {
                        [None] | [Some("body")] => true,
                        [a, b] => {
                            let pair = [*a, *b];
                            pair.contains(&Some("body"))
                                && (pair.contains(&Some("done")) || pair.contains(&None))
                        }
                        _ => false,
                    };
                    (!valid).then(|| {
                        "expected one outgoing edge, or a 'body' edge and a 'done' edge"
                            .to_string()
                    })
                }
                FlowShape::Terminal => {
                    let valid = edges.is_empty() || (edges.len() == 1 && edges[0].to == END);
                    (!valid).then(|| "a terminal node may only continue to 'end'".to_string())
                }
                FlowShape::Linear => None,
            };

            if let Some(message) = problem {
                self.add_error(
                    ValidationErrorKind::EdgeArity,
                    self.fragment.node_location(&node.id),
                    message,
                );
            }
        }
    }

    /// Loops must close through an iteration node's `body` edge. Any other
    /// cycle cannot be written as structured code.
    fn check_cycles(&mut self) -> bool {
        let mut state: AHashMap<&'a str, bool> = AHashMap::new();
        let mut offenders = Vec::new();
        if let Some(first) = self.index.start() {
            self.visit(first, &mut state, &mut offenders);
        }
        let acyclic = offenders.is_empty();
        for (from, to) in offenders {
            self.add_error(
                ValidationErrorKind::UnstructuredFlow,
                self.fragment.node_location(from),
                format!("flow loops back to '{}' outside of an iteration body", to),
            );
        }
        acyclic
    }

    /// Depth-first walk; `state` is `false` while a node is on the stack.
    fn visit(
        &self,
        id: &'a str,
        state: &mut AHashMap<&'a str, bool>,
        offenders: &mut Vec<(&'a str, &'a str)>,
    ) {
        state.insert(id, false);
        for edge in self.index.outgoing(id) {
            let to = edge.to.as_str();
            match state.get(to) {
                Some(false) => {
                    if !self.is_loop_head(to) {
                        offenders.push((id, to));
                    }
                }
                Some(true) => {}
                None => self.visit(to, state, offenders),
            }
        }
        state.insert(id, true);
    }

    fn is_loop_head(&self, id: &str) -> bool {
        matches!(self.shapes.get(id), Some((FlowShape::Iteration, _)))
            && self.index.labeled(id, "body").is_some()
    }

    /// Loop heads whose body contains `id`. Their back edges close the body,
    /// so region walks inside it stop there.
    fn enclosing_loops(&self, id: &str) -> Vec<&'a str> {
        self.fragment
            .nodes
            .iter()
            .filter(|node| node.id != id && self.is_loop_head(&node.id))
            .filter_map(|node| {
                let head = self.index.intern(&node.id)?;
                let body = self.index.labeled(head, "body")?;
                self.index
                    .bfs_avoiding(body, &[head])
                    .iter()
                    .any(|n| *n == id)
                    .then_some(head)
            })
            .collect()
    }

    /// The two arms of a decision may only meet at their join point.
    fn check_regions(&mut self) {
        for node in self.fragment.nodes {
            if !matches!(
                self.shapes.get(node.id.as_str()),
                Some((FlowShape::Decision, _))
            ) {
                continue;
            }
            let (Some(on_true), Some(on_false)) = (
                self.index.labeled(&node.id, "true"),
                self.index.labeled(&node.id, "false"),
            ) else {
                continue;
            };
            let Some(decision) = self.index.intern(&node.id) else {
                continue;
            };

            let mut bounds = self.enclosing_loops(decision);
            bounds.push(decision);
            let join = self.index.join_point_within(on_true, on_false, &bounds);
            if join == Some(decision) {
                self.add_error(
                    ValidationErrorKind::UnstructuredFlow,
                    self.fragment.node_location(&node.id),
                    "both branches lead back to the decision itself",
                );
                continue;
            }

            let mut avoid = bounds;
            avoid.push(END);
            avoid.extend(join);
            let from_true: AHashSet<&str> =
                self.index.bfs_avoiding(on_true, &avoid).into_iter().collect();
            let mut shared: Vec<&str> = self
                .index
                .bfs_avoiding(on_false, &avoid)
                .into_iter()
                .filter(|id| from_true.contains(id))
                .collect();
            if !shared.is_empty() {
                shared.sort_unstable();
                self.add_error(
                    ValidationErrorKind::UnstructuredFlow,
                    self.fragment.node_location(&node.id),
                    format!(
                        "branches share node(s) {} before they join",
                        shared.iter().map(|id| format!("'{}'", id)).join(", ")
                    ),
                );
            }
        }
    }

    /// In a function with a return type, every way out must be a `return`
    /// with a value (or a `fail`).
    fn check_returns(&mut self) {
        if !self.fragment.returns.is_some_and(|r| !r.trim().is_empty()) {
            return;
        }
        let Some(start) = self.index.start() else {
            self.add_error(
                ValidationErrorKind::MissingReturn,
                self.fragment.location(),
                "function declares a return type but has no body",
            );
            return;
        };

        let mut seen = AHashSet::new();
        let mut stack = vec![(START, start)];
        let mut missing = Vec::new();

        while let Some((from, id)) = stack.pop() {
            if id == END {
                missing.push((from, "flow reaches 'end' without returning a value"));
                continue;
            }
            if !seen.insert(id) {
                continue;
            }
            let Some(&(shape, builtin)) = self.shapes.get(id) else {
                continue;
            };
            match (shape, builtin) {
                (FlowShape::Terminal, Some(BuiltinKind::Return)) => {
                    let supplies = self
                        .fragment
                        .node(id)
                        .is_some_and(|n| n.inputs.contains_key("value"));
                    if !supplies {
                        missing.push((id, "'return' does not supply a value"));
                    }
                }
                (FlowShape::Terminal, _) => {}
                (FlowShape::Iteration, _) => {
                    // The body may run zero times, so only the continuation
                    // can leave the function.
                    let next = if self.index.labeled(id, "body").is_some() {
                        self.index
                            .labeled(id, "done")
                            .or_else(|| self.index.unlabeled(id))
                    } else {
                        None
                    };
                    match next {
                        Some(next) => stack.push((id, next)),
                        None => missing.push((id, "flow may leave the loop without returning a value")),
                    }
                }
                _ => {
                    let edges = self.index.outgoing(id);
                    if edges.is_empty() {
                        missing.push((id, "flow stops here without returning a value"));
                    }
                    // Reversed so the walk follows authoring order.
                    for edge in edges.iter().rev() {
                        stack.push((id, edge.to.as_str()));
                    }
                }
            }
        }

        let mut reported = AHashSet::new();
        for (at, message) in missing {
            if !reported.insert(at) {
                continue;
            }
            let location = if at == START {
                self.fragment.location()
            } else {
                self.fragment.node_location(at)
            };
            self.add_error(ValidationErrorKind::MissingReturn, location, message);
        }
    }
}
