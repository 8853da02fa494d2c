use super::ast::{Ambient, Block, Expr, Literal, Stmt};
use crate::error::{GenerateError, ResolveError};
use crate::graph::{Fragment, InputRef, Node, NodeGraph, UnitKind};
use crate::instrument::{Cancellation, Instrumentation};
use crate::naming::ident;
use crate::registry::Registry;
use crate::schema::{SchemaContext, ValueType};
use ahash::{AHashMap, AHashSet};
use std::collections::BTreeSet;

/// A variable emitted for one node output.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub var: String,
    pub ty: ValueType,
}

/// An open loop, innermost last.
#[derive(Debug, Clone)]
pub(crate) struct LoopScope {
    pub node: String,
    pub index: String,
}

/// Emission state for one handler, filter or function.
///
/// Node behaviours receive a `&mut EmitContext` and use it to read their
/// inputs, declare their outputs and push statements into the current block.
pub struct EmitContext<'a> {
    graph: &'a NodeGraph,
    registry: &'a Registry,
    schema: Option<&'a SchemaContext>,
    fragment: Fragment<'a>,
    instrumentation: Instrumentation,
    cancellation: &'a Cancellation,
    cancellable: bool,
    blocks: Vec<Block>,
    /// Scoped reference table, keyed by `(node, port)`.
    scopes: Vec<AHashMap<(String, String), Binding>>,
    pub(crate) loops: Vec<LoopScope>,
    counters: AHashMap<String, u32>,
    used: AHashSet<String>,
    emitted: AHashSet<String>,
    node_ids: AHashSet<&'a str>,
    pub(crate) placeholders: usize,
    pub(crate) views: BTreeSet<String>,
}

impl<'a> EmitContext<'a> {
    pub(crate) fn new(
        graph: &'a NodeGraph,
        registry: &'a Registry,
        schema: Option<&'a SchemaContext>,
        fragment: Fragment<'a>,
        instrumentation: Instrumentation,
        cancellation: &'a Cancellation,
    ) -> Self {
        let cancellable = cancellation.needs_token(registry, fragment.nodes);
        let mut used = AHashSet::new();
        for param in fragment.parameters {
            used.insert(ident(&param.name));
        }
        Self {
            graph,
            registry,
            schema,
            fragment,
            instrumentation,
            cancellation,
            cancellable,
            blocks: vec![Vec::new()],
            scopes: vec![AHashMap::new()],
            loops: Vec::new(),
            counters: AHashMap::new(),
            used,
            emitted: AHashSet::new(),
            node_ids: fragment.nodes.iter().map(|n| n.id.as_str()).collect(),
            placeholders: 0,
            views: BTreeSet::new(),
        }
    }

    pub fn graph(&self) -> &'a NodeGraph {
        self.graph
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    pub fn schema(&self) -> Option<&'a SchemaContext> {
        self.schema
    }

    pub fn fragment(&self) -> Fragment<'a> {
        self.fragment
    }

    pub fn unit_name(&self) -> &'a str {
        self.fragment.name
    }

    pub fn unit_kind(&self) -> UnitKind {
        self.fragment.kind
    }

    pub fn is_traced(&self) -> bool {
        self.instrumentation.traces(self.fragment.kind)
    }

    pub fn is_cancellable(&self) -> bool {
        self.cancellable
    }

    pub fn cancellation(&self) -> &'a Cancellation {
        self.cancellation
    }

    // --- statements ---

    pub fn push(&mut self, stmt: Stmt) {
        if let Some(block) = self.blocks.last_mut() {
            block.push(stmt);
        }
    }

    /// Runs `f` in a fresh nested block and returns the statements it
    /// pushed. Bindings declared inside go out of scope afterwards.
    pub fn block<F>(&mut self, f: F) -> Result<Block, GenerateError>
    where
        F: FnOnce(&mut Self) -> Result<(), GenerateError>,
    {
        self.blocks.push(Vec::new());
        self.scopes.push(AHashMap::new());
        let result = f(self);
        self.scopes.pop();
        let block = self.blocks.pop().unwrap_or_default();
        result.map(|()| block)
    }

    pub(crate) fn take_body(&mut self) -> Block {
        self.blocks
            .first_mut()
            .map(std::mem::take)
            .unwrap_or_default()
    }

    // --- names ---

    /// Returns an identifier no other variable in this unit uses.
    pub fn fresh(&mut self, base: &str) -> String {
        let name = ident(base);
        if self.used.insert(name.clone()) {
            return name;
        }
        let counter = self.counters.entry(name.clone()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{}_{}", name, counter);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// Declares a variable for `node`'s output `port` and records it in the
    /// reference table.
    pub fn declare(&mut self, node: &Node, port: &str, ty: ValueType, value: Expr) -> String {
        self.declare_with(node, port, ty, value, false)
    }

    pub fn declare_mut(&mut self, node: &Node, port: &str, ty: ValueType, value: Expr) -> String {
        self.declare_with(node, port, ty, value, true)
    }

    fn declare_with(
        &mut self,
        node: &Node,
        port: &str,
        ty: ValueType,
        value: Expr,
        mutable: bool,
    ) -> String {
        let name = self.fresh(&format!("{}_{}", node.id, port));
        self.push(Stmt::Let {
            name: name.clone(),
            mutable,
            value,
        });
        self.bind(&node.id, port, name.clone(), ty);
        name
    }

    /// Records an existing variable as the value of `node_id`'s `port`.
    pub fn bind(&mut self, node_id: &str, port: &str, var: String, ty: ValueType) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert((node_id.to_string(), port.to_string()), Binding { var, ty });
        }
    }

    pub fn binding(&self, node_id: &str, port: &str) -> Option<&Binding> {
        let key = (node_id.to_string(), port.to_string());
        self.scopes.iter().rev().find_map(|scope| scope.get(&key))
    }

    pub(crate) fn mark_emitted(&mut self, node_id: &str) -> bool {
        self.emitted.insert(node_id.to_string())
    }

    pub fn is_emitted(&self, node_id: &str) -> bool {
        self.emitted.contains(node_id)
    }

    // --- ambient values ---

    pub fn state(&self) -> Expr {
        Expr::Ambient(Ambient::State)
    }

    pub fn session(&self) -> Expr {
        Expr::Ambient(Ambient::Session)
    }

    /// The participant the unit runs for: the sender, or the viewer in a
    /// filter.
    pub fn sender(&self) -> Expr {
        match self.fragment.kind {
            UnitKind::Filter => Expr::Ambient(Ambient::Viewer),
            _ => Expr::Ambient(Ambient::Sender),
        }
    }

    // --- inputs ---

    /// Resolves a required input, falling back to the port's default.
    pub fn input(&mut self, node: &Node, port: &str) -> Result<Expr, GenerateError> {
        self.input_typed(node, port).map(|(expr, _)| expr)
    }

    pub fn input_typed(
        &mut self,
        node: &Node,
        port: &str,
    ) -> Result<(Expr, ValueType), GenerateError> {
        self.optional_input(node, port)?
            .ok_or_else(|| self.missing_input(node, port))
    }

    /// Resolves an input that may be absent. Port defaults still apply.
    pub fn optional_input(
        &mut self,
        node: &Node,
        port: &str,
    ) -> Result<Option<(Expr, ValueType)>, GenerateError> {
        match node.inputs.get(port) {
            Some(value) => self
                .resolve_value(value)
                .map(Some)
                .map_err(|e| self.resolve_error(node, e)),
            None => Ok(self.port_default(node, port).map(|v| {
                let lit = Literal::from_json(&v);
                let ty = lit.value_type();
                (Expr::Lit(lit), ty)
            })),
        }
    }

    /// A string input that must be written literally, such as a path.
    pub fn literal_str(&self, node: &Node, port: &str) -> Result<String, GenerateError> {
        let value = match node.inputs.get(port) {
            Some(value) => value.clone(),
            None => self
                .port_default(node, port)
                .ok_or_else(|| self.missing_input(node, port))?,
        };
        let not_literal = || GenerateError::LiteralRequired {
            unit: self.location(),
            node: node.id.clone(),
            port: port.to_string(),
            expected: "string",
        };
        match InputRef::classify(&value) {
            Ok(InputRef::Literal(serde_json::Value::String(s))) => Ok(s.clone()),
            _ => Err(not_literal()),
        }
    }

    pub fn has_input(&self, node: &Node, port: &str) -> bool {
        node.inputs.contains_key(port)
    }

    fn port_default(&self, node: &Node, port: &str) -> Option<serde_json::Value> {
        self.registry
            .lookup(&node.kind)
            .and_then(|def| def.input_spec(port).and_then(|p| p.default.clone()))
    }

    /// The declared type of one of `node`'s outputs.
    pub fn output_type(&self, node: &Node, port: &str) -> ValueType {
        self.registry
            .lookup(&node.kind)
            .and_then(|def| def.output_spec(port).map(|p| p.ty.clone()))
            .unwrap_or_default()
    }

    // --- errors ---

    pub fn location(&self) -> String {
        self.fragment.location()
    }

    pub fn resolve_error(&self, node: &Node, source: ResolveError) -> GenerateError {
        GenerateError::Resolve {
            unit: self.location(),
            node: node.id.clone(),
            source,
        }
    }

    pub fn missing_input(&self, node: &Node, port: &str) -> GenerateError {
        GenerateError::MissingInput {
            unit: self.location(),
            node: node.id.clone(),
            port: port.to_string(),
        }
    }

    pub fn error(&self, node: &Node, message: impl Into<String>) -> GenerateError {
        GenerateError::Custom {
            unit: self.location(),
            node: node.id.clone(),
            message: message.into(),
        }
    }

    pub(crate) fn knows_node(&self, id: &str) -> bool {
        self.node_ids.contains(id)
    }
}
