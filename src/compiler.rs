//! # Compiler facade
//!
//! [`Compiler`] ties the phases together: validate the graph, lower it to a
//! [`Program`], and render the program for a [`Target`]. It is configured
//! through [`CompilerBuilder`].

use crate::backend::Target;
use crate::codegen::{Generator, Program};
use crate::error::{CompileError, ValidationErrors};
use crate::graph::NodeGraph;
use crate::instrument::Instrumentation;
use crate::registry::Registry;
use crate::schema::SchemaContext;
use crate::validate::validate;
use std::sync::Arc;

/// Compiles one node graph. Cheap to build; reusable for several targets.
pub struct Compiler {
    graph: NodeGraph,
    registry: Arc<Registry>,
    schema: Option<SchemaContext>,
    instrumentation: Instrumentation,
    target: Target,
    emit_types: bool,
}

pub struct CompilerBuilder {
    graph: NodeGraph,
    registry: Option<Arc<Registry>>,
    schema: Option<SchemaContext>,
    tracing: bool,
    target: Target,
    emit_types: Option<bool>,
}

impl CompilerBuilder {
    pub fn new(graph: NodeGraph) -> Self {
        Self {
            graph,
            registry: None,
            schema: None,
            tracing: false,
            target: Target::default(),
            emit_types: None,
        }
    }

    /// Compiles against `registry` instead of a fresh default one.
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_schema(mut self, schema: SchemaContext) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Emits trace points around every node and unit.
    pub fn with_tracing(mut self, tracing: bool) -> Self {
        self.tracing = tracing;
        self
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    /// Whether state types are emitted alongside the units. Defaults to on
    /// when a schema is given.
    pub fn with_types(mut self, emit_types: bool) -> Self {
        self.emit_types = Some(emit_types);
        self
    }

    pub fn build(self) -> Compiler {
        let emit_types = self.emit_types.unwrap_or(self.schema.is_some());
        Compiler {
            graph: self.graph,
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(Registry::new())),
            schema: self.schema,
            instrumentation: Instrumentation::new(self.tracing),
            target: self.target,
            emit_types,
        }
    }
}

impl Compiler {
    pub fn builder(graph: NodeGraph) -> CompilerBuilder {
        CompilerBuilder::new(graph)
    }

    /// Parses graph JSON and, when given, schema JSON into a builder.
    pub fn from_json(
        graph_json: &str,
        schema_json: Option<&str>,
    ) -> Result<CompilerBuilder, CompileError> {
        let graph = NodeGraph::from_json(graph_json)?;
        let mut builder = CompilerBuilder::new(graph);
        if let Some(json) = schema_json {
            builder = builder.with_schema(SchemaContext::from_json(json)?);
        }
        Ok(builder)
    }

    pub fn graph(&self) -> &NodeGraph {
        &self.graph
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn target(&self) -> Target {
        self.target
    }

    /// Runs every static check and reports all violations at once.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        validate(&self.graph, &self.registry)
    }

    /// Validates, then lowers the graph to the target-neutral program.
    pub fn generate(&self) -> Result<Program, CompileError> {
        self.validate()?;
        let mut program = Generator::new(&self.graph, &self.registry)
            .with_schema(self.schema.as_ref())
            .with_instrumentation(self.instrumentation)
            .generate()?;
        if !self.emit_types {
            program.schema = None;
        }
        Ok(program)
    }

    /// Compiles for the configured target.
    pub fn compile(&self) -> Result<String, CompileError> {
        self.compile_to(self.target)
    }

    pub fn compile_to(&self, target: Target) -> Result<String, CompileError> {
        let program = self.generate()?;
        tracing::info!(
            target = %target,
            units = program.units.len(),
            "rendering program"
        );
        Ok(target.backend().render(&program))
    }
}
