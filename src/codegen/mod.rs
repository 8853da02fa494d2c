//! # Code generation engine
//!
//! Turns each handler, filter and function of a validated [`NodeGraph`] into a
//! [`Unit`] of target-neutral statements. The generator walks the flow edges
//! (see [`flow`]) and asks the registry how to emit every node it meets. The
//! result is a [`Program`], which the printers in [`crate::backend`] render.
//!
//! Node kinds never touch the output text directly. They push [`Stmt`]s into
//! an [`EmitContext`], which also owns naming and the reference table.

mod access;
mod ast;
mod builtin;
mod context;
mod flow;
mod reference;

pub use ast::*;
pub use context::{Binding, EmitContext};

use crate::error::{GenerateError, ResolveError};
use crate::graph::{EventHandler, FlowIndex, Fragment, NodeGraph, Permissions, UnitKind};
use crate::instrument::{Cancellation, Instrumentation};
use crate::naming::{ident, to_pascal_case};
use crate::registry::Registry;
use crate::schema::{SchemaContext, ValueType};
use std::collections::BTreeSet;

/// Lowers a graph to a [`Program`].
pub struct Generator<'a> {
    graph: &'a NodeGraph,
    registry: &'a Registry,
    schema: Option<&'a SchemaContext>,
    instrumentation: Instrumentation,
}

impl<'a> Generator<'a> {
    pub fn new(graph: &'a NodeGraph, registry: &'a Registry) -> Self {
        Self {
            graph,
            registry,
            schema: None,
            instrumentation: Instrumentation::default(),
        }
    }

    pub fn with_schema(mut self, schema: Option<&'a SchemaContext>) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_instrumentation(mut self, instrumentation: Instrumentation) -> Self {
        self.instrumentation = instrumentation;
        self
    }

    /// Generates every unit in graph order: handlers, filters, functions.
    ///
    /// The graph is assumed to have passed validation; structural problems
    /// that slip through are still reported as [`GenerateError`]s.
    pub fn generate(&self) -> Result<Program, GenerateError> {
        let cancellation = Cancellation::analyze(self.graph, self.registry);
        let fragments = self.graph.fragments();
        tracing::info!(units = fragments.len(), "generating code");

        let mut units = Vec::with_capacity(fragments.len());
        let mut placeholders = 0;
        let mut views = BTreeSet::new();

        for fragment in fragments {
            let (unit, unit_placeholders, unit_views) = self.unit(fragment, &cancellation)?;
            tracing::debug!(
                unit = %unit.name,
                kind = %unit.kind,
                statements = unit.body.len(),
                cancellable = unit.cancellable,
                "unit generated"
            );
            placeholders += unit_placeholders;
            views.extend(unit_views);
            units.push(unit);
        }

        if placeholders > 0 {
            tracing::warn!(placeholders, "generated code contains placeholders");
        }

        Ok(Program {
            package: self.package(),
            units,
            tracing: self.instrumentation.tracing,
            placeholders,
            views,
            schema: self.schema.cloned(),
            state_type: self
                .schema
                .map(|s| to_pascal_case(s.root()))
                .unwrap_or_else(|| "State".to_string()),
        })
    }

    fn package(&self) -> String {
        if !self.graph.package.is_empty() {
            return self.graph.package.clone();
        }
        self.schema
            .map(|s| s.package().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "handlers".to_string())
    }

    fn unit(
        &self,
        fragment: Fragment<'a>,
        cancellation: &Cancellation,
    ) -> Result<(Unit, usize, BTreeSet<String>), GenerateError> {
        let index = FlowIndex::new(fragment.flow);
        let mut ctx = EmitContext::new(
            self.graph,
            self.registry,
            self.schema,
            fragment,
            self.instrumentation,
            cancellation,
        );

        let handler = match fragment.kind {
            UnitKind::Handler => self.graph.handlers.iter().find(|h| h.name == fragment.name),
            _ => None,
        };
        if let Some(permissions) = handler.and_then(|h| h.permissions.as_ref()) {
            emit_permissions(&mut ctx, permissions)?;
        }

        flow::emit_flow(&mut ctx, &index)?;

        let returns = match fragment.kind {
            UnitKind::Function => self
                .graph
                .function(fragment.name)
                .filter(|f| f.has_return())
                .map(|f| ValueType::parse_lenient(&f.returns)),
            _ => None,
        };

        let unit = Unit {
            kind: fragment.kind,
            name: fragment.name.to_string(),
            ident: ident(fragment.name),
            event: handler.map(event_name),
            params: fragment
                .parameters
                .iter()
                .map(|p| Param {
                    name: ident(&p.name),
                    ty: ValueType::parse_lenient(&p.ty),
                })
                .collect(),
            returns,
            cancellable: ctx.is_cancellable(),
            traced: ctx.is_traced(),
            body: ctx.take_body(),
        };
        let placeholders = ctx.placeholders;
        let views = std::mem::take(&mut ctx.views);
        Ok((unit, placeholders, views))
    }
}

fn event_name(handler: &EventHandler) -> String {
    if handler.event.is_empty() {
        handler.name.clone()
    } else {
        handler.event.clone()
    }
}

/// Guards a handler body with its permission checks, strictest first.
fn emit_permissions(
    ctx: &mut EmitContext<'_>,
    permissions: &Permissions,
) -> Result<(), GenerateError> {
    if permissions.host_only {
        let is_host = ctx.session().method("is_host", vec![ctx.sender()]);
        ctx.push(Stmt::If {
            condition: Expr::not(is_host),
            then: vec![Stmt::Fail(FailReason::NotHost)],
            otherwise: Vec::new(),
        });
    }

    if let Some(param) = &permissions.player_param {
        let declared = ctx
            .fragment()
            .parameter(param)
            .ok_or_else(|| GenerateError::Resolve {
                unit: ctx.location(),
                node: "permissions".to_string(),
                source: ResolveError::UnknownParameter(param.clone()),
            })?;
        ctx.push(Stmt::If {
            condition: Expr::binary(BinOp::Ne, ctx.sender(), Expr::Var(ident(&declared.name))),
            then: vec![Stmt::Fail(FailReason::NotPermitted)],
            otherwise: Vec::new(),
        });
    }

    if !permissions.allowed_players.is_empty() {
        let allowed = Expr::InList {
            needle: Box::new(ctx.sender()),
            list: permissions
                .allowed_players
                .iter()
                .map(|p| Literal::Str(p.clone()))
                .collect(),
        };
        ctx.push(Stmt::If {
            condition: Expr::not(allowed),
            then: vec![Stmt::Fail(FailReason::NotPermitted)],
            otherwise: Vec::new(),
        });
    }
    Ok(())
}
