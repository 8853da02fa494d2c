use super::ast::{BinOp, Expr, FailReason, Stmt, WaitKind};
use super::context::EmitContext;
use super::flow::trace;
use crate::error::{GenerateError, ResolveError};
use crate::graph::{Node, UnitKind};
use crate::instrument::TraceKind;
use crate::naming::ident;
use crate::registry::BuiltinKind;
use crate::schema::ValueType;

/// Emits a linear or terminal builtin kind.
pub(crate) fn emit(
    ctx: &mut EmitContext<'_>,
    node: &Node,
    kind: BuiltinKind,
) -> Result<(), GenerateError> {
    match kind {
        BuiltinKind::Constant => {
            let (value, ty) = ctx.input_typed(node, "value")?;
            ctx.declare(node, "value", ty, value);
        }
        BuiltinKind::Return => {
            let value = ctx.optional_input(node, "value")?.map(|(expr, _)| expr);
            let returns_value = ctx.unit_kind() == UnitKind::Function
                && ctx
                    .graph()
                    .function(ctx.unit_name())
                    .is_some_and(|f| f.has_return());
            ctx.push(Stmt::Return(value.filter(|_| returns_value)));
        }
        BuiltinKind::Fail => {
            let message = ctx.input(node, "message")?;
            ctx.push(Stmt::Fail(FailReason::Message(message)));
        }
        BuiltinKind::Wait => {
            let duration = ctx.input(node, "duration")?;
            emit_wait(ctx, node, WaitKind::Duration(duration));
        }
        BuiltinKind::WaitUntil => {
            let path = ctx.literal_str(node, "path")?;
            let (value, ty) = ctx.read_path(node, &path)?;
            let condition = match ty {
                ValueType::Bool => value,
                _ => Expr::helper("truthy", vec![value.borrowed()]),
            };
            let interval = ctx.input(node, "interval")?;
            emit_wait(
                ctx,
                node,
                WaitKind::Until {
                    condition,
                    interval,
                },
            );
        }
        BuiltinKind::CallFunction => emit_call(ctx, node)?,
        BuiltinKind::Branch
        | BuiltinKind::ForEach
        | BuiltinKind::ForEachWhere
        | BuiltinKind::UpdateWhere
        | BuiltinKind::Repeat => {
            return Err(ctx.error(node, "control structures are emitted by the flow pass"));
        }
    }
    Ok(())
}

fn emit_wait(ctx: &mut EmitContext<'_>, node: &Node, kind: WaitKind) {
    trace(ctx, node, TraceKind::NodeWait);
    ctx.push(Stmt::Wait {
        node: node.id.clone(),
        kind,
    });
    trace(ctx, node, TraceKind::NodeResume);
}

fn emit_call(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let name = ctx.literal_str(node, "function")?;
    let function = ctx
        .graph()
        .function(&name)
        .ok_or_else(|| ctx.error(node, format!("unknown function '{}'", name)))?;

    // Printers decide how each argument is passed from the callee's
    // parameter types.
    let mut args = Vec::with_capacity(function.parameters.len());
    for param in &function.parameters {
        args.push(ctx.input(node, &param.name)?);
    }

    let call = Expr::Call {
        function: ident(&function.name),
        args,
        cancellable: ctx.cancellation().is_function_cancellable(&function.name),
    }
    .try_();

    if function.has_return() {
        ctx.declare(
            node,
            "result",
            ValueType::parse_lenient(&function.returns),
            call,
        );
    } else {
        ctx.push(Stmt::Expr(call));
    }
    Ok(())
}

/// Everything needed to open one loop, computed in the enclosing scope.
pub(crate) struct LoopHeader {
    pub index: String,
    item: Option<(String, ValueType)>,
    source: LoopSource,
    /// Skip the iteration unless this holds.
    pub filter: Option<Expr>,
}

enum LoopSource {
    Collection { iter: Expr, mutable: bool },
    Count(Expr),
}

impl LoopHeader {
    /// Binds the loop's outputs inside the body scope.
    pub fn bind(&self, ctx: &mut EmitContext<'_>, node: &Node) {
        if let Some((item, ty)) = &self.item {
            ctx.bind(&node.id, "item", item.clone(), ty.clone());
        }
        ctx.bind(&node.id, "index", self.index.clone(), ValueType::Int);
    }

    pub fn into_stmt(self, body: Vec<Stmt>) -> Stmt {
        match self.source {
            LoopSource::Collection { iter, mutable } => Stmt::ForEach {
                item: self.item.map(|(name, _)| name).unwrap_or_default(),
                index: self.index,
                iter,
                mutable,
                body,
            },
            LoopSource::Count(count) => Stmt::Repeat {
                index: self.index,
                count,
                body,
            },
        }
    }
}

pub(crate) fn loop_header(
    ctx: &mut EmitContext<'_>,
    node: &Node,
    kind: BuiltinKind,
) -> Result<LoopHeader, GenerateError> {
    if kind == BuiltinKind::Repeat {
        let count = ctx.input(node, "count")?;
        return Ok(LoopHeader {
            index: ctx.fresh(&format!("{}_index", node.id)),
            item: None,
            source: LoopSource::Count(count),
            filter: None,
        });
    }

    let mutable = kind == BuiltinKind::UpdateWhere;
    let (iter, element) = if ctx.has_input(node, "path") || mutable {
        let path = ctx.literal_str(node, "path")?;
        ctx.iterate_path(node, &path, mutable)?
    } else if ctx.has_input(node, "collection") {
        let (expr, ty) = ctx.input_typed(node, "collection")?;
        let element = ty.element().cloned().unwrap_or_default();
        (expr, element)
    } else {
        return Err(ctx.missing_input(node, "path"));
    };

    let item = ctx.fresh(&format!("{}_item", node.id));
    let index = ctx.fresh(&format!("{}_index", node.id));

    let filter = match kind {
        BuiltinKind::ForEachWhere | BuiltinKind::UpdateWhere => {
            let field = ctx.literal_str(node, "field")?;
            let equals = ctx.input(node, "equals")?;
            let (value, _) = ctx
                .field_read(Expr::Var(item.clone()), &element, &field)
                .map_err(|e| ctx.resolve_error(node, e))?;
            Some(Expr::binary(BinOp::Eq, value, equals))
        }
        _ => None,
    };

    Ok(LoopHeader {
        index,
        item: Some((item, element)),
        source: LoopSource::Collection { iter, mutable },
        filter,
    })
}

impl EmitContext<'_> {
    /// Reads `field` of `object`, typed when `ty` names a schema record.
    pub fn field_read(
        &self,
        object: Expr,
        ty: &ValueType,
        field: &str,
    ) -> Result<(Expr, ValueType), ResolveError> {
        match (self.schema(), ty.record_name()) {
            (Some(schema), Some(record)) => {
                let info = schema.field(record, field)?;
                Ok((
                    object.method(info.accessors.getter(), vec![]),
                    info.ty.clone(),
                ))
            }
            _ => Ok((
                Expr::helper("field_get", vec![object.borrowed(), Expr::str(field)]).try_(),
                ValueType::Any,
            )),
        }
    }

    /// Writes `field` of `object`, typed when `ty` names a schema record.
    pub fn field_write(
        &self,
        object: Expr,
        ty: &ValueType,
        field: &str,
        value: Expr,
    ) -> Result<Stmt, ResolveError> {
        let expr = match (self.schema(), ty.record_name()) {
            (Some(schema), Some(record)) => {
                let info = schema.field(record, field)?;
                object.method(info.accessors.setter(), vec![value])
            }
            _ => Expr::helper(
                "field_set",
                vec![object.borrowed_mut(), Expr::str(field), value],
            )
            .try_(),
        };
        Ok(Stmt::Expr(expr))
    }
}
