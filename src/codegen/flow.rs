//! Structured control-flow reconstruction.
//!
//! The flow edges only record successors and branch labels. Walking them
//! from `start`, each node is emitted once:
//!
//! - a **decision** emits an `if`/`else` whose two arms are the chains behind
//!   its `true` and `false` edges. Both arms stop at the join point (see
//!   [`FlowIndex::join_point_within`]) and emission continues from there.
//!   Arms that never meet each run to their own end.
//! - an **iteration** with a `body` edge loops over the chain behind it; the
//!   body closes when it reaches `end`, a dead end, or the loop node again.
//!   Emission then continues along the `done` (or unlabelled) edge. With a
//!   single edge, everything after the loop up to the enclosing stop point
//!   is the body.
//!
//! Reaching `end` where more statements would follow leaves the unit (or
//! skips to the next iteration inside a loop body).

use super::ast::{Expr, Stmt, TracePoint};
use super::builtin;
use super::context::{EmitContext, LoopScope};
use crate::error::GenerateError;
use crate::graph::{FlowIndex, Node, END};
use crate::instrument::TraceKind;
use crate::registry::{BuiltinKind, Emitter, FlowShape, NodeDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Return,
    Continue,
}

impl Exit {
    fn stmt(self) -> Stmt {
        match self {
            Exit::Return => Stmt::Return(None),
            Exit::Continue => Stmt::Continue,
        }
    }
}

/// Where a chain must stop and what reaching `end` means inside it.
#[derive(Debug, Clone)]
struct Region<'f> {
    stops: Vec<&'f str>,
    /// Nothing follows this region, so reaching `end` needs no statement.
    end_is_tail: bool,
    exit: Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainEnd {
    Stop,
    End,
    Terminal,
}

/// Emits the whole flow of the context's fragment into its top block.
pub(crate) fn emit_flow<'f>(
    ctx: &mut EmitContext<'_>,
    index: &FlowIndex<'f>,
) -> Result<(), GenerateError> {
    let region = Region {
        stops: Vec::new(),
        end_is_tail: true,
        exit: Exit::Return,
    };
    emit_chain(ctx, index, index.start(), &region).map(drop)
}

fn emit_chain<'f>(
    ctx: &mut EmitContext<'_>,
    index: &FlowIndex<'f>,
    from: Option<&'f str>,
    region: &Region<'f>,
) -> Result<ChainEnd, GenerateError> {
    let mut current = from;

    while let Some(id) = current {
        if region.stops.contains(&id) {
            return Ok(ChainEnd::Stop);
        }
        if id == END {
            break;
        }

        let fragment = ctx.fragment();
        let node = fragment.node(id).ok_or_else(|| GenerateError::DanglingEdge {
            unit: ctx.location(),
            node: id.to_string(),
        })?;
        if !ctx.mark_emitted(id) {
            return Err(GenerateError::UnstructuredFlow {
                unit: ctx.location(),
                node: id.to_string(),
            });
        }
        let def = ctx
            .registry()
            .lookup(&node.kind)
            .ok_or_else(|| GenerateError::UnknownKind {
                unit: ctx.location(),
                node: node.id.clone(),
                kind: node.kind.clone(),
            })?;
        tracing::trace!(node = %node.id, kind = %node.kind, "emitting node");

        match def.shape {
            FlowShape::Linear => {
                trace(ctx, node, TraceKind::NodeStart);
                emit_node(ctx, node, &def)?;
                trace(ctx, node, TraceKind::NodeEnd);
                current = index.next(id);
            }
            FlowShape::Terminal => {
                trace(ctx, node, TraceKind::NodeStart);
                trace(ctx, node, TraceKind::NodeEnd);
                emit_node(ctx, node, &def)?;
                return Ok(ChainEnd::Terminal);
            }
            FlowShape::Decision => match emit_decision(ctx, index, node, region)? {
                AfterDecision::Join(join) => current = Some(join),
                AfterDecision::Finished(end) => return Ok(end),
            },
            FlowShape::Iteration => {
                let Emitter::Builtin(kind) = def.emitter else {
                    return Err(ctx.error(node, "iteration kinds must be builtin"));
                };
                match emit_iteration(ctx, index, node, kind, region)? {
                    Continuation::Next(next) => current = next,
                    Continuation::Done(end) => return Ok(end),
                }
            }
        }
    }

    // `end` or a dead end.
    if !region.end_is_tail {
        ctx.push(region.exit.stmt());
    }
    Ok(ChainEnd::End)
}

/// What follows an emitted `if`/`else`.
enum AfterDecision<'f> {
    /// Both arms meet again here.
    Join(&'f str),
    /// The arms never meet; each ran to its own end.
    Finished(ChainEnd),
}

/// Emits an `if`/`else` and reports where emission continues.
fn emit_decision<'f>(
    ctx: &mut EmitContext<'_>,
    index: &FlowIndex<'f>,
    node: &Node,
    region: &Region<'f>,
) -> Result<AfterDecision<'f>, GenerateError> {
    trace(ctx, node, TraceKind::NodeStart);
    let condition = ctx.input(node, "condition")?;
    trace(ctx, node, TraceKind::NodeEnd);

    let on_true = index.labeled(&node.id, "true");
    let on_false = index.labeled(&node.id, "false");
    let mut bounds: Vec<&str> = region.stops.to_vec();
    bounds.push(node.id.as_str());
    let join = match (on_true, on_false) {
        (Some(a), Some(b)) => index.join_point_within(a, b, &bounds),
        _ => None,
    }
    .filter(|j| *j != END);

    let mut arms = region.clone();
    if let Some(join) = join {
        arms.stops.push(join);
        arms.end_is_tail = false;
    }

    let mut ends = [ChainEnd::End; 2];
    let then = ctx.block(|ctx| {
        ends[0] = emit_chain(ctx, index, on_true, &arms)?;
        Ok(())
    })?;
    let otherwise = ctx.block(|ctx| {
        ends[1] = emit_chain(ctx, index, on_false, &arms)?;
        Ok(())
    })?;
    ctx.push(Stmt::If {
        condition,
        then,
        otherwise,
    });

    Ok(match join {
        Some(join) => AfterDecision::Join(join),
        // An arm that reached an enclosing stop continues there.
        None if ends.contains(&ChainEnd::Stop) => AfterDecision::Finished(ChainEnd::Stop),
        None => AfterDecision::Finished(ChainEnd::End),
    })
}

enum Continuation<'f> {
    Next(Option<&'f str>),
    Done(ChainEnd),
}

fn emit_iteration<'f>(
    ctx: &mut EmitContext<'_>,
    index: &FlowIndex<'f>,
    node: &Node,
    kind: BuiltinKind,
    region: &Region<'f>,
) -> Result<Continuation<'f>, GenerateError> {
    let id = node.id.as_str();
    let labelled = index.labeled(id, "body");
    let (body_start, continuation) = match labelled {
        Some(body) => (
            Some(body),
            index.labeled(id, "done").or_else(|| index.unlabeled(id)),
        ),
        None => (index.next(id), None),
    };

    let mut body_region = Region {
        stops: region.stops.clone(),
        end_is_tail: true,
        exit: Exit::Continue,
    };
    if labelled.is_some() {
        // Back edges to the loop node close the body.
        if let Some(own) = index.intern(id) {
            body_region.stops.push(own);
        }
    }

    trace(ctx, node, TraceKind::NodeStart);
    let header = builtin::loop_header(ctx, node, kind)?;
    ctx.loops.push(LoopScope {
        node: node.id.clone(),
        index: header.index.clone(),
    });

    let mut body_end = ChainEnd::End;
    let body = ctx.block(|ctx| {
        header.bind(ctx, node);
        if let Some(filter) = header.filter.clone() {
            ctx.push(Stmt::If {
                condition: Expr::not(filter),
                then: vec![Stmt::Continue],
                otherwise: Vec::new(),
            });
        }
        body_end = emit_chain(ctx, index, body_start, &body_region)?;
        Ok(())
    });
    ctx.loops.pop();
    ctx.push(header.into_stmt(body?));
    trace(ctx, node, TraceKind::NodeEnd);

    if labelled.is_some() {
        return Ok(Continuation::Next(continuation));
    }

    // The implicit body consumed the rest of the chain.
    match body_end {
        ChainEnd::Stop => Ok(Continuation::Done(ChainEnd::Stop)),
        ChainEnd::End | ChainEnd::Terminal => {
            if !region.end_is_tail {
                ctx.push(region.exit.stmt());
            }
            Ok(Continuation::Done(ChainEnd::End))
        }
    }
}

/// Emits the statements of one linear or terminal node.
pub(crate) fn emit_node(
    ctx: &mut EmitContext<'_>,
    node: &Node,
    def: &NodeDefinition,
) -> Result<(), GenerateError> {
    match &def.emitter {
        Emitter::Builtin(kind) => builtin::emit(ctx, node, *kind),
        Emitter::Behavior(behavior) => behavior.emit(ctx, node),
        Emitter::Missing => {
            tracing::warn!(
                unit = ctx.unit_name(),
                node = %node.id,
                kind = %node.kind,
                "node kind has no emitter; emitting placeholder"
            );
            ctx.push(Stmt::Placeholder {
                node: node.id.clone(),
                kind: node.kind.clone(),
            });
            for output in &def.outputs {
                ctx.declare(
                    node,
                    &output.name,
                    output.ty.clone(),
                    Expr::Lit(super::ast::Literal::Null),
                );
            }
            ctx.placeholders += 1;
            Ok(())
        }
    }
}

pub(crate) fn trace(ctx: &mut EmitContext<'_>, node: &Node, kind: TraceKind) {
    if ctx.is_traced() {
        ctx.push(Stmt::Trace(TracePoint {
            kind,
            node: node.id.clone(),
        }));
    }
}
