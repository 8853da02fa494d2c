//! Events and queries against the live session.

use crate::codegen::{EmitContext, Expr, Stmt};
use crate::error::GenerateError;
use crate::graph::Node;
use crate::registry::{NodeCategory, NodeDefinition, Registry};
use crate::schema::ValueType;
use serde_json::Value;

pub(super) fn register(registry: &mut Registry) {
    let session = |kind: &str| NodeDefinition::new(kind, NodeCategory::Session).session_only();

    registry.insert_core(
        session("broadcast")
            .input("event", ValueType::String)
            .input_or("payload", ValueType::Any, Value::Null)
            .behavior(emit_broadcast),
    );
    registry.insert_core(
        session("sendTo")
            .input("player", ValueType::String)
            .input("event", ValueType::String)
            .input_or("payload", ValueType::Any, Value::Null)
            .behavior(emit_send_to),
    );
    registry.insert_core(
        session("isHost")
            .optional_input("player", ValueType::String)
            .output("result", ValueType::Bool)
            .behavior(emit_is_host),
    );
    registry.insert_core(
        session("hasPlayer")
            .input("player", ValueType::String)
            .output("result", ValueType::Bool)
            .behavior(emit_has_player),
    );
    registry.insert_core(
        session("playerCount")
            .output("count", ValueType::Int)
            .behavior(emit_player_count),
    );
    registry.insert_core(
        session("players")
            .output("players", ValueType::Array(Box::new(ValueType::String)))
            .behavior(emit_players),
    );
    // The sender is known in filters too, where it is the viewer.
    registry.insert_core(
        NodeDefinition::new("getSender", NodeCategory::Session)
            .output("sender", ValueType::String)
            .behavior(emit_get_sender),
    );
    registry.insert_core(
        NodeDefinition::new("log", NodeCategory::Session)
            .input("message", ValueType::String)
            .behavior(emit_log),
    );
}

fn payload(ctx: &mut EmitContext<'_>, node: &Node) -> Result<Expr, GenerateError> {
    let value = ctx.input(node, "payload")?;
    Ok(Expr::helper("to_payload", vec![value.borrowed()]))
}

fn emit_broadcast(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let event = ctx.input(node, "event")?;
    let payload = payload(ctx, node)?;
    let call = ctx.session().method("broadcast", vec![event, payload]);
    ctx.push(Stmt::Expr(call));
    Ok(())
}

fn emit_send_to(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let player = ctx.input(node, "player")?;
    let event = ctx.input(node, "event")?;
    let payload = payload(ctx, node)?;
    let call = ctx.session().method("send_to", vec![player, event, payload]);
    ctx.push(Stmt::Expr(call));
    Ok(())
}

fn emit_is_host(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let player = match ctx.optional_input(node, "player")? {
        Some((player, _)) => player,
        None => ctx.sender(),
    };
    let call = ctx.session().method("is_host", vec![player]);
    ctx.declare(node, "result", ValueType::Bool, call);
    Ok(())
}

fn emit_has_player(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let player = ctx.input(node, "player")?;
    let call = ctx.session().method("has_player", vec![player]);
    ctx.declare(node, "result", ValueType::Bool, call);
    Ok(())
}

fn emit_player_count(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let call = ctx.session().method("player_count", vec![]);
    ctx.declare(node, "count", ValueType::Int, call);
    Ok(())
}

fn emit_players(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let call = ctx.session().method("players", vec![]);
    ctx.declare(node, "players", ValueType::Array(Box::new(ValueType::String)), call);
    Ok(())
}

fn emit_get_sender(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let sender = ctx.sender().owned();
    ctx.declare(node, "sender", ValueType::String, sender);
    Ok(())
}

fn emit_log(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let message = ctx.input(node, "message")?;
    let unit = Expr::str(ctx.unit_name());
    ctx.push(Stmt::Expr(Expr::helper("log_message", vec![unit, message])));
    Ok(())
}
