//! Reads and writes of the state tree through field paths.
//!
//! Every `path` input must be a literal string; indices inside it may name
//! parameters or enclosing loops (`players[index].score`).

use crate::codegen::{BinOp, EmitContext, Expr};
use crate::error::GenerateError;
use crate::graph::Node;
use crate::registry::{NodeCategory, NodeDefinition, Registry};
use crate::schema::ValueType;
use serde_json::json;

pub(super) fn register(registry: &mut Registry) {
    let state = |kind: &str| NodeDefinition::new(kind, NodeCategory::State).input("path", ValueType::String);

    registry.insert_core(
        state("getState")
            .output("value", ValueType::Any)
            .behavior(emit_get),
    );
    registry.insert_core(
        state("setState")
            .input("value", ValueType::Any)
            .behavior(emit_set),
    );
    registry.insert_core(
        state("appendState")
            .input("value", ValueType::Any)
            .behavior(emit_append),
    );
    registry.insert_core(
        state("removeState")
            .input("index", ValueType::Int)
            .behavior(emit_remove),
    );
    registry.insert_core(
        state("setKey")
            .input("key", ValueType::String)
            .input("value", ValueType::Any)
            .behavior(emit_set_key),
    );
    registry.insert_core(
        state("deleteKey")
            .input("key", ValueType::String)
            .behavior(emit_delete_key),
    );
    registry.insert_core(
        state("arrayLength")
            .output("length", ValueType::Int)
            .behavior(emit_length),
    );
    registry.insert_core(
        state("incrementState")
            .input_or("amount", ValueType::Float, json!(1))
            .output("value", ValueType::Float)
            .behavior(emit_increment),
    );
    registry.insert_core(
        NodeDefinition::new("getField", NodeCategory::State)
            .input("object", ValueType::Any)
            .input("field", ValueType::String)
            .output("value", ValueType::Any)
            .behavior(emit_get_field),
    );
    registry.insert_core(
        NodeDefinition::new("setField", NodeCategory::State)
            .input("object", ValueType::Any)
            .input("field", ValueType::String)
            .input("value", ValueType::Any)
            .behavior(emit_set_field),
    );
}

fn emit_get(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let path = ctx.literal_str(node, "path")?;
    let (value, ty) = ctx.read_path(node, &path)?;
    ctx.declare(node, "value", ty, value);
    Ok(())
}

fn emit_set(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let path = ctx.literal_str(node, "path")?;
    let value = ctx.input(node, "value")?;
    ctx.write_path(node, &path, owned(value))
}

fn emit_append(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let path = ctx.literal_str(node, "path")?;
    let value = ctx.input(node, "value")?;
    ctx.append_path(node, &path, owned(value))
}

fn emit_remove(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let path = ctx.literal_str(node, "path")?;
    let index = ctx.input(node, "index")?;
    ctx.remove_at_path(node, &path, index)
}

fn emit_set_key(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let path = ctx.literal_str(node, "path")?;
    let key = ctx.input(node, "key")?;
    let value = ctx.input(node, "value")?;
    ctx.set_key_path(node, &path, key, owned(value))
}

fn emit_delete_key(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let path = ctx.literal_str(node, "path")?;
    let key = ctx.input(node, "key")?;
    ctx.delete_key_path(node, &path, key)
}

fn emit_length(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let path = ctx.literal_str(node, "path")?;
    let length = ctx.len_path(node, &path)?;
    ctx.declare(node, "length", ValueType::Int, length);
    Ok(())
}

/// Expands to a read, an addition and a write back.
fn emit_increment(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let path = ctx.literal_str(node, "path")?;
    let (amount, amount_ty) = ctx.input_typed(node, "amount")?;
    let (current, ty) = ctx.read_path(node, &path)?;
    if !matches!(ty, ValueType::Int | ValueType::Float | ValueType::Any) {
        return Err(ctx.error(node, format!("cannot increment '{}' of type {}", path, ty)));
    }
    let ty = match (&ty, &amount_ty) {
        (ValueType::Any, _) => amount_ty,
        _ => ty,
    };

    let current = ctx.declare(node, "current", ty.clone(), current);
    let sum = Expr::binary(BinOp::Add, Expr::Var(current), amount);
    let value = ctx.declare(node, "value", ty, sum);
    ctx.write_path(node, &path, Expr::Var(value))
}

fn emit_get_field(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let (object, object_ty) = ctx.input_typed(node, "object")?;
    let field = ctx.literal_str(node, "field")?;
    let (value, ty) = ctx
        .field_read(object, &object_ty, &field)
        .map_err(|e| ctx.resolve_error(node, e))?;
    ctx.declare(node, "value", ty, value.owned());
    Ok(())
}

/// Writes a field of a record value, typically the item of an `updateWhere`
/// loop.
fn emit_set_field(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let (object, object_ty) = ctx.input_typed(node, "object")?;
    let field = ctx.literal_str(node, "field")?;
    let value = ctx.input(node, "value")?;
    let stmt = ctx
        .field_write(object, &object_ty, &field, owned(value))
        .map_err(|e| ctx.resolve_error(node, e))?;
    ctx.push(stmt);
    Ok(())
}

/// Variables and string literals are passed by value into state.
fn owned(value: Expr) -> Expr {
    match value {
        Expr::Var(_) | Expr::Lit(crate::codegen::Literal::Str(_)) => value.owned(),
        other => other,
    }
}
