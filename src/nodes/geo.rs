use crate::codegen::{EmitContext, Expr, MathFn};
use crate::error::GenerateError;
use crate::graph::Node;
use crate::registry::{NodeCategory, NodeDefinition, Registry};
use crate::schema::ValueType;

pub(super) fn register(registry: &mut Registry) {
    let points = |kind: &str| {
        NodeDefinition::new(kind, NodeCategory::Geo)
            .input("x1", ValueType::Float)
            .input("y1", ValueType::Float)
            .input("x2", ValueType::Float)
            .input("y2", ValueType::Float)
    };

    registry.insert_core(
        points("distance")
            .output("result", ValueType::Float)
            .behavior(emit_distance),
    );
    registry.insert_core(
        points("withinRadius")
            .input("radius", ValueType::Float)
            .output("result", ValueType::Bool)
            .behavior(emit_within_radius),
    );
    registry.insert_core(
        NodeDefinition::new("clampToBounds", NodeCategory::Geo)
            .input("x", ValueType::Float)
            .input("y", ValueType::Float)
            .input("minX", ValueType::Float)
            .input("minY", ValueType::Float)
            .input("maxX", ValueType::Float)
            .input("maxY", ValueType::Float)
            .output("x", ValueType::Float)
            .output("y", ValueType::Float)
            .behavior(emit_clamp_to_bounds),
    );
    registry.insert_core(
        NodeDefinition::new("moveTowards", NodeCategory::Geo)
            .input("x", ValueType::Float)
            .input("y", ValueType::Float)
            .input("targetX", ValueType::Float)
            .input("targetY", ValueType::Float)
            .input("speed", ValueType::Float)
            .output("x", ValueType::Float)
            .output("y", ValueType::Float)
            .behavior(emit_move_towards),
    );
}

fn inputs<const N: usize>(
    ctx: &mut EmitContext<'_>,
    node: &Node,
    ports: [&str; N],
) -> Result<Vec<Expr>, GenerateError> {
    ports.into_iter().map(|port| ctx.input(node, port)).collect()
}

fn emit_distance(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let args = inputs(ctx, node, ["x1", "y1", "x2", "y2"])?;
    ctx.declare(node, "result", ValueType::Float, Expr::helper("distance", args));
    Ok(())
}

fn emit_within_radius(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let args = inputs(ctx, node, ["x1", "y1", "x2", "y2", "radius"])?;
    ctx.declare(node, "result", ValueType::Bool, Expr::helper("within_radius", args));
    Ok(())
}

fn emit_clamp_to_bounds(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let [x, y, min_x, min_y, max_x, max_y]: [Expr; 6] =
        inputs(ctx, node, ["x", "y", "minX", "minY", "maxX", "maxY"])?
            .try_into()
            .map_err(|_| ctx.error(node, "expected six coordinates"))?;
    let clamp = |value, min, max| Expr::Math {
        func: MathFn::Clamp,
        args: vec![value, min, max],
    };
    ctx.declare(node, "x", ValueType::Float, clamp(x, min_x, max_x));
    ctx.declare(node, "y", ValueType::Float, clamp(y, min_y, max_y));
    Ok(())
}

/// The runtime helper returns a point; its coordinates become the outputs.
fn emit_move_towards(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let args = inputs(ctx, node, ["x", "y", "targetX", "targetY", "speed"])?;
    let point = ctx.fresh(&format!("{}_point", node.id));
    ctx.push(crate::codegen::Stmt::Let {
        name: point.clone(),
        mutable: false,
        value: Expr::helper("move_towards", args),
    });
    ctx.declare(node, "x", ValueType::Float, Expr::var(point.clone()).field("x"));
    ctx.declare(node, "y", ValueType::Float, Expr::var(point).field("y"));
    Ok(())
}
