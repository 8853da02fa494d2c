use super::ResultType;
use crate::codegen::{BinOp, EmitContext, Expr, MathFn, UnaryOp};
use crate::error::GenerateError;
use crate::graph::Node;
use crate::registry::{NodeCategory, NodeDefinition, Registry};
use crate::schema::ValueType;

fn math(func: MathFn, args: Vec<Expr>) -> Expr {
    Expr::Math { func, args }
}

define_operator_nodes! {
    NodeCategory::Math;
    ("abs", Unary, ValueType::Float, ResultType::SameAsOperand, |v| math(MathFn::Abs, vec![v])),
    ("negate", Unary, ValueType::Float, ResultType::SameAsOperand, |v| Expr::Unary { op: UnaryOp::Neg, expr: Box::new(v) }),
    ("round", Unary, ValueType::Float, ResultType::SameAsOperand, |v| math(MathFn::Round, vec![v])),
    ("floor", Unary, ValueType::Float, ResultType::SameAsOperand, |v| math(MathFn::Floor, vec![v])),
    ("ceil", Unary, ValueType::Float, ResultType::SameAsOperand, |v| math(MathFn::Ceil, vec![v])),
    ;
    ("add", Binary, ValueType::Float, ResultType::Numeric, |a, b| Expr::binary(BinOp::Add, a, b)),
    ("subtract", Binary, ValueType::Float, ResultType::Numeric, |a, b| Expr::binary(BinOp::Sub, a, b)),
    ("multiply", Binary, ValueType::Float, ResultType::Numeric, |a, b| Expr::binary(BinOp::Mul, a, b)),
    ("divide", Binary, ValueType::Float, ResultType::Numeric, |a, b| Expr::binary(BinOp::Div, a, b)),
    ("modulo", Binary, ValueType::Float, ResultType::Numeric, |a, b| Expr::binary(BinOp::Rem, a, b)),
    ("min", Binary, ValueType::Float, ResultType::Numeric, |a, b| math(MathFn::Min, vec![a, b])),
    ("max", Binary, ValueType::Float, ResultType::Numeric, |a, b| math(MathFn::Max, vec![a, b])),
}

pub(super) fn register(registry: &mut Registry) {
    register_operators(registry);
    registry.insert_core(
        NodeDefinition::new("clamp", NodeCategory::Math)
            .input("value", ValueType::Float)
            .input("min", ValueType::Float)
            .input("max", ValueType::Float)
            .output("result", ValueType::Float)
            .behavior(emit_clamp),
    );
}

fn emit_clamp(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let (value, ty) = ctx.input_typed(node, "value")?;
    let min = ctx.input(node, "min")?;
    let max = ctx.input(node, "max")?;
    let ty = ResultType::Numeric.apply(&[&ty]);
    ctx.declare(node, "result", ty, math(MathFn::Clamp, vec![value, min, max]));
    Ok(())
}
