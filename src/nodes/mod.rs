//! # Core node catalog
//!
//! The node kinds every registry starts with, beyond the builtin control
//! structures. Simple operators are declared in bulk with
//! `define_operator_nodes!`; kinds with bespoke emission are plain functions
//! passed to [`NodeDefinition::behavior`].

use crate::codegen::{EmitContext, Expr};
use crate::error::GenerateError;
use crate::graph::Node;
use crate::registry::{NodeBehavior, NodeCategory, NodeDefinition, Registry};
use crate::schema::ValueType;

/// Declares `register_operators` for a catalog module from a table of unary
/// and binary operators.
///
/// Each row names the kind, its operand type, a rule for the result type and
/// a function building the result expression from the operands.
macro_rules! define_operator_nodes {
    (
        $category:expr;
        $( ($kind:literal, Unary, $ty:expr, $result:expr, $build:expr) ),* $(,)?
        ;
        $( ($bi_kind:literal, Binary, $bi_ty:expr, $bi_result:expr, $bi_build:expr) ),* $(,)?
    ) => {
        fn register_operators(registry: &mut crate::registry::Registry) {
            $(
                registry.insert_core(super::unary($kind, $category, $ty, $result, $build));
            )*
            $(
                registry.insert_core(super::binary($bi_kind, $category, $bi_ty, $bi_result, $bi_build));
            )*
        }
    };
}

mod geo;
mod logic;
mod math;
mod session;
mod state;
mod text;

/// Seeds the core tier of `registry`.
pub(crate) fn register_core(registry: &mut Registry) {
    math::register(registry);
    logic::register(registry);
    state::register(registry);
    geo::register(registry);
    session::register(registry);
    text::register(registry);
}

/// How an operator's result type follows from its operand types.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ResultType {
    /// Int when every operand is an int, float when any is a float.
    Numeric,
    Bool,
    SameAsOperand,
}

impl ResultType {
    fn apply(self, operands: &[&ValueType]) -> ValueType {
        match self {
            ResultType::Bool => ValueType::Bool,
            ResultType::SameAsOperand => operands.first().map(|t| (*t).clone()).unwrap_or_default(),
            ResultType::Numeric => {
                if operands.iter().all(|t| **t == ValueType::Int) {
                    ValueType::Int
                } else if operands.iter().any(|t| **t == ValueType::Float) {
                    ValueType::Float
                } else {
                    ValueType::Any
                }
            }
        }
    }
}

struct UnaryNode {
    result: ResultType,
    build: fn(Expr) -> Expr,
}

impl NodeBehavior for UnaryNode {
    fn emit(&self, ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
        let (value, ty) = ctx.input_typed(node, "value")?;
        let ty = self.result.apply(&[&ty]);
        ctx.declare(node, "result", ty, (self.build)(value));
        Ok(())
    }
}

struct BinaryNode {
    result: ResultType,
    build: fn(Expr, Expr) -> Expr,
}

impl NodeBehavior for BinaryNode {
    fn emit(&self, ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
        let (a, a_ty) = ctx.input_typed(node, "a")?;
        let (b, b_ty) = ctx.input_typed(node, "b")?;
        let ty = self.result.apply(&[&a_ty, &b_ty]);
        ctx.declare(node, "result", ty, (self.build)(a, b));
        Ok(())
    }
}

fn result_port_type(result: ResultType, operand: &ValueType) -> ValueType {
    match result {
        ResultType::Bool => ValueType::Bool,
        _ => operand.clone(),
    }
}

pub(crate) fn unary(
    kind: &str,
    category: NodeCategory,
    ty: ValueType,
    result: ResultType,
    build: fn(Expr) -> Expr,
) -> NodeDefinition {
    NodeDefinition::new(kind, category)
        .output("result", result_port_type(result, &ty))
        .input("value", ty)
        .behavior(UnaryNode { result, build })
}

pub(crate) fn binary(
    kind: &str,
    category: NodeCategory,
    ty: ValueType,
    result: ResultType,
    build: fn(Expr, Expr) -> Expr,
) -> NodeDefinition {
    NodeDefinition::new(kind, category)
        .output("result", result_port_type(result, &ty))
        .input("a", ty.clone())
        .input("b", ty)
        .behavior(BinaryNode { result, build })
}
