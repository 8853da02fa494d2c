use super::ResultType;
use crate::codegen::{BinOp, Expr};
use crate::registry::{NodeCategory, Registry};
use crate::schema::ValueType;

define_operator_nodes! {
    NodeCategory::Logic;
    ("not", Unary, ValueType::Bool, ResultType::Bool, Expr::not),
    ;
    ("and", Binary, ValueType::Bool, ResultType::Bool, |a, b| Expr::binary(BinOp::And, a, b)),
    ("or", Binary, ValueType::Bool, ResultType::Bool, |a, b| Expr::binary(BinOp::Or, a, b)),
    ("equals", Binary, ValueType::Any, ResultType::Bool, |a, b| Expr::binary(BinOp::Eq, a, b)),
    ("notEquals", Binary, ValueType::Any, ResultType::Bool, |a, b| Expr::binary(BinOp::Ne, a, b)),
    ("greaterThan", Binary, ValueType::Float, ResultType::Bool, |a, b| Expr::binary(BinOp::Gt, a, b)),
    ("lessThan", Binary, ValueType::Float, ResultType::Bool, |a, b| Expr::binary(BinOp::Lt, a, b)),
    ("greaterOrEqual", Binary, ValueType::Float, ResultType::Bool, |a, b| Expr::binary(BinOp::Ge, a, b)),
    ("lessOrEqual", Binary, ValueType::Float, ResultType::Bool, |a, b| Expr::binary(BinOp::Le, a, b)),
}

pub(super) fn register(registry: &mut Registry) {
    register_operators(registry);
}
