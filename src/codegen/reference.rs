use super::ast::{Expr, Literal};
use super::context::EmitContext;
use crate::error::ResolveError;
use crate::graph::InputRef;
use crate::naming::ident;
use crate::schema::ValueType;
use serde_json::Value;

impl EmitContext<'_> {
    /// Resolves one input value to an expression and its static type.
    ///
    /// `node:id:port` only resolves to a variable that was declared earlier
    /// in an enclosing block; anything else is reported rather than guessed.
    pub(crate) fn resolve_value(
        &mut self,
        value: &Value,
    ) -> Result<(Expr, ValueType), ResolveError> {
        match InputRef::classify(value)? {
            InputRef::Param(name) => self.resolve_param(name),
            InputRef::Node { node, port } => {
                if !self.knows_node(node) {
                    return Err(ResolveError::UnknownNode(node.to_string()));
                }
                self.binding(node, port)
                    .map(|b| (Expr::Var(b.var.clone()), b.ty.clone()))
                    .ok_or_else(|| ResolveError::UnproducedOutput {
                        node: node.to_string(),
                        port: port.to_string(),
                    })
            }
            InputRef::View(name) => {
                let graph = self.graph();
                let ty = if graph.views.is_empty() {
                    ValueType::Any
                } else {
                    let decl = graph
                        .view(name)
                        .ok_or_else(|| ResolveError::UnknownView(name.to_string()))?;
                    decl.ty
                        .as_deref()
                        .map(ValueType::parse_lenient)
                        .unwrap_or_default()
                };
                self.views.insert(name.to_string());
                Ok((Expr::View(name.to_string()), ty))
            }
            InputRef::Literal(value) => {
                let lit = Literal::from_json(value);
                let ty = lit.value_type();
                Ok((Expr::Lit(lit), ty))
            }
        }
    }

    fn resolve_param(&self, name: &str) -> Result<(Expr, ValueType), ResolveError> {
        if let Some(param) = self.fragment().parameter(name) {
            return Ok((
                Expr::Var(ident(&param.name)),
                ValueType::parse_lenient(&param.ty),
            ));
        }
        match name {
            "sender" | "viewer" => Ok((self.sender(), ValueType::String)),
            _ => Err(ResolveError::UnknownParameter(name.to_string())),
        }
    }

    /// Resolves a variable used inside a path index: a parameter, `index`
    /// (the innermost loop), the id of an enclosing loop, or `sender`.
    pub(crate) fn resolve_path_variable(&self, name: &str) -> Result<Expr, ResolveError> {
        if let Some(param) = self.fragment().parameter(name) {
            return Ok(Expr::Var(ident(&param.name)));
        }
        if name == "index" {
            if let Some(scope) = self.loops.last() {
                return Ok(Expr::Var(scope.index.clone()));
            }
        }
        if let Some(scope) = self.loops.iter().rev().find(|s| s.node == name) {
            return Ok(Expr::Var(scope.index.clone()));
        }
        if name == "sender" || name == "viewer" {
            return Ok(self.sender());
        }
        Err(ResolveError::UnboundVariable(name.to_string()))
    }
}
