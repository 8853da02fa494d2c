use crate::error::ResolveError;
use serde_json::Value;

/// The classified form of a node input value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputRef<'a> {
    /// `param:name`
    Param(&'a str),
    /// `node:id:port`
    Node { node: &'a str, port: &'a str },
    /// `view:name`
    View(&'a str),
    /// Anything else, emitted verbatim.
    Literal(&'a Value),
}

impl<'a> InputRef<'a> {
    /// Classifies an input by its string prefix.
    ///
    /// Node ids may themselves contain `:`; the port is whatever follows the
    /// last one.
    pub fn classify(value: &'a Value) -> Result<Self, ResolveError> {
        let Value::String(text) = value else {
            return Ok(InputRef::Literal(value));
        };

        if let Some(name) = text.strip_prefix("param:") {
            if name.is_empty() {
                return Err(ResolveError::MalformedReference(text.clone()));
            }
            return Ok(InputRef::Param(name));
        }
        if let Some(rest) = text.strip_prefix("node:") {
            return match rest.rsplit_once(':') {
                Some((node, port)) if !node.is_empty() && !port.is_empty() => {
                    Ok(InputRef::Node { node, port })
                }
                _ => Err(ResolveError::MalformedReference(text.clone())),
            };
        }
        if let Some(name) = text.strip_prefix("view:") {
            if name.is_empty() {
                return Err(ResolveError::MalformedReference(text.clone()));
            }
            return Ok(InputRef::View(name));
        }
        Ok(InputRef::Literal(value))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, InputRef::Literal(_))
    }
}

