use super::ast::{Expr, Stmt};
use super::context::EmitContext;
use crate::error::{GenerateError, ResolveError};
use crate::graph::Node;
use crate::path::{IndexKind, ParsedPath};
use crate::schema::{AccessorFamily, ResolvedSegment, ValueType};

/// How a path operation is compiled: through typed accessors when a schema
/// is loaded, or through the untyped runtime helpers otherwise.
enum Access<'s> {
    Typed(Vec<ResolvedSegment<'s>>),
    Untyped(Vec<Expr>),
}

impl<'a> EmitContext<'a> {
    fn access(&self, node: &Node, text: &str) -> Result<(ParsedPath, Access<'a>), GenerateError> {
        let path = ParsedPath::parse(text).map_err(|e| self.resolve_error(node, e.into()))?;
        for segment in &path.segments {
            if let IndexKind::Literal(n) = segment.index {
                if i64::try_from(n).is_err() {
                    let overflow = ResolveError::IndexOverflow {
                        field: segment.field.clone(),
                        index: n,
                    };
                    return Err(self.resolve_error(node, overflow));
                }
            }
        }
        let access = match self.schema() {
            Some(schema) => Access::Typed(
                schema
                    .resolve_from_root(&path)
                    .map_err(|e| self.resolve_error(node, e))?,
            ),
            None => Access::Untyped(self.untyped_keys(node, &path)?),
        };
        Ok((path, access))
    }

    fn untyped_keys(&self, node: &Node, path: &ParsedPath) -> Result<Vec<Expr>, GenerateError> {
        let mut keys = Vec::with_capacity(path.len() * 2);
        for segment in &path.segments {
            keys.push(Expr::helper("path_field", vec![Expr::str(&segment.field)]));
            match &segment.index {
                IndexKind::None => {}
                IndexKind::Literal(n) => {
                    keys.push(Expr::helper("path_index", vec![position(*n)]))
                }
                IndexKind::Variable(v) => {
                    let var = self
                        .resolve_path_variable(v)
                        .map_err(|e| self.resolve_error(node, e))?;
                    keys.push(Expr::helper("path_index", vec![var]));
                }
                IndexKind::KeyLookup {
                    variable,
                    key_field,
                } => {
                    let var = self
                        .resolve_path_variable(variable)
                        .map_err(|e| self.resolve_error(node, e))?;
                    keys.push(Expr::helper("path_key", vec![Expr::str(key_field), var]));
                }
            }
        }
        Ok(keys)
    }

    fn untyped(&self, helper: &str, keys: Vec<Expr>, extra: Vec<Expr>) -> Expr {
        let mut args = vec![self.state(), Expr::Slice(keys)];
        args.extend(extra);
        Expr::helper(helper, args).try_()
    }

    /// Walks `segments` from the state root, applying each index.
    fn navigate(
        &self,
        node: &Node,
        segments: &[ResolvedSegment<'_>],
        mutable: bool,
    ) -> Result<Expr, GenerateError> {
        let mut expr = self.state();
        for segment in segments {
            let family = &segment.field.accessors;
            expr = match &segment.segment.index {
                IndexKind::None => {
                    let getter = if mutable {
                        family.getter_mut()
                    } else {
                        family.getter().to_string()
                    };
                    expr.method(getter, vec![])
                }
                index => self.indexed(node, expr, family, index, mutable)?,
            };
        }
        Ok(expr)
    }

    fn indexed(
        &self,
        node: &Node,
        receiver: Expr,
        family: &AccessorFamily,
        index: &IndexKind,
        mutable: bool,
    ) -> Result<Expr, GenerateError> {
        let expr = match (family, index) {
            (
                AccessorFamily::Array { at, at_mut, .. },
                IndexKind::Literal(_) | IndexKind::Variable(_),
            ) => {
                let name = if mutable { at_mut } else { at };
                receiver.method(name.clone(), vec![self.array_index(node, index)?])
            }
            (
                AccessorFamily::Array {
                    keyed: Some(keyed), ..
                },
                IndexKind::KeyLookup { variable, .. },
            ) => {
                let name = if mutable { &keyed.find_mut } else { &keyed.find };
                let var = self
                    .resolve_path_variable(variable)
                    .map_err(|e| self.resolve_error(node, e))?;
                receiver.method(name.clone(), vec![var.borrowed()])
            }
            (
                AccessorFamily::Map {
                    get_by_key,
                    get_by_key_mut,
                    ..
                },
                IndexKind::Literal(_) | IndexKind::Variable(_),
            ) => {
                let name = if mutable { get_by_key_mut } else { get_by_key };
                let key = self.map_key(node, index)?;
                receiver.method(name.clone(), vec![key.borrowed()])
            }
            _ => {
                return Err(self.error(node, "field cannot be indexed this way"));
            }
        };
        Ok(expr.try_())
    }

    fn array_index(&self, node: &Node, index: &IndexKind) -> Result<Expr, GenerateError> {
        match index {
            IndexKind::Literal(n) => Ok(position(*n)),
            IndexKind::Variable(v) => self
                .resolve_path_variable(v)
                .map(Expr::as_index)
                .map_err(|e| self.resolve_error(node, e)),
            _ => Err(self.error(node, "array positions must be literals or variables")),
        }
    }

    fn map_key(&self, node: &Node, index: &IndexKind) -> Result<Expr, GenerateError> {
        match index {
            IndexKind::Literal(n) => Ok(Expr::str(n.to_string())),
            IndexKind::Variable(v) => self
                .resolve_path_variable(v)
                .map_err(|e| self.resolve_error(node, e)),
            _ => Err(self.error(node, "map keys must be literals or variables")),
        }
    }

    fn wrong_shape(&self, node: &Node, path: &ParsedPath, expected: &'static str) -> GenerateError {
        self.resolve_error(
            node,
            ResolveError::WrongShape {
                path: path.to_string(),
                expected,
            },
        )
    }

    /// Splits off the last segment, requiring it to be an unindexed field.
    fn container<'r, 's>(
        &self,
        node: &Node,
        path: &ParsedPath,
        segments: &'r [ResolvedSegment<'s>],
        expected: &'static str,
    ) -> Result<(&'r [ResolvedSegment<'s>], &'r ResolvedSegment<'s>), GenerateError> {
        match segments.split_last() {
            Some((last, prefix)) if last.segment.index.is_none() => Ok((prefix, last)),
            _ => Err(self.wrong_shape(node, path, expected)),
        }
    }

    /// Reads the value at `text` into an owned expression.
    pub fn read_path(&mut self, node: &Node, text: &str) -> Result<(Expr, ValueType), GenerateError> {
        let (_, access) = self.access(node, text)?;
        match access {
            Access::Typed(segments) => {
                let ty = segments
                    .last()
                    .map(|s| s.value_type.clone())
                    .unwrap_or_default();
                Ok((self.navigate(node, &segments, false)?.owned(), ty))
            }
            Access::Untyped(keys) => Ok((self.untyped("state_get", keys, vec![]), ValueType::Any)),
        }
    }

    /// Replaces the value at `text`.
    pub fn write_path(&mut self, node: &Node, text: &str, value: Expr) -> Result<(), GenerateError> {
        let (path, access) = self.access(node, text)?;
        let stmt = match access {
            Access::Typed(segments) => {
                let Some((last, prefix)) = segments.split_last() else {
                    return Err(self.wrong_shape(node, &path, "field"));
                };
                let receiver = self.navigate(node, prefix, true)?;
                let family = &last.field.accessors;
                let expr = match (&last.segment.index, family) {
                    (IndexKind::None, _) => receiver.method(family.setter(), vec![value]),
                    (
                        IndexKind::Literal(_) | IndexKind::Variable(_),
                        AccessorFamily::Array { update_at, .. },
                    ) => {
                        let index = self.array_index(node, &last.segment.index)?;
                        receiver.method(update_at.clone(), vec![index, value]).try_()
                    }
                    (
                        IndexKind::KeyLookup { variable, .. },
                        AccessorFamily::Array {
                            keyed: Some(keyed), ..
                        },
                    ) => {
                        let var = self
                            .resolve_path_variable(variable)
                            .map_err(|e| self.resolve_error(node, e))?;
                        receiver
                            .method(keyed.update.clone(), vec![var.borrowed(), value])
                            .try_()
                    }
                    (index, AccessorFamily::Map { set_key, .. }) => {
                        let key = self.map_key(node, index)?;
                        receiver.method(set_key.clone(), vec![key.owned(), value])
                    }
                    _ => return Err(self.wrong_shape(node, &path, "writable field")),
                };
                Stmt::Expr(expr)
            }
            Access::Untyped(keys) => Stmt::Expr(self.untyped("state_set", keys, vec![value])),
        };
        self.push(stmt);
        Ok(())
    }

    /// Appends `value` to the array at `text`.
    pub fn append_path(&mut self, node: &Node, text: &str, value: Expr) -> Result<(), GenerateError> {
        let (path, access) = self.access(node, text)?;
        let expr = match access {
            Access::Typed(segments) => {
                let (prefix, last) = self.container(node, &path, &segments, "array")?;
                let AccessorFamily::Array { append, .. } = &last.field.accessors else {
                    return Err(self.wrong_shape(node, &path, "array"));
                };
                self.navigate(node, prefix, true)?
                    .method(append.clone(), vec![value])
            }
            Access::Untyped(keys) => self.untyped("state_append", keys, vec![value]),
        };
        self.push(Stmt::Expr(expr));
        Ok(())
    }

    /// Removes the element at `index` from the array at `text`.
    pub fn remove_at_path(
        &mut self,
        node: &Node,
        text: &str,
        index: Expr,
    ) -> Result<(), GenerateError> {
        let (path, access) = self.access(node, text)?;
        let expr = match access {
            Access::Typed(segments) => {
                let (prefix, last) = self.container(node, &path, &segments, "array")?;
                let AccessorFamily::Array { remove_at, .. } = &last.field.accessors else {
                    return Err(self.wrong_shape(node, &path, "array"));
                };
                self.navigate(node, prefix, true)?
                    .method(remove_at.clone(), vec![index.as_index()])
                    .try_()
            }
            Access::Untyped(keys) => self.untyped("state_remove_at", keys, vec![index]),
        };
        self.push(Stmt::Expr(expr));
        Ok(())
    }

    /// Inserts or replaces `key` in the map at `text`.
    pub fn set_key_path(
        &mut self,
        node: &Node,
        text: &str,
        key: Expr,
        value: Expr,
    ) -> Result<(), GenerateError> {
        let (path, access) = self.access(node, text)?;
        let expr = match access {
            Access::Typed(segments) => {
                let (prefix, last) = self.container(node, &path, &segments, "map")?;
                let AccessorFamily::Map { set_key, .. } = &last.field.accessors else {
                    return Err(self.wrong_shape(node, &path, "map"));
                };
                self.navigate(node, prefix, true)?
                    .method(set_key.clone(), vec![key.owned(), value])
            }
            Access::Untyped(keys) => self.untyped("state_set_key", keys, vec![key, value]),
        };
        self.push(Stmt::Expr(expr));
        Ok(())
    }

    /// Removes `key` from the map at `text`.
    pub fn delete_key_path(&mut self, node: &Node, text: &str, key: Expr) -> Result<(), GenerateError> {
        let (path, access) = self.access(node, text)?;
        let expr = match access {
            Access::Typed(segments) => {
                let (prefix, last) = self.container(node, &path, &segments, "map")?;
                let AccessorFamily::Map { delete_key, .. } = &last.field.accessors else {
                    return Err(self.wrong_shape(node, &path, "map"));
                };
                self.navigate(node, prefix, true)?
                    .method(delete_key.clone(), vec![key.borrowed()])
            }
            Access::Untyped(keys) => self.untyped("state_delete_key", keys, vec![key]),
        };
        self.push(Stmt::Expr(expr));
        Ok(())
    }

    /// The length of the array at `text`.
    pub fn len_path(&mut self, node: &Node, text: &str) -> Result<Expr, GenerateError> {
        let (path, access) = self.access(node, text)?;
        match access {
            Access::Typed(segments) => {
                let (prefix, last) = self.container(node, &path, &segments, "array")?;
                let AccessorFamily::Array { length, .. } = &last.field.accessors else {
                    return Err(self.wrong_shape(node, &path, "array"));
                };
                Ok(self
                    .navigate(node, prefix, false)?
                    .method(length.clone(), vec![]))
            }
            Access::Untyped(keys) => Ok(self.untyped("state_len", keys, vec![])),
        }
    }

    /// The collection expression and element type for a loop over `text`.
    ///
    /// Immutable loops iterate an owned copy so the body may write state.
    pub(crate) fn iterate_path(
        &mut self,
        node: &Node,
        text: &str,
        mutable: bool,
    ) -> Result<(Expr, ValueType), GenerateError> {
        let (path, access) = self.access(node, text)?;
        match access {
            Access::Typed(segments) => {
                let element = match segments.last().map(|s| &s.value_type) {
                    Some(ValueType::Array(elem)) => (**elem).clone(),
                    _ => return Err(self.wrong_shape(node, &path, "array")),
                };
                let collection = self.navigate(node, &segments, mutable)?;
                let collection = if mutable {
                    collection
                } else {
                    collection.owned()
                };
                Ok((collection, element))
            }
            Access::Untyped(keys) => {
                let (getter, list) = if mutable {
                    ("state_get_mut", "as_list_mut")
                } else {
                    ("state_get", "as_list")
                };
                let value = self.untyped(getter, keys, vec![]);
                let value = if mutable { value } else { value.borrowed() };
                Ok((Expr::helper(list, vec![value]).try_(), ValueType::Any))
            }
        }
    }
}

/// A literal array position. `access` has already rejected positions past
/// `i64::MAX`.
fn position(n: u64) -> Expr {
    Expr::int(i64::try_from(n).unwrap_or(i64::MAX))
}
