//! # Field paths
//!
//! The addressing grammar shared by state nodes, conditions and custom node
//! inputs. A path is a dot-separated list of field names, each optionally
//! followed by one bracketed index:
//!
//! ```text
//! players[0].score        literal index
//! players[i].score        variable index (bound at generation time)
//! players[pid:id].score   key lookup: the element whose `id` equals `pid`
//! ```
//!
//! Parsing never consults a schema; [`crate::schema::SchemaContext`] resolves
//! a [`ParsedPath`] against concrete types afterwards.

use crate::error::PathError;
use std::fmt;
use std::str::FromStr;

/// How a single path segment is indexed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKind {
    None,
    Literal(u64),
    Variable(String),
    KeyLookup { variable: String, key_field: String },
}

impl IndexKind {
    pub fn is_none(&self) -> bool {
        matches!(self, IndexKind::None)
    }
}

/// One `field[index]` step of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSegment {
    pub field: String,
    pub index: IndexKind,
}

impl PathSegment {
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            field: name.into(),
            index: IndexKind::None,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.field)?;
        match &self.index {
            IndexKind::None => Ok(()),
            IndexKind::Literal(n) => write!(f, "[{}]", n),
            IndexKind::Variable(name) => write!(f, "[{}]", name),
            IndexKind::KeyLookup {
                variable,
                key_field,
            } => write!(f, "[{}:{}]", variable, key_field),
        }
    }
}

/// An ordered sequence of typed path segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedPath {
    pub segments: Vec<PathSegment>,
}

impl ParsedPath {
    /// Parses `text` into segments, splitting on `.` outside brackets.
    pub fn parse(text: &str) -> Result<Self, PathError> {
        if text.is_empty() {
            return Err(PathError::Empty);
        }

        let mut segments = Vec::new();
        let mut current = String::new();
        let mut depth = 0usize;

        for ch in text.chars() {
            match ch {
                '[' => {
                    if depth > 0 {
                        return Err(PathError::NestedIndex {
                            path: text.to_string(),
                        });
                    }
                    depth += 1;
                    current.push(ch);
                }
                ']' => {
                    if depth == 0 {
                        return Err(PathError::UnbalancedBracket {
                            path: text.to_string(),
                        });
                    }
                    depth -= 1;
                    current.push(ch);
                }
                '.' if depth == 0 => {
                    segments.push(Self::parse_segment(text, &current, segments.len())?);
                    current.clear();
                }
                _ => current.push(ch),
            }
        }

        if depth != 0 {
            return Err(PathError::UnbalancedBracket {
                path: text.to_string(),
            });
        }
        segments.push(Self::parse_segment(text, &current, segments.len())?);

        Ok(Self { segments })
    }

    fn parse_segment(path: &str, raw: &str, position: usize) -> Result<PathSegment, PathError> {
        let empty = || PathError::EmptySegment {
            path: path.to_string(),
            position,
        };

        let Some(open) = raw.find('[') else {
            if raw.is_empty() {
                return Err(empty());
            }
            return Ok(PathSegment::field(raw));
        };

        let field = &raw[..open];
        if field.is_empty() {
            return Err(empty());
        }
        // The bracket must close the segment: `a[0]b` is rejected.
        if !raw.ends_with(']') {
            return Err(PathError::UnbalancedBracket {
                path: path.to_string(),
            });
        }

        let inner = &raw[open + 1..raw.len() - 1];
        // One index per segment: `a[0][1]` leaves `0][1` between the brackets.
        if inner.contains(['[', ']']) {
            return Err(PathError::NestedIndex {
                path: path.to_string(),
            });
        }
        if inner.is_empty() {
            return Err(PathError::EmptyIndex {
                path: path.to_string(),
                field: field.to_string(),
            });
        }

        Ok(PathSegment {
            field: field.to_string(),
            index: Self::classify_index(path, inner)?,
        })
    }

    fn classify_index(path: &str, inner: &str) -> Result<IndexKind, PathError> {
        if inner.chars().all(|c| c.is_ascii_digit()) {
            // Only canonical decimals become literals so that printing the
            // path reproduces the input exactly (`007` or an overflowing
            // index stays textual).
            if let Ok(n) = inner.parse::<u64>() {
                if n.to_string() == inner {
                    return Ok(IndexKind::Literal(n));
                }
            }
            return Ok(IndexKind::Variable(inner.to_string()));
        }

        if let Some((variable, key_field)) = inner.split_once(':') {
            if variable.is_empty() || key_field.is_empty() || key_field.contains(':') {
                return Err(PathError::InvalidKeyLookup {
                    path: path.to_string(),
                    index: inner.to_string(),
                });
            }
            return Ok(IndexKind::KeyLookup {
                variable: variable.to_string(),
                key_field: key_field.to_string(),
            });
        }

        Ok(IndexKind::Variable(inner.to_string()))
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// Variable names the path needs bound at generation time, in order.
    pub fn variables(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match &s.index {
                IndexKind::Variable(v) => Some(v.as_str()),
                IndexKind::KeyLookup { variable, .. } => Some(variable.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for ParsedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for ParsedPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
