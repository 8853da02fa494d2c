//! Target-neutral statement IR produced by the generator and rendered by the
//! printers in [`crate::backend`].

use crate::graph::UnitKind;
use crate::instrument::TraceKind;
use crate::schema::{SchemaContext, ValueType};
use serde_json::Value;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Literal>),
    /// Keys in sorted order.
    Map(Vec<(String, Literal)>),
}

impl Literal {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Literal::Null,
            Value::Bool(b) => Literal::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Literal::Int(i),
                None => Literal::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => Literal::Str(s.clone()),
            Value::Array(items) => Literal::List(items.iter().map(Literal::from_json).collect()),
            Value::Object(map) => {
                let mut entries: Vec<(String, Literal)> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), Literal::from_json(v)))
                    .collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                Literal::Map(entries)
            }
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::from(*i),
            Literal::Float(f) => Value::from(*f),
            Literal::Str(s) => Value::String(s.clone()),
            Literal::List(items) => Value::Array(items.iter().map(Literal::to_json).collect()),
            Literal::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// The static type of the literal.
    pub fn value_type(&self) -> ValueType {
        match self {
            Literal::Null => ValueType::Any,
            Literal::Bool(_) => ValueType::Bool,
            Literal::Int(_) => ValueType::Int,
            Literal::Float(_) => ValueType::Float,
            Literal::Str(_) => ValueType::String,
            Literal::List(items) => {
                let first = items.first().map(Literal::value_type).unwrap_or_default();
                if items.iter().all(|i| i.value_type() == first) {
                    ValueType::Array(Box::new(first))
                } else {
                    ValueType::Array(Box::new(ValueType::Any))
                }
            }
            Literal::Map(_) => ValueType::Map(Box::new(ValueType::Any)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathFn {
    Min,
    Max,
    Abs,
    Round,
    Floor,
    Ceil,
    Clamp,
}

/// Names supplied by the enclosing unit rather than by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ambient {
    State,
    Session,
    Sender,
    Viewer,
    Cancel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Var(String),
    Lit(Literal),
    Ambient(Ambient),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    /// A call to another generated function. Printers add the ambient
    /// arguments.
    Call {
        function: String,
        args: Vec<Expr>,
        cancellable: bool,
    },
    /// A runtime library helper.
    Helper {
        name: String,
        args: Vec<Expr>,
    },
    /// A method call; accessor names are canonical snake case.
    Method {
        receiver: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
    Field {
        receiver: Box<Expr>,
        name: String,
    },
    /// Propagates a runtime error to the caller.
    Try(Box<Expr>),
    Ref {
        expr: Box<Expr>,
        mutable: bool,
    },
    /// An owned copy of a borrowed value.
    Owned(Box<Expr>),
    /// A fixed-length argument list, e.g. path keys.
    Slice(Vec<Expr>),
    List(Vec<Expr>),
    View(String),
    ToString(Box<Expr>),
    /// `{}` placeholders filled positionally.
    Format {
        template: String,
        args: Vec<Expr>,
    },
    Math {
        func: MathFn,
        args: Vec<Expr>,
    },
    InList {
        needle: Box<Expr>,
        list: Vec<Literal>,
    },
    /// Converts an integer to a container index.
    AsIndex(Box<Expr>),
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn str(text: impl Into<String>) -> Self {
        Expr::Lit(Literal::Str(text.into()))
    }

    pub fn int(value: i64) -> Self {
        Expr::Lit(Literal::Int(value))
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn not(expr: Expr) -> Self {
        Expr::Unary {
            op: UnaryOp::Not,
            expr: Box::new(expr),
        }
    }

    pub fn helper(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Helper {
            name: name.into(),
            args,
        }
    }

    pub fn method(self, name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Method {
            receiver: Box::new(self),
            name: name.into(),
            args,
        }
    }

    pub fn field(self, name: impl Into<String>) -> Self {
        Expr::Field {
            receiver: Box::new(self),
            name: name.into(),
        }
    }

    pub fn try_(self) -> Self {
        Expr::Try(Box::new(self))
    }

    pub fn borrowed(self) -> Self {
        Expr::Ref {
            expr: Box::new(self),
            mutable: false,
        }
    }

    pub fn borrowed_mut(self) -> Self {
        Expr::Ref {
            expr: Box::new(self),
            mutable: true,
        }
    }

    pub fn owned(self) -> Self {
        Expr::Owned(Box::new(self))
    }

    pub fn as_index(self) -> Self {
        match self {
            Expr::Lit(Literal::Int(_)) => self,
            other => Expr::AsIndex(Box::new(other)),
        }
    }

    pub fn is_simple(&self) -> bool {
        matches!(self, Expr::Var(_) | Expr::Lit(_) | Expr::Ambient(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FailReason {
    NotHost,
    NotPermitted,
    Message(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum WaitKind {
    /// Milliseconds.
    Duration(Expr),
    Until { condition: Expr, interval: Expr },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracePoint {
    pub kind: TraceKind,
    pub node: String,
}

pub type Block = Vec<Stmt>;

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let {
        name: String,
        mutable: bool,
        value: Expr,
    },
    Assign {
        target: Expr,
        value: Expr,
    },
    Expr(Expr),
    If {
        condition: Expr,
        then: Block,
        otherwise: Block,
    },
    ForEach {
        item: String,
        index: String,
        iter: Expr,
        mutable: bool,
        body: Block,
    },
    Repeat {
        index: String,
        count: Expr,
        body: Block,
    },
    Continue,
    /// Leaves the unit. `None` is the unit's normal success value.
    Return(Option<Expr>),
    Fail(FailReason),
    Wait {
        node: String,
        kind: WaitKind,
    },
    Trace(TracePoint),
    Comment(String),
    /// A registered kind with no emitter.
    Placeholder {
        node: String,
        kind: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: ValueType,
}

/// One generated entry point.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub kind: UnitKind,
    /// Name as authored.
    pub name: String,
    /// Canonical snake-case identifier.
    pub ident: String,
    pub event: Option<String>,
    pub params: Vec<Param>,
    pub returns: Option<ValueType>,
    pub cancellable: bool,
    pub traced: bool,
    pub body: Block,
}

/// Everything the printers need to render one compilation.
#[derive(Debug, Clone)]
pub struct Program {
    pub package: String,
    pub units: Vec<Unit>,
    pub tracing: bool,
    /// Number of placeholder statements emitted.
    pub placeholders: usize,
    pub views: BTreeSet<String>,
    /// Present when state types should be emitted alongside the units.
    pub schema: Option<SchemaContext>,
    /// Name of the state type handlers receive.
    pub state_type: String,
}

impl Program {
    pub fn unit(&self, name: &str) -> Option<&Unit> {
        self.units.iter().find(|u| u.name == name)
    }

    pub fn has_filters(&self) -> bool {
        self.units.iter().any(|u| u.kind == UnitKind::Filter)
    }
}
