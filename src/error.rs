use std::fmt;
use thiserror::Error;

/// Errors raised while reading graph or schema JSON. Always fatal.
#[derive(Error, Debug, Clone)]
pub enum ParseError {
    #[error("Failed to parse graph JSON: {0}")]
    Graph(String),

    #[error("Failed to parse schema JSON: {0}")]
    Schema(String),

    #[error("Schema type '{type_name}' has an invalid field type '{spelling}'")]
    FieldType { type_name: String, spelling: String },

    #[error("Unknown target '{0}' (expected 'rust' or 'javascript')")]
    UnknownTarget(String),
}

/// Syntax errors in a dotted/bracketed field path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Path is empty")]
    Empty,

    #[error("Path '{path}' has an empty segment at position {position}")]
    EmptySegment { path: String, position: usize },

    #[error("Path '{path}' has an unbalanced bracket")]
    UnbalancedBracket { path: String },

    #[error("Path '{path}' has an empty index on field '{field}'")]
    EmptyIndex { path: String, field: String },

    #[error("Path '{path}' nests brackets inside an index, which is not supported")]
    NestedIndex { path: String },

    #[error("Path '{path}' has an invalid key lookup '{index}' (expected 'variable:keyField')")]
    InvalidKeyLookup { path: String, index: String },
}

/// Errors resolving a path, reference or type while emitting a node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Unknown schema type '{0}'")]
    UnknownType(String),

    #[error("Type '{type_name}' has no field '{field}'")]
    UnknownField { type_name: String, field: String },

    #[error("Field '{field}' of type '{type_name}' cannot be indexed with '{index}'")]
    InvalidIndex {
        type_name: String,
        field: String,
        index: String,
    },

    #[error("Array field '{field}' of type '{type_name}' has no key field for lookup by '{key_field}'")]
    MissingKeyField {
        type_name: String,
        field: String,
        key_field: String,
    },

    #[error("Path '{path}' does not address a {expected}")]
    WrongShape { path: String, expected: &'static str },

    #[error("Reference to unknown node '{0}'")]
    UnknownNode(String),

    #[error("Output '{port}' of node '{node}' is not available here (forward reference, out of scope, or never produced)")]
    UnproducedOutput { node: String, port: String },

    #[error("Reference to unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("Reference to undeclared view '{0}'")]
    UnknownView(String),

    #[error("Index {index} on field '{field}' does not fit a 64-bit signed position")]
    IndexOverflow { field: String, index: u64 },

    #[error("Path variable '{0}' is not bound to a parameter or loop")]
    UnboundVariable(String),

    #[error("Malformed reference '{0}'")]
    MalformedReference(String),

    #[error(transparent)]
    Path(#[from] PathError),
}

/// Errors raised while generating code for a unit, with positional context.
#[derive(Error, Debug, Clone)]
pub enum GenerateError {
    #[error("{unit}, node '{node}': {source}")]
    Resolve {
        unit: String,
        node: String,
        #[source]
        source: ResolveError,
    },

    #[error("{unit}, node '{node}': missing input '{port}'")]
    MissingInput {
        unit: String,
        node: String,
        port: String,
    },

    #[error("{unit}, node '{node}': input '{port}' must be a literal {expected}")]
    LiteralRequired {
        unit: String,
        node: String,
        port: String,
        expected: &'static str,
    },

    #[error("{unit}, node '{node}': unknown node kind '{kind}'")]
    UnknownKind {
        unit: String,
        node: String,
        kind: String,
    },

    #[error("{unit}: flow reaches node '{node}' twice; the graph is not structured")]
    UnstructuredFlow { unit: String, node: String },

    #[error("{unit}: flow edge points at unknown node '{node}'")]
    DanglingEdge { unit: String, node: String },

    #[error("{unit}, node '{node}': {message}")]
    Custom {
        unit: String,
        node: String,
        message: String,
    },
}

/// Errors raised by the node type registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Node kind '{kind}' is already registered in the {tier} tier")]
    Duplicate { kind: String, tier: &'static str },

    #[error("Node kind name must not be empty")]
    EmptyKind,
}

/// The category of a single validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    MissingInput,
    DuplicateId,
    DanglingEdge,
    UnknownKind,
    EdgeArity,
    MissingStart,
    MissingReturn,
    NotAllowedInFilter,
    UnknownFunction,
    UnstructuredFlow,
    UnreachableNode,
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MissingInput => "MISSING_INPUT",
            Self::DuplicateId => "DUPLICATE_ID",
            Self::DanglingEdge => "DANGLING_EDGE",
            Self::UnknownKind => "UNKNOWN_KIND",
            Self::EdgeArity => "EDGE_ARITY",
            Self::MissingStart => "MISSING_START",
            Self::MissingReturn => "MISSING_RETURN",
            Self::NotAllowedInFilter => "NOT_ALLOWED_IN_FILTER",
            Self::UnknownFunction => "UNKNOWN_FUNCTION",
            Self::UnstructuredFlow => "UNSTRUCTURED_FLOW",
            Self::UnreachableNode => "UNREACHABLE_NODE",
        };
        write!(f, "{}", s)
    }
}

/// A single violation found by the validator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[{kind}] {location}: {message}")]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    /// Where the violation was found, e.g. `handler 'OnJoin' / node 'n3'`.
    pub location: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(
        kind: ValidationErrorKind,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            location: location.into(),
            message: message.into(),
        }
    }
}

/// Every violation found in one validation pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    /// Counts the findings of one kind.
    pub fn count(&self, kind: ValidationErrorKind) -> usize {
        self.0.iter().filter(|e| e.kind == kind).count()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed with {} error(s):", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  - {}", error)?;
        }
        Ok(())
    }
}

/// Top-level error returned by the compilation pipeline.
#[derive(Error, Debug, Clone)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
