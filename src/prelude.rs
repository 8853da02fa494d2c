//! Prelude module for convenient imports
//!
//! Re-exports the types most programs need to compile a graph and to extend
//! the node catalog.
//!
//! # Example
//!
//! ```rust,no_run
//! use kumiki::prelude::*;
//!
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let graph = std::fs::read_to_string("graph.json")?;
//! let schema = std::fs::read_to_string("schema.json")?;
//!
//! let compiler = Compiler::from_json(&graph, Some(&schema))?
//!     .with_tracing(true)
//!     .build();
//! std::fs::write("handlers.rs", compiler.compile_to(Target::Rust)?)?;
//! std::fs::write("handlers.js", compiler.compile_to(Target::JavaScript)?)?;
//! # Ok(())
//! # }
//! ```

// Compilation
pub use crate::backend::{Backend, Target};
pub use crate::compiler::{Compiler, CompilerBuilder};

// Graph and schema models
pub use crate::graph::{NodeGraph, UnitKind};
pub use crate::schema::{Schema, SchemaContext, ValueType};

// Extending the catalog
pub use crate::codegen::{EmitContext, Expr, Stmt};
pub use crate::registry::{NodeBehavior, NodeCategory, NodeDefinition, Registry};

// Error types
pub use crate::error::{
    CompileError, GenerateError, ParseError, RegistryError, ValidationError, ValidationErrors,
};
