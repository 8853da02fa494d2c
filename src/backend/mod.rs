//! # Target printers
//!
//! A [`Backend`] renders a generated [`Program`] as source text for one
//! target language. Both printers consume the same program, so a graph
//! compiled for the Rust server and for the JavaScript client behaves the
//! same on both sides.
//!
//! Printers are deterministic: the same program always renders to the same
//! bytes.

mod javascript;
mod rust;
mod types;
mod writer;

pub use javascript::JavaScriptBackend;
pub use rust::RustBackend;

use crate::codegen::Program;
use crate::error::ParseError;
use std::fmt;
use std::str::FromStr;

/// A trait for anything that can turn a [`Program`] into target source.
pub trait Backend: Send + Sync {
    /// The language this backend writes.
    fn target(&self) -> Target;

    /// Renders the whole program as one source file.
    fn render(&self, program: &Program) -> String;
}

/// Selects the language generated code is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Target {
    /// Server-side Rust against the `kumiki_runtime` crate.
    #[default]
    Rust,
    /// A client-side ES module against the `kumiki-runtime` package.
    JavaScript,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Rust => "rust",
            Target::JavaScript => "javascript",
        }
    }

    /// Conventional file extension for the target's output.
    pub fn extension(&self) -> &'static str {
        match self {
            Target::Rust => "rs",
            Target::JavaScript => "js",
        }
    }

    /// The printer for this target.
    pub fn backend(&self) -> Box<dyn Backend> {
        match self {
            Target::Rust => Box::new(RustBackend),
            Target::JavaScript => Box::new(JavaScriptBackend),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rust" | "rs" => Ok(Target::Rust),
            "javascript" | "js" | "typescript" | "ts" => Ok(Target::JavaScript),
            other => Err(ParseError::UnknownTarget(other.to_string())),
        }
    }
}

/// Renders `program` for `target`.
pub fn render(program: &Program, target: Target) -> String {
    target.backend().render(program)
}
