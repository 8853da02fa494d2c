//! # Kumiki - Node Graph to Source Compiler
//!
//! **Kumiki** is a build-time compiler for visual event-handler graphs. A graph
//! describes handlers, per-viewer filters and reusable functions as nodes wired
//! together by flow edges. Kumiki checks the graph, reconstructs structured
//! control flow from the edges, and writes plain imperative source for a Rust
//! server and a JavaScript client. The graph is never interpreted.
//!
//! ## Core Workflow
//!
//! 1.  **Load**: Parse the graph JSON into a [`graph::NodeGraph`], and
//!     optionally a state schema into a [`schema::SchemaContext`]. With a
//!     schema, state access is emitted through typed accessors.
//! 2.  **Validate**: [`validate::validate`] runs every static check and
//!     reports all violations together.
//! 3.  **Generate**: [`codegen::Generator`] lowers each unit to a
//!     target-neutral [`codegen::Program`].
//! 4.  **Render**: A [`backend::Backend`] prints the program for its
//!     [`backend::Target`].
//!
//! [`Compiler`] runs all four steps. Node kinds are looked up in a
//! [`registry::Registry`], which applications may extend with their own
//! kinds through the [`registry::NodeBehavior`] trait.
//!
//! ## Quick Start
//!
//! ```rust
//! use kumiki::prelude::*;
//!
//! fn main() -> Result<(), CompileError> {
//!     let graph = r#"{
//!         "handlers": [{
//!             "name": "OnGreet",
//!             "nodes": [
//!                 { "id": "hello", "type": "log", "inputs": { "message": "hello" } }
//!             ],
//!             "flow": [
//!                 { "from": "start", "to": "hello" },
//!                 { "from": "hello", "to": "end" }
//!             ]
//!         }]
//!     }"#;
//!
//!     let compiler = Compiler::from_json(graph, None)?
//!         .with_target(Target::Rust)
//!         .build();
//!     let source = compiler.compile()?;
//!     assert!(source.contains("pub fn on_greet("));
//!
//!     // The same graph, for the browser.
//!     let client = compiler.compile_to(Target::JavaScript)?;
//!     assert!(client.contains("export function onGreet("));
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod codegen;
pub mod compiler;
pub mod error;
pub mod graph;
pub mod instrument;
pub mod naming;
mod nodes;
pub mod path;
pub mod prelude;
pub mod registry;
pub mod schema;
pub mod validate;

pub use compiler::{Compiler, CompilerBuilder};
