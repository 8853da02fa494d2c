//! # Node graph
//!
//! The intermediate representation the compiler consumes: handlers, filters
//! and functions, each a set of [`Node`]s wired together by [`FlowEdge`]s.
//! Nodes never point at their successors; the flow edges carry all ordering.

mod definition;
mod index;
mod input;

pub use definition::*;
pub use index::FlowIndex;
pub use input::InputRef;
