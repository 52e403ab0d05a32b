//! Conjurer — multi-target code generation orchestration for conjure APIs.
//!
//! A root unit holds conjure definitions. Child units named
//! `<root>-<language>` receive generated code. Configuration discovers the
//! children, resolves each to a generator, and wires a dependency graph of
//! work items that the executor runs with BLAKE3 up-to-date checks.

pub mod cli;
pub mod core;
pub mod extract;
pub mod transport;
