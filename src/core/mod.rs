//! Core logic — types, naming, parsing, graph wiring, execution.

pub mod error;
pub mod executor;
pub mod generators;
pub mod graph;
pub mod hasher;
pub mod integration;
pub mod naming;
pub mod orchestrator;
pub mod parser;
pub mod state;
pub mod types;
pub mod wiring;
