//! CJ-014: Error taxonomy for configuration and execution.
//!
//! Configuration errors (malformed generator names, missing generators,
//! missing siblings, invalid topology) abort before any work item runs.
//! Runtime errors surface as task failures.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while configuring or executing a conjure build.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Configuration errors
    // =========================================================================
    #[error(
        "generators should start with '{prefix}' according to conjure RFC 002, but found name: '{name}' ({coordinate})"
    )]
    MalformedGeneratorName {
        prefix: &'static str,
        name: String,
        coordinate: String,
    },

    #[error("discovered unit '{unit}' without corresponding generator dependency with name '{expected}'")]
    MissingGenerator { unit: String, expected: String },

    #[error("cannot enable '{unit}' without '{sibling}'")]
    MissingSibling { unit: String, sibling: String },

    #[error("generator language '{language}' is declared more than once ({first}, {second})")]
    DuplicateGenerator {
        language: String,
        first: String,
        second: String,
    },

    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    #[error("invalid coordinate '{0}': expected group:name[:version][@ext]")]
    InvalidCoordinate(String),

    #[error("manifest error: {0}")]
    Manifest(String),

    // =========================================================================
    // Graph errors
    // =========================================================================
    #[error("task '{0}' is already registered")]
    DuplicateTask(String),

    #[error("unknown task '{0}'")]
    UnknownTask(String),

    #[error("dependency cycle detected involving: {0}")]
    DependencyCycle(String),

    // =========================================================================
    // Runtime errors
    // =========================================================================
    #[error("task '{task}' failed: {message}")]
    TaskFailed { task: String, message: String },

    #[error("cannot extract {coordinate}: {message}")]
    Extraction { coordinate: String, message: String },

    #[error("{action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Wrap an IO error with the path and the action being attempted.
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// Whether this error belongs to the configuration phase.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MalformedGeneratorName { .. }
                | Self::MissingGenerator { .. }
                | Self::MissingSibling { .. }
                | Self::DuplicateGenerator { .. }
                | Self::InvalidTopology(_)
                | Self::InvalidCoordinate(_)
                | Self::Manifest(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Non-fatal configuration problems. Logged and collected; wiring proceeds.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Warning {
    #[error("optional integration '{integration}' unavailable on '{unit}': {reason}")]
    OptionalIntegrationUnavailable {
        integration: String,
        unit: String,
        reason: String,
    },
}
