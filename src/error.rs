use std::{path::PathBuf, time::Duration};

use thiserror::Error;

use crate::version::HostVersion;

/// A module could not be loaded by the host.
///
/// Cloneable so a lazy binding can memoize a failed realization and report
/// the same failure on every later use.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("module `{module}` is unavailable: {reason}")]
pub struct Unavailable {
    pub module: String,
    pub reason: String,
}

impl Unavailable {
    pub fn new(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that can occur while aggregating symbols.
#[derive(Debug, Error)]
pub enum Error {
    /// A candidate module cannot be loaded in the current environment.
    #[error(transparent)]
    ModuleUnavailable(#[from] Unavailable),

    /// The public interface of a module could not be determined.
    #[error("cannot deduce public interface of `{module}`: {reason}")]
    InterfaceDeduction { module: String, reason: String },

    /// No static data is recorded for the requested version.
    #[error("no {table} data recorded for version {version}")]
    UnknownVersion {
        table: &'static str,
        version: HostVersion,
    },

    /// A computed name cannot be bound in the destination namespace.
    #[error("`{name}` is not a bindable identifier")]
    InvalidIdentifier { name: String },

    /// A strict lookup named a module the registry does not know.
    #[error("unknown module `{0}`")]
    UnknownModule(String),

    /// The default-scope form was invoked outside the top-level scope.
    #[error("{0}")]
    Misuse(String),

    #[error("malformed version `{0}` (expected `<major>.<minor>`)")]
    MalformedVersion(String),

    #[error("malformed {what}: {reason}")]
    MalformedData { what: String, reason: String },

    #[error("I/O error reading {path}: {error}")]
    Io {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error(transparent)]
    Probe(#[from] ProbeError),
}

/// Failures of a subordinate probe process.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to spawn `{program}`: {error}")]
    Spawn {
        program: String,
        error: std::io::Error,
    },

    #[error("`{program}` exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("`{program}` did not finish within {after:?}")]
    Timeout { program: String, after: Duration },

    #[error("`{program}` produced unusable output: {reason}")]
    Output { program: String, reason: String },

    #[error("bad probe argument `{arg}`: {reason}")]
    Argument { arg: String, reason: String },
}

/// Result type for aggregation operations.
pub type Result<T> = std::result::Result<T, Error>;
