//! Error types for the host boundary and configuration loading.

use std::path::PathBuf;

/// Errors a host primitive can throw.
///
/// Hooks never produce these on their own account: a variant only reaches a
/// caller when the wrapped original primitive raised it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HostError {
    #[error("TypeError: {0}")]
    Type(String),
    #[error("TypeError: cannot assign to property '{0}' of a frozen object")]
    Frozen(String),
    #[error("TypeError: converting circular structure to JSON")]
    Circular,
    #[error("SyntaxError: {0}")]
    Syntax(String),
    #[error("host object lock poisoned")]
    Poisoned,
    #[error("rejected: {0}")]
    Rejected(String),
}

/// Result alias used across the host boundary.
pub type HostResult<T> = Result<T, HostError>;

/// Configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config value: {0}")]
    Invalid(String),
}
