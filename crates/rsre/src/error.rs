use std::path::PathBuf;

use rhai::{EvalAltResult, ParseError};

/// Result type for host operations.
pub type Result<T> = std::result::Result<T, HostError>;

/// Errors surfaced to callers of the script host.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The script failed to parse.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// The script failed at runtime.
    #[error("Runtime error: {0}")]
    Runtime(#[from] Box<EvalAltResult>),

    /// Reading a script or config file failed.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No global variable with this name exists.
    #[error("Variable not found: {0}")]
    UnknownVariable(String),

    /// The global variable is a constant and cannot be reassigned.
    #[error("Cannot assign to constant: {0}")]
    ConstantVariable(String),

    /// A value could not be converted between host and engine representations.
    #[error("Conversion failed: {0}")]
    Conversion(String),

    /// A request was submitted from the dispatch thread itself.
    #[error("Re-entrant submission from the dispatch thread")]
    Reentrant,

    /// The dispatch loop has stopped and no longer accepts requests.
    #[error("Script host has stopped")]
    Stopped,

    /// The submitted job panicked on the dispatch thread.
    #[error("Submitted job panicked")]
    Panicked,

    /// The dispatch thread could not be started.
    #[error("Failed to start dispatch thread: {0}")]
    Spawn(String),

    /// The configuration file is invalid.
    #[error("Failed to parse config: {0}")]
    Config(String),
}

impl HostError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HostError::Io {
            path: path.into(),
            source,
        }
    }
}
