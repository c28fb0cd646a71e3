use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a single engine operation.
///
/// Malformed rule lines never surface here; they become `LineDiagnostic`s.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Path does not exist: {0}")]
    MissingPath(PathBuf),
    #[error("Invalid config: {0}")]
    Config(String),
    #[error("Invalid game snapshot: {0}")]
    Snapshot(String),
    #[error("Rule cannot be written as {dialect}: {reason}")]
    Unrepresentable { dialect: String, reason: String },
    #[error("Operation cancelled")]
    Cancelled,
}

impl EngineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Engine error: {0}")]
    Engine(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Cancelled")]
    Cancelled,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<EngineError> for CommandError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::Cancelled => CommandError::Cancelled,
            EngineError::MissingPath(path) => CommandError::NotFound(path.display().to_string()),
            EngineError::Io { .. } => CommandError::Io(error.to_string()),
            other => CommandError::Engine(other.to_string()),
        }
    }
}

impl Serialize for CommandError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

#[cfg(test)]
#[path = "tests/errors_tests.rs"]
mod tests;
