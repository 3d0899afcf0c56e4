//! Error types for the faultline core library.

use std::path::PathBuf;

/// Top-level error enum for the faultline core library.
///
/// Only [`FaultlineError::RepoUnreadable`] is allowed to escape a
/// localization call; tool and HTTP failures are recovered inside the stage
/// that produced them.
#[derive(Debug, thiserror::Error)]
pub enum FaultlineError {
    #[error("Repository unreadable: {path}: {source}")]
    RepoUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(feature = "python")]
impl From<FaultlineError> for pyo3::PyErr {
    fn from(err: FaultlineError) -> pyo3::PyErr {
        use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
        match &err {
            FaultlineError::RepoUnreadable { .. } | FaultlineError::Io(_) => {
                PyIOError::new_err(err.to_string())
            }
            FaultlineError::InvalidInput(_) | FaultlineError::Json(_) => {
                PyValueError::new_err(err.to_string())
            }
            FaultlineError::Tool(_) | FaultlineError::Http(_) => {
                PyRuntimeError::new_err(err.to_string())
            }
        }
    }
}

pub type FaultlineResult<T> = Result<T, FaultlineError>;
