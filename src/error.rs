use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReannotateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Could not find {stage} script '{}'. Pass its location or set {env_var}", path.display())]
    ToolNotFound {
        stage: &'static str,
        path: PathBuf,
        env_var: &'static str,
    },

    #[error("{stage} command failed: {command} (status={status:?}, stderr='{}')", stderr.trim())]
    CollaboratorFailed {
        stage: &'static str,
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("Invalid table '{}': {message}", path.display())]
    InvalidTable { path: PathBuf, message: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ReannotateError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn invalid_table(path: &Path, message: impl Into<String>) -> Self {
        Self::InvalidTable {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

/// Attaches a path-bearing message to a raw I/O error.
pub(crate) trait IoContext<T> {
    fn with_path(self, action: &str, path: &Path) -> ReannotateResult<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn with_path(self, action: &str, path: &Path) -> ReannotateResult<T> {
        self.map_err(|e| ReannotateError::io(format!("Could not {action} '{}'", path.display()), e))
    }
}

pub type ReannotateResult<T> = Result<T, ReannotateError>;
