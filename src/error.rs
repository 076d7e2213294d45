use std::path::PathBuf;

use thiserror::Error;

pub type TcResult<T> = Result<T, TcError>;

#[derive(Debug, Error)]
pub enum TcError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("json failure: {0}")]
    Json(#[from] serde_json::Error),

    #[error("workspace failure at `{path}`: {detail}")]
    Workspace { path: PathBuf, detail: String },

    #[error("record does not conform to schema: {0}")]
    Encoding(String),

    #[error("corrupt container `{path}`: {detail}")]
    CorruptContainer { path: PathBuf, detail: String },

    #[error("missing job controller `{command}`")]
    ControllerMissing { command: String },

    #[error("failed to launch `{command}`: {detail}")]
    Launch { command: String, detail: String },

    #[error("worker did not finish within {timeout_ms}ms: `{command}`")]
    WorkerTimeout { command: String, timeout_ms: u64 },

    #[error("missing expected artifact at `{0}`")]
    MissingArtifact(PathBuf),

    #[error("verification mismatch for key `{key}`: expected {}, worker reported {actual}",
        .expected.map_or_else(|| "no such word".to_owned(), |count| count.to_string()))]
    VerificationMismatch {
        key: String,
        expected: Option<u64>,
        actual: i64,
    },
}

impl TcError {
    pub(crate) fn workspace(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::Workspace {
            path: path.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::CorruptContainer {
            path: path.into(),
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn from_spawn_failure(command: String, source: &std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::ControllerMissing { command },
            _ => Self::Launch {
                command,
                detail: source.to_string(),
            },
        }
    }

    /// Stable, unique, machine-readable code for every variant.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "TC-IO",
            Self::Json(_) => "TC-JSON",
            Self::Workspace { .. } => "TC-WORKSPACE",
            Self::Encoding(_) => "TC-ENCODING",
            Self::CorruptContainer { .. } => "TC-CORRUPT",
            Self::ControllerMissing { .. } => "TC-CONTROLLER-MISSING",
            Self::Launch { .. } => "TC-LAUNCH",
            Self::WorkerTimeout { .. } => "TC-TIMEOUT",
            Self::MissingArtifact(_) => "TC-MISSING-ARTIFACT",
            Self::VerificationMismatch { .. } => "TC-VERIFY-MISMATCH",
        }
    }
}
