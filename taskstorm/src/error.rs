use std::path::PathBuf;

/// Errors that stop a run. Per-invocation failures are never reported here;
/// they are recorded as failed [`crate::InvocationOutcome`]s instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("subject executable not found: {}", program.display())]
    SubjectMissing { program: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
