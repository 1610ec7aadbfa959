//! Session-boundary error type.
//!
//! Wraps [`splk_core::SplkError`] plus the IO/serialization failures that
//! only arise at `save`/`load`, following the teacher's `thiserror`
//! (library) split - `anyhow` is deliberately not used here since every
//! failure mode is already a named variant a caller can match on.

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Kernel(#[from] splk_core::SplkError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SessionError {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::Kernel(e) => e.kind(),
            SessionError::Io(_) => "io",
            SessionError::Serialization(_) => "serialization",
        }
    }
}
