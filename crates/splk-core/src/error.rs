//! Crate-wide error type.
//!
//! Library code always returns `Result<T, SplkError>` and never panics on
//! bad input; `unwrap`/`expect` are reserved for invariants this crate
//! itself establishes (e.g. a regex literal that must compile).

/// Stable machine-readable error kind, for callers that branch on error
/// category without matching on the full enum (e.g. across an FFI or MCP
/// boundary where the concrete variant isn't serialized).
pub type Result<T> = std::result::Result<T, SplkError>;

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SplkError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("resource limit exceeded: {resource} at {current}/{limit}")]
    ResourceLimit {
        resource: &'static str,
        current: usize,
        limit: usize,
    },

    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("version mismatch: export major {found} incompatible with {expected}")]
    VersionMismatch { expected: u64, found: u64 },

    #[error("kernel lock not acquired within timeout: suspected deadlock")]
    DeadlockSuspected,

    #[error("cold storage error: {0}")]
    ColdStorage(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SplkError {
    /// Stable string tag, suitable for metrics labels or serialized
    /// diagnostics that need to survive across a process boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            SplkError::Validation(_) => "validation",
            SplkError::ResourceLimit { .. } => "resource_limit",
            SplkError::Integrity(_) => "integrity",
            SplkError::VersionMismatch { .. } => "version_mismatch",
            SplkError::DeadlockSuspected => "deadlock_suspected",
            SplkError::ColdStorage(_) => "cold_storage",
            SplkError::Serialization(_) => "serialization",
        }
    }
}
