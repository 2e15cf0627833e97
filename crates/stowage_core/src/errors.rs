use thiserror;

use crate::job::JobState;
use crate::upload::{ConflictKind, ConflictRecord};

pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the HTTP surface and backend implementations.
///
/// Backend error enums are expected to flatten their unmapped variants into
/// [`Error::Backend`] while preserving the variants below, which carry an HTTP
/// status mapping in `stowage_http`.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid job type: {0}")]
    InvalidJobType(String),

    #[error("Project {0} does not exist")]
    ProjectNotFound(String),

    /// Name collisions detected at pre-upload time. The records are surfaced to
    /// the client as `result.failed`.
    #[error("conflicting {kind} paths")]
    Conflict {
        kind: ConflictKind,
        failed: Vec<ConflictRecord>,
    },

    #[error("resource {0} already in used")]
    ResourceLocked(String),

    #[error("token error: {0}")]
    Token(String),

    #[error("Job ID {0} not found")]
    JobNotFound(String),

    /// A job was asked to persist before `job_id` or `source` were assigned.
    #[error("job {0} not provided")]
    PreconditionMissing(&'static str),

    #[error("illegal job transition: {from} -> {to}")]
    IllegalTransition { from: JobState, to: JobState },

    #[error("job {job_id} cannot be combined from status {status}")]
    CombineNotAllowed { job_id: String, status: JobState },

    #[error("backend error: {0}")]
    Backend(String),
}
