//! # Stowage Core
//!
//! `stowage_core` provides the interoperability types between [`stowage_http`] (the
//! resumable-upload HTTP surface) and backend implementations such as
//! [`stowage_backend_redis`].
//!
//! The central pieces are the per-upload job state machine in [`crate::job`] and the
//! [`crate::upload::UploadService`] trait that route handlers are generic over.
pub mod errors;
pub use errors::{Error, Result};

pub mod job;
pub use job::{JobRecord, JobState, SessionJob, UPLOAD_ACTION};

pub mod upload;
pub use upload::{
    job_source, nfc, object_path, ChunkUpload, CombineRequest, ConflictKind, ConflictRecord,
    JobType, PreUploadRequest, UploadData, UploadService, Zone,
};
