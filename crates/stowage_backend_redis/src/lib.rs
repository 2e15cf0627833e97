//! Backend implementation of [`stowage_core::UploadService`] backed by a Redis job
//! store and part ledger, an S3-compatible object store, and the platform's lock,
//! metadata, project and dataops HTTP services.
mod activity;
mod archive;
mod catalog;
mod config;
mod coordinator;
mod dataops;
mod errors;
mod finalizer;
mod folders;
mod jobs;
mod kv;
mod locks;
mod parts;
mod projects;

pub use activity::KafkaConfig;
pub use config::{RedisBackendConfig, ServiceEndpoints};
pub use coordinator::RedisUploadService;
pub use errors::{Error, Result};
pub use kv::RedisConfig;
