//! Provides a simple abstraction over object storage services.
//!
//! Primarily intended for use by backend implementations of the traits in
//! [`stowage_core`]. The interface is shaped around server-side multipart assembly:
//! uploads are reserved in batches, parts are proxied through as they arrive, and the
//! final combine happens inside the store.
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub mod config;
pub mod errors;
pub(crate) mod s3;

#[doc(hidden)]
pub use config::Config;
#[doc(hidden)]
pub use errors::{Error, Result};
pub use s3::{S3Config, S3};

/// One uploaded part of a multipart upload: the 1-based part number plus the opaque
/// tag the store handed back. Serialized exactly as the store reports it so ledger
/// entries can be replayed into the final combine call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(rename = "PartNumber")]
    pub part_number: i32,
    #[serde(rename = "ETag")]
    pub e_tag: Option<String>,
}

/// Common interface for the object-store operations the upload flow needs.
///
/// Buckets are passed per call because every project maps to its own bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Reserve a multipart upload id for every key in the batch, in order.
    async fn prepare_multipart_upload(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> Result<Vec<String>>;

    /// Upload one part of an in-progress multipart upload.
    async fn part_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> Result<Part>;

    /// Combine the uploaded parts server-side and return the resulting version id,
    /// if the bucket is versioned.
    async fn combine_chunks(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<Part>,
    ) -> Result<Option<String>>;

    /// Download an object to a local path, creating parent directories as needed.
    async fn download_object(&self, bucket: &str, key: &str, dest: &Path) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // validate object safety
    #[allow(dead_code)]
    struct Whatever {
        objectstore: Box<dyn ObjectStore>,
    }

    #[test]
    fn part_serializes_in_store_form() {
        let part = Part {
            part_number: 3,
            e_tag: Some("\"abc\"".to_string()),
        };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"PartNumber": 3, "ETag": "\"abc\""})
        );
        let back: Part = serde_json::from_value(json).unwrap();
        assert_eq!(back, part);
    }
}
