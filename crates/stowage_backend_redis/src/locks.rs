//! Client for the platform lock service.
//!
//! Write locks serialize operations on a single logical file; the lock taken at
//! pre-upload time is only released by the finalizer. Any non-200 answer from the
//! lock service is surfaced as contention.
use std::time::Duration;

use reqwest::Method;
use serde_json::json;
use stowage_core::Error as CoreError;

use super::errors::{Error, Result};

const LOCK_TIMEOUT: Duration = Duration::from_secs(3600);

pub const WRITE_OPERATION: &str = "write";

#[derive(Clone)]
pub struct LockClient {
    http: reqwest::Client,
    base: String,
}

impl LockClient {
    pub fn new(dataops_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: dataops_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn lock(&self, resource_key: &str, operation: &str) -> Result<()> {
        self.single(Method::POST, resource_key, operation).await
    }

    pub async fn unlock(&self, resource_key: &str, operation: &str) -> Result<()> {
        self.single(Method::DELETE, resource_key, operation).await
    }

    pub async fn bulk_lock(&self, resource_keys: &[String], operation: &str) -> Result<()> {
        self.bulk(Method::POST, resource_keys, operation).await
    }

    pub async fn bulk_unlock(&self, resource_keys: &[String], operation: &str) -> Result<()> {
        self.bulk(Method::DELETE, resource_keys, operation).await
    }

    async fn single(&self, method: Method, resource_key: &str, operation: &str) -> Result<()> {
        let url = format!("{}/v2/resource/lock/", self.base);
        let response = self
            .http
            .request(method, url)
            .json(&json!({"resource_key": resource_key, "operation": operation}))
            .timeout(LOCK_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Core(CoreError::ResourceLocked(
                resource_key.to_string(),
            )));
        }
        Ok(())
    }

    async fn bulk(&self, method: Method, resource_keys: &[String], operation: &str) -> Result<()> {
        let url = format!("{}/v2/resource/lock/bulk", self.base);
        let response = self
            .http
            .request(method, url)
            .json(&json!({"resource_keys": resource_keys, "operation": operation}))
            .timeout(LOCK_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Core(CoreError::ResourceLocked(
                resource_keys.join(", "),
            )));
        }
        Ok(())
    }
}
