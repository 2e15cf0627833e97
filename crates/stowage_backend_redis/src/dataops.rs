//! Client for the dataops service: file-entity registration and archive previews.
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::catalog::CatalogItem;
use super::errors::{Error, Result};

const DATAOPS_TIMEOUT: Duration = Duration::from_secs(3600);

/// Attributes of a newly uploaded file, posted to `filedata/` once the chunks have
/// been combined.
#[derive(Clone, Debug, Serialize)]
pub struct FileDataForm {
    pub uploader: String,
    pub file_name: String,
    pub path: String,
    pub file_size: f64,
    pub description: String,
    pub namespace: String,
    pub project_code: String,
    pub labels: Vec<String>,
    pub parent_folder_geid: String,
    pub bucket: String,
    pub minio_object_path: String,
    pub version_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_pipeline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_query: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct CreateResponse {
    result: CatalogItem,
}

#[derive(Clone)]
pub struct DataopsClient {
    http: reqwest::Client,
    base: String,
}

impl DataopsClient {
    pub fn new(dataops_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: dataops_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn create_file(&self, form: &FileDataForm) -> Result<CatalogItem> {
        let url = format!("{}/v1/filedata/", self.base);
        let response = self
            .http
            .post(url)
            .json(form)
            .timeout(DATAOPS_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Catalog(format!(
                "failed to create file entity: {}",
                response.status()
            )));
        }
        Ok(response.json::<CreateResponse>().await?.result)
    }

    /// Attach the directory-structure preview of an uploaded archive to its file
    /// entity.
    pub async fn save_archive_preview(
        &self,
        file_id: &str,
        archive_preview: &serde_json::Value,
    ) -> Result<()> {
        let url = format!("{}/v1/archive", self.base);
        self.http
            .post(url)
            .json(&json!({
                "archive_preview": archive_preview,
                "file_id": file_id,
            }))
            .timeout(DATAOPS_TIMEOUT)
            .send()
            .await?;
        Ok(())
    }
}
