//! Client for the metadata catalog's item endpoints.
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use stowage_core::Zone;

use super::errors::{Error, Result};
use super::folders::FolderItem;

const BATCH_TIMEOUT: Duration = Duration::from_secs(10);

/// An item as the catalog reports it. Only the attributes the upload flow reads are
/// kept; unknown fields are ignored.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub parent_path: String,
    #[serde(default, rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub container_code: String,
    #[serde(default)]
    pub container_type: String,
    #[serde(default)]
    pub zone: i32,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<CatalogItem>,
}

/// Parameters of an `items/search` call. Archived items are always excluded.
pub struct ItemQuery<'a> {
    pub name: &'a str,
    pub container_code: &'a str,
    pub zone: Zone,
    pub recursive: bool,
    pub parent_path: Option<&'a str>,
}

#[derive(Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base: String,
}

impl CatalogClient {
    pub fn new(metadata_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: metadata_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn search_items(&self, query: &ItemQuery<'_>) -> Result<Vec<CatalogItem>> {
        let url = format!("{}/v1/items/search/", self.base);
        let mut params = vec![
            ("name", query.name.to_string()),
            ("container_code", query.container_code.to_string()),
            ("archived", "false".to_string()),
            ("zone", query.zone.catalog_code().to_string()),
            ("recursive", query.recursive.to_string()),
        ];
        if let Some(parent_path) = query.parent_path {
            params.push(("parent_path", parent_path.to_string()));
        }
        let response = self.http.get(url).query(&params).send().await?;
        Ok(response.json::<SearchResponse>().await?.result)
    }

    /// Batch-create folder items. The catalog either creates the whole batch or
    /// nothing.
    pub async fn create_folders(&self, items: &[FolderItem], zone: Zone) -> Result<()> {
        let url = format!("{}/v1/items/batch/", self.base);
        let response = self
            .http
            .post(url)
            .json(&json!({
                "items": items,
                "zone": zone.catalog_code(),
                "link_container": false,
            }))
            .timeout(BATCH_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Catalog(format!(
                "failed to create folder items: {}",
                response.status()
            )));
        }
        Ok(())
    }
}
