//! Folder-tree materialization in the metadata catalog.
//!
//! Given a file's relative path, every ancestor segment is resolved cache-first, then
//! against the catalog, and batch-created when missing. The cache is a hint only: an
//! entry that races an eviction just costs one redundant catalog round trip.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use stowage_core::Zone;
use uuid::Uuid;

use super::catalog::{CatalogClient, CatalogItem, ItemQuery};
use super::errors::{Error, Result};
use super::locks::{LockClient, WRITE_OPERATION};

const CACHE_CAPACITY: usize = 128;

/// Batch-create payload for one missing folder.
#[derive(Clone, Debug, Serialize)]
pub struct FolderItem {
    pub id: String,
    pub parent: Option<String>,
    pub parent_path: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub zone: i32,
    pub name: String,
    pub size: u64,
    pub owner: String,
    pub container_code: String,
    pub container_type: String,
    pub location_uri: String,
    pub version: String,
    pub tags: Vec<String>,
}

/// A resolved node in the folder chain.
#[derive(Clone, Debug)]
pub struct FolderNode {
    pub geid: String,
    pub name: String,
    pub exists: bool,
}

#[derive(Clone, Debug)]
struct CachedFolder {
    geid: String,
}

/// Process-local, capacity-bounded hint cache of known folders.
#[derive(Clone, Default)]
pub struct FolderCache {
    inner: Arc<Mutex<HashMap<String, CachedFolder>>>,
}

impl FolderCache {
    fn key(zone: Zone, project_code: &str, folder_relative_path: &str, name: &str) -> String {
        format!("{zone}/{project_code}/{folder_relative_path}/{name}")
    }

    fn get(&self, key: &str) -> Option<CachedFolder> {
        self.inner.lock().ok()?.get(key).cloned()
    }

    fn insert(&self, key: String, folder: CachedFolder) {
        if let Ok(mut cache) = self.inner.lock() {
            if cache.len() >= CACHE_CAPACITY {
                // arbitrary single-entry eviction
                if let Some(evicted) = cache.keys().next().cloned() {
                    cache.remove(&evicted);
                }
            }
            cache.insert(key, folder);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().map(|cache| cache.len()).unwrap_or(0)
    }
}

#[derive(Clone)]
pub struct FolderMaterializer {
    catalog: CatalogClient,
    locks: LockClient,
    cache: FolderCache,
    zone: Zone,
}

impl FolderMaterializer {
    pub fn new(catalog: CatalogClient, locks: LockClient, zone: Zone) -> Self {
        Self {
            catalog,
            locks,
            cache: FolderCache::default(),
            zone,
        }
    }

    /// Resolve the folder chain for `relative_path`, creating missing levels, and
    /// return the leaf node. `None` for files that sit directly at the project root.
    pub async fn materialize(
        &self,
        project_code: &str,
        relative_path: &str,
        operator: &str,
    ) -> Result<Option<FolderNode>> {
        let segments: Vec<&str> = if relative_path.is_empty() {
            Vec::new()
        } else {
            relative_path.split('/').collect()
        };

        let mut chain: Vec<FolderNode> = Vec::with_capacity(segments.len());
        let mut to_create: Vec<FolderItem> = Vec::new();

        for (level, name) in segments.iter().enumerate() {
            let folder_relative_path = segments[..level].join("/");
            let cache_key = FolderCache::key(self.zone, project_code, &folder_relative_path, name);

            if let Some(found) = self.cache.get(&cache_key) {
                chain.push(FolderNode {
                    geid: found.geid,
                    name: name.to_string(),
                    exists: true,
                });
                continue;
            }

            let node = match self
                .lookup(project_code, &folder_relative_path, name)
                .await?
            {
                Some(item) => FolderNode {
                    geid: item.id,
                    name: name.to_string(),
                    exists: true,
                },
                None => {
                    // name folders are provisioned with the project; only deeper
                    // levels may be created lazily
                    if level == 0 {
                        return Err(Error::Catalog(
                            "Cannot create folder directly under project node".to_string(),
                        ));
                    }
                    let parent = &chain[level - 1];
                    let geid = Uuid::new_v4().to_string();
                    to_create.push(FolderItem {
                        id: geid.clone(),
                        parent: Some(parent.geid.clone()),
                        parent_path: folder_relative_path.clone(),
                        item_type: "folder".to_string(),
                        zone: self.zone.catalog_code(),
                        name: name.to_string(),
                        size: 0,
                        owner: operator.to_string(),
                        container_code: project_code.to_string(),
                        container_type: "project".to_string(),
                        location_uri: String::new(),
                        version: String::new(),
                        tags: Vec::new(),
                    });
                    FolderNode {
                        geid,
                        name: name.to_string(),
                        exists: false,
                    }
                }
            };

            self.cache.insert(
                cache_key,
                CachedFolder {
                    geid: node.geid.clone(),
                },
            );
            chain.push(node);
        }

        if !to_create.is_empty() {
            self.create_locked(&to_create).await?;
            tracing::info!("created {} folder nodes", to_create.len());
        }

        Ok(chain.pop())
    }

    async fn lookup(
        &self,
        project_code: &str,
        folder_relative_path: &str,
        name: &str,
    ) -> Result<Option<CatalogItem>> {
        let query = ItemQuery {
            name,
            container_code: project_code,
            zone: self.zone,
            recursive: true,
            parent_path: if folder_relative_path.is_empty() {
                None
            } else {
                Some(folder_relative_path)
            },
        };
        Ok(self.catalog.search_items(&query).await?.into_iter().next())
    }

    /// Batch-create the missing folders under a bulk write lock. Lock contention
    /// propagates as-is (no locks were taken); any other failure releases the locks
    /// before propagating.
    async fn create_locked(&self, to_create: &[FolderItem]) -> Result<()> {
        let lock_keys: Vec<String> = to_create
            .iter()
            .map(|item| {
                format!(
                    "{}/{}/{}",
                    self.zone.bucket(&item.container_code),
                    item.parent_path,
                    item.name
                )
            })
            .collect();

        self.locks.bulk_lock(&lock_keys, WRITE_OPERATION).await?;
        let created = self.catalog.create_folders(to_create, self.zone).await;
        let unlocked = self.locks.bulk_unlock(&lock_keys, WRITE_OPERATION).await;
        created?;
        unlocked
    }
}
