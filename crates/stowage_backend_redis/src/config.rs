use std::path::PathBuf;

use serde::Deserialize;

use stowage_core::Zone;

use super::coordinator::RedisUploadService;
use super::errors::Result;
use super::kv::RedisConfig;

pub use super::activity::KafkaConfig;

#[derive(Clone, Deserialize)]
pub struct ServiceEndpoints {
    pub metadata: String,
    pub dataops: String,
    pub project: String,
}

fn default_finalizer_slots() -> usize {
    8
}

/// Backend configuration: one section per collaborator, each with its own
/// constructor for the live client.
#[derive(Clone, Deserialize)]
pub struct RedisBackendConfig {
    pub zone: Zone,
    pub root_path: PathBuf,
    pub services: ServiceEndpoints,
    pub redis: RedisConfig,
    pub objectstore: stowage_objectstore::Config,
    pub kafka: KafkaConfig,
    #[serde(default = "default_finalizer_slots")]
    pub finalizer_slots: usize,
}

impl RedisBackendConfig {
    pub async fn new_service(&self) -> Result<RedisUploadService> {
        let kv = self.redis.new_kv().await?;
        let objects = self.objectstore.new_objects().await?;
        let activity = self.kafka.new_publisher()?;
        Ok(RedisUploadService::new(self, kv, objects, activity))
    }
}
