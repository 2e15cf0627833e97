use serde::Deserialize;

use stowage_backend_redis::RedisBackendConfig;

fn default_app_name() -> String {
    "stowage".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5079
}

#[derive(Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub backend: UploadBackend,
}

#[derive(Clone, Deserialize)]
#[serde(tag = "type")]
pub enum UploadBackend {
    Redis(RedisBackendConfig),
}
