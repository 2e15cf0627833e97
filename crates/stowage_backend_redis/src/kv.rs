//! Shared async Redis handle. Opened once at service start and cloned into every
//! store; `ConnectionManager` multiplexes and reconnects underneath.
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::Deserialize;

use super::errors::Result;

#[derive(Clone, Deserialize)]
pub struct RedisConfig {
    host: String,
    port: u16,
    #[serde(default)]
    db: i64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

impl RedisConfig {
    pub async fn new_kv(&self) -> Result<RedisKv> {
        let auth = match (&self.username, &self.password) {
            (Some(user), Some(password)) => format!("{user}:{password}@"),
            (None, Some(password)) => format!(":{password}@"),
            (Some(user), None) => format!("{user}@"),
            (None, None) => String::new(),
        };
        let url = format!("redis://{auth}{}:{}/{}", self.host, self.port, self.db);
        let client = redis::Client::open(url.as_str())?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!("redis connection initialized");
        Ok(RedisKv { conn })
    }
}

#[derive(Clone)]
pub struct RedisKv {
    conn: ConnectionManager,
}

impl RedisKv {
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    /// Write a batch of keys in one round trip.
    pub async fn set_many(&self, entries: &[(String, String)]) -> Result<()> {
        let mut pipe = redis::pipe();
        for (key, value) in entries {
            pipe.set(key, value).ignore();
        }
        let mut conn = self.conn.clone();
        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    /// Fetch every value whose key matches `{prefix}:*`. The prefix may itself contain
    /// `*` wildcard segments.
    // TODO: replace KEYS with an incremental SCAN once job records move off shared dbs
    pub async fn mget_by_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn.keys(format!("{prefix}:*")).await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let values: Vec<Option<String>> = conn.mget(&keys).await?;
        Ok(values.into_iter().flatten().collect())
    }
}
