//! Per-upload part ledger.
//!
//! Chunk requests for one upload may land concurrently and in any order; each part is
//! recorded under the unique key `{upload_id}:{part_number}` (an idempotent
//! overwrite), and ordering is only asserted at finalize time by sorting on the part
//! number.
use stowage_objectstore::Part;

use super::errors::Result;
use super::kv::RedisKv;

#[derive(Clone)]
pub struct PartLedger {
    kv: RedisKv,
}

impl PartLedger {
    pub fn new(kv: RedisKv) -> Self {
        Self { kv }
    }

    pub async fn record(&self, upload_id: &str, part: &Part) -> Result<()> {
        let key = format!("{}:{}", upload_id, part.part_number);
        self.kv.set(&key, &serde_json::to_string(part)?).await
    }

    /// All recorded parts for the upload, ascending by part number.
    pub async fn sorted_parts(&self, upload_id: &str) -> Result<Vec<Part>> {
        let parts = self
            .kv
            .mget_by_prefix(upload_id)
            .await?
            .iter()
            .map(|value| Ok(serde_json::from_str(value)?))
            .collect::<Result<Vec<Part>>>()?;
        Ok(order_parts(parts))
    }
}

pub(crate) fn order_parts(mut parts: Vec<Part>) -> Vec<Part> {
    parts.sort_by_key(|part| part.part_number);
    parts
}
