//! Activity-log publication.
//!
//! Every finished upload emits one Avro-encoded `upload` activity message for
//! downstream consumers. The schema is loaded once at service start from the
//! configured path.
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use apache_avro::types::{Record, Value as AvroValue};
use apache_avro::Schema;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use serde::Deserialize;

use super::catalog::CatalogItem;
use super::errors::{Error, Result};

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Deserialize)]
pub struct KafkaConfig {
    pub url: String,
    pub topic: String,
    pub schema_path: PathBuf,
}

impl KafkaConfig {
    pub fn new_publisher(&self) -> Result<ActivityLogPublisher> {
        let raw_schema = std::fs::read_to_string(&self.schema_path)?;
        let schema = Schema::parse_str(&raw_schema)?;
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &self.url)
            .create()?;
        Ok(ActivityLogPublisher {
            producer,
            schema: Arc::new(schema),
            topic: self.topic.clone(),
        })
    }
}

#[derive(Clone)]
pub struct ActivityLogPublisher {
    producer: FutureProducer,
    schema: Arc<Schema>,
    topic: String,
}

impl ActivityLogPublisher {
    pub async fn publish_upload(&self, item: &CatalogItem, operator: &str) -> Result<()> {
        let payload = encode_upload(&self.schema, item, operator)?;
        self.producer
            .send(
                FutureRecord::to(&self.topic)
                    .key(item.id.as_str())
                    .payload(&payload),
                Timeout::After(SEND_TIMEOUT),
            )
            .await
            .map_err(|(e, _)| Error::Kafka(e))?;
        tracing::debug!("published upload activity for item {}", item.id);
        Ok(())
    }
}

fn encode_upload(schema: &Schema, item: &CatalogItem, operator: &str) -> Result<Vec<u8>> {
    let mut record = Record::new(schema).ok_or(Error::ActivitySchemaNotRecord)?;
    record.put("activity_type", "upload");
    record.put(
        "activity_time",
        AvroValue::TimestampMillis(chrono::Utc::now().timestamp_millis()),
    );
    record.put("item_id", item.id.as_str());
    record.put("item_type", item.item_type.as_str());
    record.put("item_name", item.name.as_str());
    record.put("item_parent_path", item.parent_path.as_str());
    record.put("container_code", item.container_code.as_str());
    record.put("container_type", item.container_type.as_str());
    record.put("zone", item.zone);
    record.put("user", operator);
    record.put("imported_from", "");
    record.put("changes", AvroValue::Array(Vec::new()));
    Ok(apache_avro::to_avro_datum(schema, record)?)
}
