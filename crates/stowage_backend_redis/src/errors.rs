use thiserror;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("stowage error: {0}")]
    Core(#[from] stowage_core::Error),

    #[error("objectstore error: {0}")]
    ObjectStore(#[from] stowage_objectstore::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("http client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("avro error: {0}")]
    Avro(#[from] apache_avro::Error),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    TokioJoinError(#[from] tokio::task::JoinError),

    #[error("error serializing record: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("metadata catalog error: {0}")]
    Catalog(String),

    #[error("activity schema must describe a record")]
    ActivitySchemaNotRecord,

    #[error("finalizer pool closed")]
    FinalizerPoolClosed,
}

impl From<Error> for stowage_core::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Core(e) => e,
            // credential exchange failures are client-visible, not server faults
            Error::ObjectStore(stowage_objectstore::Error::AWSSDKCredentialsError(e)) => {
                stowage_core::Error::Token(e.to_string())
            }
            _ => stowage_core::Error::Backend(format!("{}", e)),
        }
    }
}
