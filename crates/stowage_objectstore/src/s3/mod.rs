use std::path::Path;

use async_trait::async_trait;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use bytes::Bytes;
use http::Uri;
use serde::Deserialize;

use super::errors::{Error, Result};
use super::ObjectStore;
use super::Part;

#[derive(Clone, Deserialize)]
pub struct S3Config {
    secret_key: String,
    access_key: String,
    endpoint: String,
    #[serde(default)]
    https: bool,
    region: String,
}

impl S3Config {
    pub async fn new_objects(&self) -> Result<S3> {
        let scp = SharedCredentialsProvider::new(
            Credentials::new(
                self.access_key.clone(),
                self.secret_key.clone(),
                None,
                None,
                "stowage",
            )
            .provide_credentials()
            .await?,
        );

        let uri = Uri::builder()
            .scheme(if self.https { "https" } else { "http" })
            .authority(self.endpoint.as_str())
            .path_and_query("/")
            .build()?;

        let sdk_config = aws_config::load_from_env().await;

        let config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .region(Region::new(self.region.clone()))
            .credentials_provider(scp)
            .endpoint_url(uri.to_string())
            .force_path_style(true)
            .build();

        let s3_client = aws_sdk_s3::Client::from_conf(config);

        Ok(S3 { client: s3_client })
    }
}

#[derive(Clone)]
pub struct S3 {
    client: Client,
}

#[async_trait]
impl ObjectStore for S3 {
    async fn prepare_multipart_upload(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> Result<Vec<String>> {
        let mut upload_ids = Vec::with_capacity(keys.len());
        for key in keys {
            let create_multipart_upload_output = self
                .client
                .create_multipart_upload()
                .key(key)
                .bucket(bucket)
                .send()
                .await?;

            let upload_id = create_multipart_upload_output
                .upload_id
                .ok_or_else(|| Error::MissingUploadId(key.clone()))?;
            upload_ids.push(upload_id);
        }
        tracing::debug!("reserved {} multipart upload ids", upload_ids.len());

        Ok(upload_ids)
    }

    async fn part_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> Result<Part> {
        let content_length = data.len();
        let upload_part_output = self
            .client
            .upload_part()
            .upload_id(upload_id)
            .part_number(part_number)
            .key(key)
            .body(ByteStream::from(data))
            .content_length(content_length as i64)
            .bucket(bucket)
            .send()
            .await?;

        Ok(Part {
            part_number,
            e_tag: upload_part_output.e_tag,
        })
    }

    async fn combine_chunks(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<Part>,
    ) -> Result<Option<String>> {
        let mut mpu = CompletedMultipartUpload::builder();
        for part in parts {
            let mut pb = CompletedPart::builder();
            if let Some(e_tag) = &part.e_tag {
                pb = pb.e_tag(e_tag);
            }
            mpu = mpu.parts(pb.part_number(part.part_number).build());
        }
        let complete_multipart_upload_output = self
            .client
            .complete_multipart_upload()
            .multipart_upload(mpu.build())
            .upload_id(upload_id)
            .key(key)
            .bucket(bucket)
            .send()
            .await?;

        Ok(complete_multipart_upload_output.version_id)
    }

    async fn download_object(&self, bucket: &str, key: &str, dest: &Path) -> Result<()> {
        let get_object_output = self
            .client
            .get_object()
            .key(key)
            .bucket(bucket)
            .send()
            .await?;

        let data = get_object_output.body.collect().await?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, data.into_bytes()).await?;
        Ok(())
    }
}
