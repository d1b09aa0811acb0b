//! Sink backed by AWS S3 (or any S3-compatible store such as MinIO).
//!
//! Credentials come from the default AWS chain: environment variables,
//! `~/.aws/credentials`, or an instance role. A custom endpoint switches the
//! client to path-style addressing.

use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

use crate::storage::{IngestionSink, StorageError};

#[derive(Clone, Debug)]
pub struct S3Sink {
    client: S3Client,
}

impl S3Sink {
    pub async fn new(region: Option<String>, endpoint_url: Option<String>) -> Self {
        let mut config_loader = defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            config_loader = config_loader.region(Region::new(region));
        }
        let sdk_config = config_loader.load().await;

        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(url) = endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(url).force_path_style(true);
        }

        Self {
            client: S3Client::from_conf(s3_config_builder.build()),
        }
    }
}

#[async_trait]
impl IngestionSink for S3Sink {
    async fn upload(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type("application/x-ndjson")
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(StorageError::s3)?;
        Ok(())
    }

    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(StorageError::s3)?;

            keys.extend(
                resp.contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            match resp.next_continuation_token() {
                Some(token) if resp.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn has_objects(&self, bucket: &str, prefix: &str) -> Result<bool, StorageError> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .max_keys(1)
            .send()
            .await
            .map_err(StorageError::s3)?;
        Ok(!resp.contents().is_empty())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let resp = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(resp) => resp,
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                if service_err.is_no_such_key() {
                    return Ok(None);
                }
                tracing::debug!(error = %service_err, bucket, key, "S3 GetObject failed");
                return Err(StorageError::s3(service_err));
            }
        };

        let body = resp.body.collect().await.map_err(StorageError::s3)?;
        Ok(Some(body.into_bytes().to_vec()))
    }
}
