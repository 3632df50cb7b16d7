//! Object-store port for VOD artifacts: prefix purge and pre-signed URLs.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};

use crate::error::{AppError, Result};

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Deletes every object under the prefix; returns the number removed.
    /// A prefix with no objects is a successful no-op.
    async fn delete_prefix(&self, bucket: &str, prefix: &str) -> Result<usize>;

    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> Result<String>;

    async fn presign_get(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String>;
}

pub struct S3ObjectStorage {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStorage {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }

    pub async fn from_env() -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(aws_sdk_s3::Client::new(&config))
    }
}

fn upstream(err: impl std::fmt::Display) -> AppError {
    AppError::Upstream(format!("object store: {err}"))
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    async fn delete_prefix(&self, bucket: &str, prefix: &str) -> Result<usize> {
        let mut removed = 0usize;
        let mut continuation: Option<String> = None;
        loop {
            let listed = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.clone())
                .send()
                .await
                .map_err(upstream)?;

            let keys: Vec<String> = listed
                .contents()
                .iter()
                .filter_map(|object| object.key().map(str::to_string))
                .collect();

            if !keys.is_empty() {
                let identifiers = keys
                    .iter()
                    .map(|key| ObjectIdentifier::builder().key(key).build())
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(upstream)?;
                let delete = Delete::builder()
                    .set_objects(Some(identifiers))
                    .build()
                    .map_err(upstream)?;
                self.client
                    .delete_objects()
                    .bucket(bucket)
                    .delete(delete)
                    .send()
                    .await
                    .map_err(upstream)?;
                removed += keys.len();
            }

            continuation = listed.next_continuation_token().map(str::to_string);
            if continuation.is_none() {
                break;
            }
        }
        Ok(removed)
    }

    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> Result<String> {
        let config = PresigningConfig::expires_in(ttl).map_err(upstream)?;
        let request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .presigned(config)
            .await
            .map_err(upstream)?;
        Ok(request.uri().to_string())
    }

    async fn presign_get(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String> {
        let config = PresigningConfig::expires_in(ttl).map_err(upstream)?;
        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(upstream)?;
        Ok(request.uri().to_string())
    }
}
