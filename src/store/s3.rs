//! S3-compatible backend built on aws-sdk-s3.
//!
//! Mutating calls carry a content-md5 checksum and go through a bounded
//! retry with exponential delay. Read calls are single-shot; the SDK's own
//! transport retry still applies underneath.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::sleep;

use crate::store::client::{BoxError, ListPage, ObjectBackend, ObjectMeta};

/// S3 backend configuration.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Region name; falls back to the SDK's default provider chain.
    pub region: Option<String>,
    /// Custom endpoint, e.g. for MinIO or a GCS interoperability endpoint.
    pub endpoint_url: Option<String>,
    /// Retry attempts for mutating calls.
    pub max_retries: u32,
    /// Initial retry delay in milliseconds, doubled per attempt.
    pub initial_retry_delay_ms: u64,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: None,
            endpoint_url: None,
            max_retries: 3,
            initial_retry_delay_ms: 100,
        }
    }
}

pub struct S3Backend {
    client: Client,
    bucket: String,
    config: S3Config,
}

impl S3Backend {
    pub async fn new(bucket: impl Into<String>, config: S3Config) -> Result<Self, BoxError> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(
                aws_config::environment::EnvironmentVariableCredentialsProvider::new(),
            );
        if let Some(region) = config.region.clone() {
            loader = loader.region(aws_config::Region::new(region));
        }
        if let Some(endpoint) = config.endpoint_url.clone() {
            loader = loader.endpoint_url(endpoint);
        }
        let conf = loader.load().await;
        Ok(Self {
            client: Client::new(&conf),
            bucket: bucket.into(),
            config,
        })
    }

    /// Wraps an existing SDK client, e.g. one with custom credentials.
    pub fn from_client(client: Client, bucket: impl Into<String>, config: S3Config) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            config,
        }
    }

    fn md5_base64(data: &[u8]) -> String {
        let sum = md5::compute(data);
        B64.encode(sum.0)
    }

    fn to_system_time(dt: &aws_sdk_s3::primitives::DateTime) -> Option<SystemTime> {
        u64::try_from(dt.secs())
            .ok()
            .map(|secs| UNIX_EPOCH + Duration::new(secs, dt.subsec_nanos()))
    }

    async fn execute_with_retry<T, F, Fut, E>(
        &self,
        operation: F,
        operation_name: &'static str,
    ) -> Result<T, BoxError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        let mut attempt = 0;
        let max_retries = self.config.max_retries;
        loop {
            attempt += 1;
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if attempt > max_retries {
                        return Err(Box::new(std::io::Error::other(format!(
                            "{operation_name} failed after {max_retries} attempts: {e}"
                        ))));
                    }
                    let delay_ms = self.config.initial_retry_delay_ms * 2u64.pow(attempt - 1);
                    sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectBackend for S3Backend {
    async fn head_object(&self, key: &str) -> Result<Option<ObjectMeta>, BoxError> {
        let resp = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;
        match resp {
            Ok(o) => Ok(Some(ObjectMeta {
                key: key.to_string(),
                size: o.content_length().unwrap_or(0).max(0) as u64,
                last_modified: o.last_modified().and_then(Self::to_system_time),
                content_type: o.content_type().map(String::from),
            })),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, BoxError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;
        match resp {
            Ok(o) => {
                let body = o.body.collect().await?;
                Ok(Some(body.into_bytes().to_vec()))
            }
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    async fn put_object(
        &self,
        key: &str,
        data: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), BoxError> {
        let checksum = Self::md5_base64(data);
        self.execute_with_retry(
            || async {
                self.client
                    .put_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .body(data.to_owned().into())
                    .content_md5(checksum.clone())
                    .set_content_type(content_type.map(String::from))
                    .send()
                    .await
            },
            "put_object",
        )
        .await?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<bool, BoxError> {
        // S3 deletes are silent for absent keys; head first to report one.
        let existed = self.head_object(key).await?.is_some();
        self.execute_with_retry(
            || async {
                self.client
                    .delete_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .send()
                    .await
            },
            "delete_object",
        )
        .await?;
        Ok(existed)
    }

    async fn copy_object(&self, src_key: &str, dst_key: &str) -> Result<(), BoxError> {
        let source = format!("{}/{}", self.bucket, src_key);
        self.execute_with_retry(
            || async {
                self.client
                    .copy_object()
                    .bucket(&self.bucket)
                    .copy_source(source.clone())
                    .key(dst_key)
                    .send()
                    .await
            },
            "copy_object",
        )
        .await?;
        Ok(())
    }

    async fn list_page(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        token: Option<&str>,
        max_keys: Option<i32>,
    ) -> Result<ListPage, BoxError> {
        let resp = self
            .execute_with_retry(
                || async {
                    let mut req = self
                        .client
                        .list_objects_v2()
                        .bucket(&self.bucket)
                        .prefix(prefix);
                    if let Some(d) = delimiter {
                        req = req.delimiter(d);
                    }
                    if let Some(t) = token {
                        req = req.continuation_token(t);
                    }
                    if let Some(n) = max_keys {
                        req = req.max_keys(n);
                    }
                    req.send().await
                },
                "list_objects_v2",
            )
            .await?;

        let keys = resp
            .contents()
            .iter()
            .map(|o| ObjectMeta {
                key: o.key().unwrap_or_default().to_string(),
                size: o.size().unwrap_or(0).max(0) as u64,
                last_modified: o.last_modified().and_then(Self::to_system_time),
                content_type: None,
            })
            .collect();
        let common_prefixes = resp
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(String::from))
            .collect();
        Ok(ListPage {
            keys,
            common_prefixes,
            next_token: resp.next_continuation_token().map(String::from),
        })
    }
}
