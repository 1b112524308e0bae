//! S3-compatible store (Cloudflare R2, MinIO, AWS S3)

use async_trait::async_trait;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_smithy_http_client::Builder as SmithyHttpClientBuilder;
use prism_config::{StoreCredentials, StoreSettings};
use prism_core::error::PrismError;
use prism_core::types::ObjectRecord;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::traits::{BlobStore, ListPage, Metadata};
use crate::StoreResult;

/// Cached artifacts never change under a given key
const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Object store speaking the S3 API
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    endpoint: String,
    page_size: i32,
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store")
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl S3Store {
    /// Build a client from validated credentials.
    ///
    /// Plain `http://` endpoints get an HTTP-only connector so local
    /// emulators work without TLS roots.
    pub fn new(credentials: &StoreCredentials, settings: &StoreSettings) -> Self {
        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(credentials.region.clone()))
            .endpoint_url(credentials.endpoint.clone())
            .credentials_provider(Credentials::new(
                credentials.access_key_id.clone(),
                credentials.secret_access_key.clone(),
                None,
                None,
                "prism-config",
            ))
            .retry_config(RetryConfig::standard().with_max_attempts(settings.max_attempts.max(1)));

        if credentials.endpoint.to_ascii_lowercase().starts_with("http://") {
            builder = builder.http_client(SmithyHttpClientBuilder::new().build_http());
        }

        if settings.force_path_style {
            builder = builder.force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: credentials.bucket.clone(),
            endpoint: credentials.endpoint.clone(),
            page_size: settings.page_size,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// True when the service answered with a plain 404
fn is_not_found<E>(err: &SdkError<E>) -> bool {
    match err {
        SdkError::ServiceError(service_err) => service_err.raw().status().as_u16() == 404,
        _ => false,
    }
}

/// S3 metadata travels as HTTP headers, so values must be visible ASCII
fn header_safe(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch.is_ascii_graphic() || ch == ' ' {
            out.push(ch);
        } else {
            let mut buf = [0u8; 4];
            for byte in ch.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    out
}

#[async_trait]
impl BlobStore for S3Store {
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn list(&self, prefix: &str, continuation: Option<&str>) -> StoreResult<ListPage> {
        let mut request = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(self.page_size);
        if !prefix.is_empty() {
            request = request.prefix(prefix);
        }
        if let Some(token) = continuation {
            request = request.continuation_token(token);
        }

        let output = request
            .send()
            .await
            .map_err(|e| PrismError::store(format!("list {} failed", prefix), e))?;

        let records: Vec<ObjectRecord> = output
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?;
                let size = object.size().unwrap_or(0).max(0) as u64;
                Some(ObjectRecord::new(key, size).with_etag(object.e_tag()))
            })
            .collect();

        let next_token = if output.is_truncated() == Some(true) {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        debug!(count = records.len(), more = next_token.is_some(), "Listed page");
        Ok(ListPage { records, next_token })
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                if is_not_found(&err) {
                    return Ok(false);
                }
                Err(PrismError::store(format!("head {} failed", key), err))
            }
        }
    }

    #[instrument(skip(self, data, metadata), fields(bucket = %self.bucket, size = data.len()))]
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        metadata: &Metadata,
    ) -> StoreResult<()> {
        let headers: HashMap<String, String> = metadata
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), header_safe(value)))
            .collect();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data.to_vec()))
            .content_type(content_type)
            .cache_control(IMMUTABLE_CACHE_CONTROL)
            .set_metadata(Some(headers))
            .send()
            .await
            .map_err(|e| PrismError::store(format!("put {} failed", key), e))?;

        debug!("Uploaded object");
        Ok(())
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn presign(&self, key: &str, ttl: Duration) -> StoreResult<String> {
        let config = PresigningConfig::expires_in(ttl)
            .map_err(|e| PrismError::invalid("presign_expires_seconds", e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| PrismError::store(format!("presign {} failed", key), e))?;

        Ok(request.uri().to_string())
    }
}
