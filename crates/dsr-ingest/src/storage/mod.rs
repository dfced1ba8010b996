//! Object store access
//!
//! The pipeline only needs two things from the bucket: the list of metadata
//! document keys and the bytes behind one key. Both are traits so the
//! pipeline can run against S3 in production and an in-memory bucket in
//! tests.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{config::Credentials, Client};
use tracing::{debug, info, instrument};

use crate::error::{IngestError, IngestResult};
use crate::models::MetadataKey;

pub mod config;

pub use config::StorageConfig;

/// Enumerates candidate metadata documents
#[async_trait]
pub trait ObjectCatalog: Send + Sync {
    /// Human-readable location, used in logs and errors
    fn location(&self) -> &str;

    /// Every key in the catalog. A partial listing is an error, never a result.
    async fn list_keys(&self) -> IngestResult<Vec<MetadataKey>>;
}

/// Reads one object
#[async_trait]
pub trait ObjectSource: Send + Sync {
    async fn get_object(&self, key: &MetadataKey) -> IngestResult<Vec<u8>>;
}

/// S3 bucket holding the metadata documents
#[derive(Clone)]
pub struct S3Catalog {
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl S3Catalog {
    pub async fn new(config: StorageConfig) -> IngestResult<Self> {
        if config.bucket.trim().is_empty() {
            return Err(IngestError::config("bucket name is empty (set BUCKET)"));
        }

        debug!(?config, "Initializing S3 catalog");

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

        if let Some((access_key, secret_key)) = config.static_credentials() {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "dsr-static",
            ));
        }

        let sdk_config = loader.load().await;
        let mut s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            s3_config = s3_config.endpoint_url(endpoint);
        }

        info!(bucket = %config.bucket, region = %config.region, "S3 catalog initialized");

        Ok(Self {
            client: Client::from_conf(s3_config.build()),
            bucket: config.bucket,
            prefix: config.prefix,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectCatalog for S3Catalog {
    fn location(&self) -> &str {
        &self.bucket
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn list_keys(&self) -> IngestResult<Vec<MetadataKey>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .set_prefix(self.prefix.clone())
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| IngestError::catalog(&self.bucket, e))?;
            pages += 1;

            for object in response.contents() {
                let Some(key) = object.key() else { continue };
                // Console-created "folders" are zero-byte keys ending in '/'
                if key.ends_with('/') {
                    continue;
                }
                debug!(key, size = object.size().unwrap_or(0), "Found metadata object");
                keys.push(MetadataKey::from(key));
            }

            if response.is_truncated() != Some(true) {
                break;
            }
            match response.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => {
                    return Err(IngestError::catalog(
                        &self.bucket,
                        "listing truncated without a continuation token",
                    ))
                },
            }
        }

        info!(keys = keys.len(), pages, "Listed metadata catalog");
        Ok(keys)
    }
}

#[async_trait]
impl ObjectSource for S3Catalog {
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn get_object(&self, key: &MetadataKey) -> IngestResult<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send()
            .await
            .map_err(|e| IngestError::fetch(key, e))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| IngestError::fetch(key, e))?
            .into_bytes()
            .to_vec();

        debug!(bytes = data.len(), "Downloaded metadata object");
        Ok(data)
    }
}
