use serde::{Deserialize, Serialize};
use std::env;

/// Region the metadata bucket lives in unless `S3_REGION` says otherwise.
pub const DEFAULT_S3_REGION: &str = "sa-east-1";

#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Custom endpoint for S3-compatible stores (MinIO, LocalStack)
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    /// Only keys under this prefix are treated as metadata documents
    pub prefix: Option<String>,
    /// Static credentials; when either is missing the default AWS provider chain is used
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub path_style: bool,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("access_key", &self.access_key.as_ref().map(|_| "<redacted>"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("path_style", &self.path_style)
            .finish()
    }
}

impl StorageConfig {
    /// Read the bucket settings. The short names (`BUCKET`, `AKID`, `KEY`)
    /// are what the deployed function is configured with; the `S3_*`/`AWS_*`
    /// names are accepted as fallbacks.
    pub fn from_env() -> Self {
        Self {
            endpoint: non_empty_var(&["S3_ENDPOINT"]),
            region: non_empty_var(&["S3_REGION", "AWS_REGION"])
                .unwrap_or_else(|| DEFAULT_S3_REGION.to_string()),
            bucket: non_empty_var(&["BUCKET", "S3_BUCKET"]).unwrap_or_default(),
            prefix: non_empty_var(&["S3_PREFIX"]),
            access_key: non_empty_var(&["AKID", "AWS_ACCESS_KEY_ID"]),
            secret_key: non_empty_var(&["KEY", "AWS_SECRET_ACCESS_KEY"]),
            path_style: env::var("S3_PATH_STYLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }

    /// Local MinIO with its stock credentials
    pub fn for_minio(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            region: "us-east-1".to_string(),
            bucket: bucket.into(),
            prefix: None,
            access_key: Some("minioadmin".to_string()),
            secret_key: Some("minioadmin".to_string()),
            path_style: true,
        }
    }

    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key, &self.secret_key) {
            (Some(access), Some(secret)) => Some((access.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

fn non_empty_var(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}
