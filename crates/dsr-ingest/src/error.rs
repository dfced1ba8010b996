//! Error types for the refresh pipeline

use std::time::Duration;
use thiserror::Error;

use crate::models::MetadataKey;

/// Result type alias for pipeline operations
pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// Boxed cause carried by retrieval failures (SDK errors, timeouts, IO)
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum IngestError {
    /// The object store could not be listed
    #[error("Catalog unavailable for bucket '{bucket}': {cause}")]
    CatalogUnavailable {
        bucket: String,
        #[source]
        cause: BoxError,
    },

    /// One document could not be retrieved
    #[error("Failed to fetch '{key}': {cause}")]
    Fetch {
        key: MetadataKey,
        #[source]
        cause: BoxError,
    },

    /// One document was retrieved but is not a valid metadata record
    #[error("Failed to decode '{key}': {cause}")]
    Decode {
        key: MetadataKey,
        #[source]
        cause: serde_json::Error,
    },

    #[error("Unrecognized date in field '{field}' of table '{table_name}': {value:?}")]
    DateFormat {
        field: &'static str,
        table_name: String,
        value: String,
    },

    /// Fewer records were collected than keys were discovered
    #[error("Collected {actual} metadata records but discovered {expected} keys")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Refresh run exceeded its deadline of {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl IngestError {
    pub fn fetch(key: &MetadataKey, cause: impl Into<BoxError>) -> Self {
        Self::Fetch {
            key: key.clone(),
            cause: cause.into(),
        }
    }

    pub fn catalog(bucket: &str, cause: impl Into<BoxError>) -> Self {
        Self::CatalogUnavailable {
            bucket: bucket.to_string(),
            cause: cause.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Per-document failures are contained by the collector; everything else ends the run.
    pub fn is_per_document(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Decode { .. })
    }
}
