//! Single-document fetch and decode

use std::sync::Arc;
use tracing::instrument;

use crate::error::{IngestError, IngestResult};
use crate::models::{MetadataKey, RawMetadataRecord};
use crate::storage::ObjectSource;

/// Fetches and decodes metadata documents.
///
/// Holds no per-call state, so clones can be handed to any number of
/// concurrent tasks.
#[derive(Clone)]
pub struct DocumentFetcher {
    source: Arc<dyn ObjectSource>,
}

impl DocumentFetcher {
    pub fn new(source: Arc<dyn ObjectSource>) -> Self {
        Self { source }
    }

    #[instrument(skip(self), fields(key = %key))]
    pub async fn fetch(&self, key: &MetadataKey) -> IngestResult<RawMetadataRecord> {
        let body = self.source.get_object(key).await?;
        decode(key, &body)
    }
}

/// Decode one document body
pub fn decode(key: &MetadataKey, body: &[u8]) -> IngestResult<RawMetadataRecord> {
    serde_json::from_slice(body).map_err(|cause| IngestError::Decode {
        key: key.clone(),
        cause,
    })
}
