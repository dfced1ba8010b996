//! Wiring shared by both binaries

use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::db;
use crate::error::IngestResult;
use crate::fetcher::DocumentFetcher;
use crate::loader::{MetadataStore, PgMetadataStore};
use crate::pipeline::MetadataPipeline;
use crate::storage::S3Catalog;

/// Connect to the bucket and the database, provision the destination
/// table, and assemble the pipeline.
pub async fn build_pipeline(config: &Config) -> IngestResult<MetadataPipeline> {
    let catalog = Arc::new(S3Catalog::new(config.storage.clone()).await?);

    let pool = db::create_pool(&config.database).await?;
    let store = Arc::new(PgMetadataStore::new(pool));
    store.ensure_table().await?;

    info!(bucket = %catalog.bucket(), "Pipeline ready");

    Ok(MetadataPipeline::new(
        catalog.clone(),
        DocumentFetcher::new(catalog),
        store,
        config.pipeline_config(),
    ))
}
