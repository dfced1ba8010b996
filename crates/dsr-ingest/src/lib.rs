//! Data source metadata refresh
//!
//! Rebuilds the `fonte_dados_metadados` table from the JSON metadata
//! documents stored in an S3 bucket.
//!
//! # Overview
//!
//! A run is a linear pipeline:
//!
//! - **Discover**: list every document key in the bucket ([`storage`])
//! - **Collect**: fetch and decode the documents with bounded concurrency
//!   ([`collector`], [`fetcher`])
//! - **Normalize**: parse the free-text dates and stamp audit times
//!   ([`normalize`])
//! - **Refresh**: replace the table contents in one transaction ([`loader`])
//!
//! If any document cannot be read, decoded or normalized, the run aborts
//! before the table is touched.
//!
//! # Example
//!
//! ```no_run
//! use dsr_ingest::{bootstrap, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pipeline = bootstrap::build_pipeline(&config).await?;
//!     let report = pipeline.run().await?;
//!     println!("loaded {} rows", report.loaded);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod api;
pub mod bootstrap;
pub mod collector;
pub mod config;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod loader;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{IngestError, IngestResult};
pub use loader::{MetadataStore, PgMetadataStore};
pub use models::{MetadataKey, NormalizedMetadataRecord, RawMetadataRecord};
pub use pipeline::{MetadataPipeline, PipelineAbort, PipelineStage, RefreshReport};
pub use storage::{ObjectCatalog, ObjectSource, S3Catalog, StorageConfig};
