//! Concurrent fetch of every discovered document
//!
//! Keys are fanned out through a `buffer_unordered` stream capped at
//! `concurrency` in-flight fetches. Each fetch resolves to its own result
//! and the stream is drained by one consumer, so nothing mutable is shared
//! between fetches. `collect` returns only after every key has resolved.

use futures::stream::{self, StreamExt};
use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::error::IngestError;
use crate::fetcher::DocumentFetcher;
use crate::models::{MetadataKey, RawMetadataRecord};

/// Default cap on simultaneous fetches
pub const DEFAULT_FETCH_CONCURRENCY: usize = 16;

/// Default deadline for a single fetch
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub concurrency: usize,
    /// `None` waits on a fetch indefinitely
    pub fetch_timeout: Option<Duration>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_FETCH_CONCURRENCY,
            fetch_timeout: Some(Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS)),
        }
    }
}

/// A key whose document could not be fetched or decoded
#[derive(Debug)]
pub struct FetchFailure {
    pub key: MetadataKey,
    pub error: IngestError,
}

#[derive(Debug, Default)]
pub struct CollectOutcome {
    pub records: Vec<RawMetadataRecord>,
    pub failures: Vec<FetchFailure>,
    /// Fetches that reported back, successful or not
    pub completed: usize,
}

impl CollectOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct FanOutCollector {
    fetcher: DocumentFetcher,
    config: CollectorConfig,
}

impl FanOutCollector {
    pub fn new(fetcher: DocumentFetcher, config: CollectorConfig) -> Self {
        Self { fetcher, config }
    }

    pub async fn collect(&self, keys: &[MetadataKey]) -> CollectOutcome {
        let started = Instant::now();
        let concurrency = self.config.concurrency.max(1);
        let total = keys.len();

        info!(keys = total, concurrency, "Fetching metadata documents");

        let results: Vec<(MetadataKey, Result<RawMetadataRecord, IngestError>)> =
            stream::iter(keys.iter().cloned())
                .map(|key| {
                    let fetcher = self.fetcher.clone();
                    let deadline = self.config.fetch_timeout;
                    async move {
                        let result = fetch_with_deadline(&fetcher, &key, deadline).await;
                        (key, result)
                    }
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;

        let mut outcome = CollectOutcome {
            records: Vec::with_capacity(total),
            failures: Vec::new(),
            completed: results.len(),
        };

        for (key, result) in results {
            match result {
                Ok(record) => outcome.records.push(record),
                Err(e) => {
                    error!(key = %key, error = %e, "Failed to fetch metadata document");
                    outcome.failures.push(FetchFailure { key, error: e });
                },
            }
        }

        info!(
            collected = outcome.records.len(),
            failed = outcome.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fetch fan-out complete"
        );

        outcome
    }
}

async fn fetch_with_deadline(
    fetcher: &DocumentFetcher,
    key: &MetadataKey,
    deadline: Option<Duration>,
) -> Result<RawMetadataRecord, IngestError> {
    match deadline {
        Some(limit) => tokio::time::timeout(limit, fetcher.fetch(key))
            .await
            .unwrap_or_else(|_| {
                Err(IngestError::fetch(
                    key,
                    format!("no response within {:?}", limit),
                ))
            }),
        None => fetcher.fetch(key).await,
    }
}
