//! Refresh pipeline
//!
//! One run walks `Discover -> Collect -> Normalize -> Refresh -> Done`. Any
//! error ends the run in `Aborted`, and the error records which stage it
//! came from. Nothing is retried inside a run; running again is the retry,
//! which is safe because the refresh always converges on the same table
//! contents for the same bucket contents.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::collector::{CollectorConfig, FanOutCollector};
use crate::error::{IngestError, IngestResult};
use crate::fetcher::DocumentFetcher;
use crate::models::NormalizedMetadataRecord;
use crate::normalize::normalize_all;
use crate::storage::ObjectCatalog;
use crate::loader::MetadataStore;

/// Default deadline for a whole run
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Discover,
    Collect,
    Normalize,
    Refresh,
    Done,
    Aborted,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Discover => "discover",
            PipelineStage::Collect => "collect",
            PipelineStage::Normalize => "normalize",
            PipelineStage::Refresh => "refresh",
            PipelineStage::Done => "done",
            PipelineStage::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub collector: CollectorConfig,
    /// `None` lets a run take as long as it needs
    pub run_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            collector: CollectorConfig::default(),
            run_timeout: Some(Duration::from_secs(DEFAULT_RUN_TIMEOUT_SECS)),
        }
    }
}

/// A run that ended in `Aborted`
#[derive(Debug, Error)]
#[error("refresh aborted during {stage}: {error}")]
pub struct PipelineAbort {
    /// Stage that was executing when the run failed
    pub stage: PipelineStage,
    #[source]
    pub error: IngestError,
}

/// A run that reached `Done`
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub run_id: Uuid,
    pub discovered: usize,
    pub deleted: u64,
    pub loaded: u64,
    pub records: Vec<NormalizedMetadataRecord>,
    pub duration: Duration,
}

/// Terminal state of the most recent run
#[derive(Debug, Clone, Serialize)]
pub struct RunStatus {
    pub run_id: Uuid,
    pub state: PipelineStage,
    pub failed_stage: Option<PipelineStage>,
    pub error: Option<String>,
    pub loaded: u64,
    pub finished_at: DateTime<Utc>,
}

pub struct MetadataPipeline {
    catalog: Arc<dyn ObjectCatalog>,
    collector: FanOutCollector,
    store: Arc<dyn MetadataStore>,
    run_timeout: Option<Duration>,
    /// One run at a time per process; the destination table has a single writer
    run_lock: tokio::sync::Mutex<()>,
    last_run: Mutex<Option<RunStatus>>,
}

impl MetadataPipeline {
    pub fn new(
        catalog: Arc<dyn ObjectCatalog>,
        fetcher: DocumentFetcher,
        store: Arc<dyn MetadataStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            catalog,
            collector: FanOutCollector::new(fetcher, config.collector),
            store,
            run_timeout: config.run_timeout,
            run_lock: tokio::sync::Mutex::new(()),
            last_run: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    pub fn last_run(&self) -> Option<RunStatus> {
        self.last_run
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Execute one full refresh.
    pub async fn run(&self) -> Result<RefreshReport, PipelineAbort> {
        let run_id = Uuid::new_v4();
        let span = info_span!("refresh", %run_id, bucket = %self.catalog.location());

        async {
            let _running = self.run_lock.lock().await;
            let mut stage = PipelineStage::Discover;

            let result = match self.run_timeout {
                Some(limit) => {
                    match tokio::time::timeout(limit, self.execute(run_id, &mut stage)).await {
                        Ok(result) => result,
                        Err(_) => Err(IngestError::Timeout(limit)),
                    }
                },
                None => self.execute(run_id, &mut stage).await,
            };

            let result = result.map_err(|error| PipelineAbort { stage, error });
            self.record(run_id, &result);
            result
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        run_id: Uuid,
        stage: &mut PipelineStage,
    ) -> IngestResult<RefreshReport> {
        let started = Instant::now();

        *stage = PipelineStage::Discover;
        let keys = self.catalog.list_keys().await?;
        info!(keys = keys.len(), "Discovered metadata documents");

        *stage = PipelineStage::Collect;
        let outcome = self.collector.collect(&keys).await;
        if outcome.records.len() != keys.len() {
            for failure in &outcome.failures {
                warn!(key = %failure.key, "Missing from collected set");
            }
            return Err(IngestError::CountMismatch {
                expected: keys.len(),
                actual: outcome.records.len(),
            });
        }

        *stage = PipelineStage::Normalize;
        let records = normalize_all(outcome.records)?;

        *stage = PipelineStage::Refresh;
        let counts = self.store.refresh(&records).await?;

        *stage = PipelineStage::Done;
        Ok(RefreshReport {
            run_id,
            discovered: keys.len(),
            deleted: counts.deleted,
            loaded: counts.inserted,
            records,
            duration: started.elapsed(),
        })
    }

    fn record(&self, run_id: Uuid, result: &Result<RefreshReport, PipelineAbort>) {
        let status = match result {
            Ok(report) => {
                info!(
                    discovered = report.discovered,
                    deleted = report.deleted,
                    loaded = report.loaded,
                    elapsed_ms = report.duration.as_millis() as u64,
                    "Refresh complete"
                );
                RunStatus {
                    run_id,
                    state: PipelineStage::Done,
                    failed_stage: None,
                    error: None,
                    loaded: report.loaded,
                    finished_at: Utc::now(),
                }
            },
            Err(abort) => {
                error!(stage = %abort.stage, error = %abort.error, "Refresh aborted");
                RunStatus {
                    run_id,
                    state: PipelineStage::Aborted,
                    failed_stage: Some(abort.stage),
                    error: Some(abort.error.to_string()),
                    loaded: 0,
                    finished_at: Utc::now(),
                }
            },
        };

        *self
            .last_run
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(status);
    }
}
