//! In-memory stand-ins for the bucket and the destination table
#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{IngestError, IngestResult};
use crate::loader::{MetadataStore, RefreshCounts};
use crate::models::{MetadataKey, NormalizedMetadataRecord};
use crate::storage::{ObjectCatalog, ObjectSource};

/// A well-formed metadata document for `table_name`
pub fn sample_document(table_name: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "administrative_dependency": "Federal",
        "exhibition_name": format!("Tabela {table_name}"),
        "last_data_collection": "2024-03-01 10:15:30",
        "last_update": "2024-02-28T23:59:59.000Z",
        "source": "IBGE",
        "table_name": table_name,
        "update_frequency": "Mensal"
    }))
    .expect("static document serializes")
}

/// `n` documents keyed `doc-0000.json`.. with distinct table names
pub fn bucket_with_documents(n: usize) -> InMemoryBucket {
    (0..n).fold(InMemoryBucket::new(), |bucket, i| {
        bucket.with_document(format!("doc-{i:04}.json"), sample_document(&format!("tabela_{i:04}")))
    })
}

#[derive(Default)]
pub struct InMemoryBucket {
    objects: BTreeMap<String, Vec<u8>>,
    failing: BTreeSet<String>,
    latency: Duration,
    key_latency: HashMap<String, Duration>,
    unavailable: bool,
    gets: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl InMemoryBucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, key: impl Into<String>, body: Vec<u8>) -> Self {
        self.with_raw(key, body)
    }

    pub fn with_raw(mut self, key: impl Into<String>, body: Vec<u8>) -> Self {
        self.objects.insert(key.into(), body);
        self
    }

    /// Listed, but every read fails
    pub fn failing(mut self, key: impl Into<String>) -> Self {
        self.failing.insert(key.into());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_key_latency(mut self, key: impl Into<String>, latency: Duration) -> Self {
        self.key_latency.insert(key.into(), latency);
        self
    }

    /// Listing fails
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Highest number of reads observed running at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectCatalog for InMemoryBucket {
    fn location(&self) -> &str {
        "memory"
    }

    async fn list_keys(&self) -> IngestResult<Vec<MetadataKey>> {
        if self.unavailable {
            return Err(IngestError::catalog("memory", "connection refused"));
        }
        let keys: BTreeSet<&String> = self.objects.keys().chain(self.failing.iter()).collect();
        Ok(keys.into_iter().map(|k| MetadataKey::from(k.as_str())).collect())
    }
}

#[async_trait]
impl ObjectSource for InMemoryBucket {
    async fn get_object(&self, key: &MetadataKey) -> IngestResult<Vec<u8>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let delay = self
            .key_latency
            .get(key.as_str())
            .copied()
            .unwrap_or(self.latency);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(key.as_str()) {
            return Err(IngestError::fetch(key, "simulated read failure"));
        }
        self.objects
            .get(key.as_str())
            .cloned()
            .ok_or_else(|| IngestError::fetch(key, "NoSuchKey"))
    }
}

/// Destination table held in memory, keyed by table name like the real one
#[derive(Default)]
pub struct InMemoryStore {
    rows: Mutex<BTreeMap<String, NormalizedMetadataRecord>>,
    refreshes: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated with placeholder rows
    pub fn with_rows(table_names: &[&str]) -> Self {
        let now = chrono::Utc::now();
        let midnight = now.date_naive().and_hms_opt(0, 0, 0).expect("midnight exists");
        let rows = table_names
            .iter()
            .map(|name| {
                let record = NormalizedMetadataRecord {
                    administrative_dependency: "Municipal".to_string(),
                    exhibition_name: name.to_string(),
                    source: "legacy".to_string(),
                    table_name: name.to_string(),
                    update_frequency: "Anual".to_string(),
                    last_data_collection: midnight,
                    last_source_update: midnight,
                    creation_date: now,
                    update_date: now,
                };
                (name.to_string(), record)
            })
            .collect();

        Self {
            rows: Mutex::new(rows),
            refreshes: AtomicUsize::new(0),
        }
    }

    pub fn table_names(&self) -> Vec<String> {
        self.rows.lock().expect("rows lock").keys().cloned().collect()
    }

    pub fn refresh_calls(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Rows with the audit timestamps blanked, for comparing runs
    pub fn rows_without_audit(&self) -> Vec<NormalizedMetadataRecord> {
        let epoch = chrono::DateTime::<chrono::Utc>::UNIX_EPOCH;
        self.rows
            .lock()
            .expect("rows lock")
            .values()
            .cloned()
            .map(|mut row| {
                row.creation_date = epoch;
                row.update_date = epoch;
                row
            })
            .collect()
    }

    fn build(
        records: &[NormalizedMetadataRecord],
    ) -> IngestResult<BTreeMap<String, NormalizedMetadataRecord>> {
        let mut rows = BTreeMap::new();
        for record in records {
            if rows
                .insert(record.table_name.clone(), record.clone())
                .is_some()
            {
                return Err(IngestError::Storage(sqlx::Error::Protocol(format!(
                    "duplicate key value violates unique constraint: table_name={}",
                    record.table_name
                ))));
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl MetadataStore for InMemoryStore {
    async fn ensure_table(&self) -> IngestResult<()> {
        Ok(())
    }

    async fn delete_all(&self) -> IngestResult<u64> {
        let mut rows = self.rows.lock().expect("rows lock");
        let deleted = rows.len() as u64;
        rows.clear();
        Ok(deleted)
    }

    async fn insert_all(&self, records: &[NormalizedMetadataRecord]) -> IngestResult<u64> {
        let mut rows = self.rows.lock().expect("rows lock");
        let mut staged = rows.clone();
        for (name, record) in Self::build(records)? {
            if staged.insert(name.clone(), record).is_some() {
                return Err(IngestError::Storage(sqlx::Error::Protocol(format!(
                    "duplicate key value violates unique constraint: table_name={name}"
                ))));
            }
        }
        *rows = staged;
        Ok(records.len() as u64)
    }

    async fn refresh(&self, records: &[NormalizedMetadataRecord]) -> IngestResult<RefreshCounts> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let replacement = Self::build(records)?;
        let mut rows = self.rows.lock().expect("rows lock");
        let deleted = rows.len() as u64;
        *rows = replacement;
        Ok(RefreshCounts {
            deleted,
            inserted: records.len() as u64,
        })
    }

    async fn count(&self) -> IngestResult<i64> {
        Ok(self.rows.lock().expect("rows lock").len() as i64)
    }

    async fn list_all(&self) -> IngestResult<Vec<NormalizedMetadataRecord>> {
        Ok(self.rows.lock().expect("rows lock").values().cloned().collect())
    }
}
