//! Destination table writes
//!
//! Every run replaces the whole `fonte_dados_metadados` table. [`MetadataStore::refresh`]
//! does that inside one transaction: readers see either the previous contents or
//! the complete new set, never an empty or half-written table.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::error::IngestResult;
use crate::models::NormalizedMetadataRecord;

/// Destination table name
pub const METADATA_TABLE: &str = "fonte_dados_metadados";

/// Rows per multi-row INSERT; 9 binds each keeps us far below the 65,535 parameter limit
const INSERT_CHUNK_SIZE: usize = 500;

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS fonte_dados_metadados (
    table_name VARCHAR(255) PRIMARY KEY,
    administrative_dependency VARCHAR(255) NOT NULL,
    exhibition_name VARCHAR(255) NOT NULL,
    source VARCHAR(255) NOT NULL,
    update_frequency VARCHAR(255) NOT NULL,
    last_data_collection TIMESTAMP NOT NULL,
    last_source_update TIMESTAMP NOT NULL,
    creation_date TIMESTAMPTZ NOT NULL,
    update_date TIMESTAMPTZ NOT NULL
)
"#;

/// Row counts from one refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshCounts {
    pub deleted: u64,
    pub inserted: u64,
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Create the destination table if it does not exist. Safe to repeat.
    async fn ensure_table(&self) -> IngestResult<()>;

    /// Remove every row, in its own transaction.
    async fn delete_all(&self) -> IngestResult<u64>;

    /// Insert a batch; all rows commit together or none do.
    async fn insert_all(&self, records: &[NormalizedMetadataRecord]) -> IngestResult<u64>;

    /// Delete everything and insert `records` as one unit of work.
    async fn refresh(&self, records: &[NormalizedMetadataRecord]) -> IngestResult<RefreshCounts>;

    async fn count(&self) -> IngestResult<i64>;

    /// Current contents ordered by table name
    async fn list_all(&self) -> IngestResult<Vec<NormalizedMetadataRecord>>;
}

/// PostgreSQL-backed store
pub struct PgMetadataStore {
    pool: PgPool,
    provisioned: OnceCell<()>,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            provisioned: OnceCell::new(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn provision(&self) -> IngestResult<()> {
        self.provisioned
            .get_or_try_init(|| async {
                sqlx::query(CREATE_TABLE_SQL).execute(&self.pool).await?;
                info!(table = METADATA_TABLE, "Destination table ready");
                Ok::<(), crate::error::IngestError>(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn ensure_table(&self) -> IngestResult<()> {
        self.provision().await
    }

    #[instrument(skip(self))]
    async fn delete_all(&self) -> IngestResult<u64> {
        self.provision().await?;

        let mut tx = self.pool.begin().await?;
        let deleted = delete_rows(&mut tx).await?;
        tx.commit().await?;

        info!(deleted, "Deleted old metadata rows");
        Ok(deleted)
    }

    #[instrument(skip(self, records), fields(records = records.len()))]
    async fn insert_all(&self, records: &[NormalizedMetadataRecord]) -> IngestResult<u64> {
        self.provision().await?;

        let mut tx = self.pool.begin().await?;
        let inserted = match insert_rows(&mut tx, records).await {
            Ok(inserted) => inserted,
            Err(e) => {
                warn!(error = %e, "Insert failed, rolling back batch");
                tx.rollback().await?;
                return Err(e);
            },
        };
        tx.commit().await?;

        info!(inserted, "Inserted metadata rows");
        Ok(inserted)
    }

    #[instrument(skip(self, records), fields(records = records.len()))]
    async fn refresh(&self, records: &[NormalizedMetadataRecord]) -> IngestResult<RefreshCounts> {
        self.provision().await?;

        let mut tx = self.pool.begin().await?;
        let written = async {
            let deleted = delete_rows(&mut tx).await?;
            let inserted = insert_rows(&mut tx, records).await?;
            IngestResult::Ok(RefreshCounts { deleted, inserted })
        }
        .await;

        let counts = match written {
            Ok(counts) => counts,
            Err(e) => {
                warn!(error = %e, "Refresh failed, previous contents kept");
                tx.rollback().await?;
                return Err(e);
            },
        };
        tx.commit().await?;

        info!(
            deleted = counts.deleted,
            inserted = counts.inserted,
            "Destination table replaced"
        );
        Ok(counts)
    }

    async fn count(&self) -> IngestResult<i64> {
        self.provision().await?;
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM fonte_dados_metadados")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_all(&self) -> IngestResult<Vec<NormalizedMetadataRecord>> {
        self.provision().await?;
        let rows = sqlx::query_as::<_, NormalizedMetadataRecord>(
            r#"
            SELECT administrative_dependency, exhibition_name, source, table_name,
                   update_frequency, last_data_collection, last_source_update,
                   creation_date, update_date
            FROM fonte_dados_metadados
            ORDER BY table_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

async fn delete_rows(conn: &mut PgConnection) -> IngestResult<u64> {
    let result = sqlx::query("DELETE FROM fonte_dados_metadados")
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

async fn insert_rows(
    conn: &mut PgConnection,
    records: &[NormalizedMetadataRecord],
) -> IngestResult<u64> {
    let mut inserted = 0;

    for chunk in records.chunks(INSERT_CHUNK_SIZE) {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO fonte_dados_metadados (table_name, administrative_dependency, \
             exhibition_name, source, update_frequency, last_data_collection, \
             last_source_update, creation_date, update_date) ",
        );

        builder.push_values(chunk, |mut row, record| {
            row.push_bind(record.table_name.as_str())
                .push_bind(record.administrative_dependency.as_str())
                .push_bind(record.exhibition_name.as_str())
                .push_bind(record.source.as_str())
                .push_bind(record.update_frequency.as_str())
                .push_bind(record.last_data_collection)
                .push_bind(record.last_source_update)
                .push_bind(record.creation_date)
                .push_bind(record.update_date);
        });

        let result = builder.build().execute(&mut *conn).await?;
        inserted += result.rows_affected();
        debug!(chunk = chunk.len(), "Inserted metadata chunk");
    }

    Ok(inserted)
}
