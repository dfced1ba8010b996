//! Date normalization
//!
//! Metadata documents are written by several producers and the two date
//! fields arrive as text. `last_data_collection` is written by our own
//! collector and always uses one layout. `last_update` comes from the
//! upstream publisher, so a short ordered list of layouts is tried and the
//! first one that matches wins.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::debug;

use crate::error::{IngestError, IngestResult};
use crate::models::{NormalizedMetadataRecord, RawMetadataRecord};

/// The only layout accepted for `last_data_collection`
pub const COLLECTION_TIMESTAMP_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy)]
enum Layout {
    /// Calendar date, normalized to midnight
    Date(&'static str),
    DateTime(&'static str),
}

impl Layout {
    /// Parse `value`, then require that formatting the result with the same
    /// layout reproduces `value` byte for byte. chrono alone skips leading
    /// whitespace and accepts unpadded or signed fields.
    fn parse(self, value: &str) -> Option<NaiveDateTime> {
        match self {
            Layout::Date(fmt) => NaiveDate::parse_from_str(value, fmt)
                .ok()
                .filter(|date| date.format(fmt).to_string() == value)
                .and_then(|date| date.and_hms_opt(0, 0, 0)),
            Layout::DateTime(fmt) => NaiveDateTime::parse_from_str(value, fmt)
                .ok()
                .filter(|parsed| parsed.format(fmt).to_string() == value),
        }
    }
}

/// Layouts for `last_update`, in priority order.
///
/// The trailing `Z` is matched literally; no offset is applied.
const SOURCE_UPDATE_LAYOUTS: [Layout; 4] = [
    Layout::Date("%Y-%m-%d"),
    Layout::DateTime("%Y-%m-%dT%H:%M:%S.%3fZ"),
    Layout::DateTime(COLLECTION_TIMESTAMP_LAYOUT),
    Layout::Date("%d/%m/%Y"),
];

/// Parse `last_data_collection`; exactly `YYYY-MM-DD HH:MM:SS`.
pub fn parse_collection_timestamp(value: &str) -> Option<NaiveDateTime> {
    Layout::DateTime(COLLECTION_TIMESTAMP_LAYOUT).parse(value)
}

/// Parse `last_update` against each known layout in turn.
pub fn parse_source_update(value: &str) -> Option<NaiveDateTime> {
    SOURCE_UPDATE_LAYOUTS
        .iter()
        .find_map(|layout| layout.parse(value))
}

/// Normalize one record, stamping both audit columns with `now`.
pub fn normalize(raw: RawMetadataRecord, now: DateTime<Utc>) -> IngestResult<NormalizedMetadataRecord> {
    let last_data_collection = parse_collection_timestamp(&raw.last_data_collection)
        .ok_or_else(|| IngestError::DateFormat {
            field: "last_data_collection",
            table_name: raw.table_name.clone(),
            value: raw.last_data_collection.clone(),
        })?;

    let last_source_update =
        parse_source_update(&raw.last_update).ok_or_else(|| IngestError::DateFormat {
            field: "last_update",
            table_name: raw.table_name.clone(),
            value: raw.last_update.clone(),
        })?;

    Ok(NormalizedMetadataRecord {
        administrative_dependency: raw.administrative_dependency,
        exhibition_name: raw.exhibition_name,
        source: raw.source,
        table_name: raw.table_name,
        update_frequency: raw.update_frequency,
        last_data_collection,
        last_source_update,
        creation_date: now,
        update_date: now,
    })
}

/// Normalize a whole batch. One bad record fails the batch.
pub fn normalize_all(raws: Vec<RawMetadataRecord>) -> IngestResult<Vec<NormalizedMetadataRecord>> {
    let now = Utc::now();
    let records = raws
        .into_iter()
        .map(|raw| normalize(raw, now))
        .collect::<IngestResult<Vec<_>>>()?;

    debug!(count = records.len(), "Normalized metadata records");
    Ok(records)
}
