//! Metadata record shapes
//!
//! A document in the bucket decodes into a [`RawMetadataRecord`] whose dates
//! are still free text. [`crate::normalize`] turns it into a
//! [`NormalizedMetadataRecord`], which is what lands in the destination table
//! and what the handler returns.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Object key naming one metadata document in the bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataKey(String);

impl MetadataKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MetadataKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for MetadataKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// A metadata document exactly as published
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMetadataRecord {
    pub administrative_dependency: String,
    pub exhibition_name: String,
    pub last_data_collection: String,
    pub last_update: String,
    pub source: String,
    pub table_name: String,
    pub update_frequency: String,
}

/// One row of the destination table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NormalizedMetadataRecord {
    pub administrative_dependency: String,
    pub exhibition_name: String,
    pub source: String,
    pub table_name: String,
    pub update_frequency: String,
    pub last_data_collection: NaiveDateTime,
    pub last_source_update: NaiveDateTime,
    pub creation_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
}
