//! Storage module for JSON-array collection persistence.
//!
//! Collections are ordered lists of JSON records keyed by a string `id`.
//! This module provides:
//! - The `CollectionStore` trait shared by the file-backed and in-memory stores
//! - Record id helpers (millisecond-timestamp id generation)
//! - Collection name validation to keep reads and writes inside the data dir

mod json_store;
#[cfg(test)]
mod memory;

pub use json_store::JsonCollectionStore;
#[cfg(test)]
pub use memory::MemoryStore;

use serde_json::Value;
use thiserror::Error;

/// A single collection entry: a JSON object with a string `id` field
pub type Record = serde_json::Map<String, Value>;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid collection name: {0}")]
    InvalidName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Ordered collections of JSON records.
///
/// Reads never fail: a collection that is missing or unreadable lists as
/// empty. Writes replace matching records in place (whole-record replace, not
/// a merge) or append, and surface their failures.
pub trait CollectionStore: Send + Sync {
    /// All records of a collection, in stored order
    fn list(&self, collection: &str) -> Vec<Record>;

    /// Insert or replace a record by id, returning the stored record.
    ///
    /// A missing or empty id is filled in with a generated one before the
    /// record is matched against the collection.
    fn upsert(&self, collection: &str, record: Record) -> StorageResult<Record>;

    /// Remove every record with the given id. Succeeds when none match.
    fn delete(&self, collection: &str, id: &str) -> StorageResult<()>;

    /// Overwrite a collection with the given records
    fn replace_all(&self, collection: &str, records: Vec<Record>) -> StorageResult<()>;
}

/// Generate a record id: the current Unix time in milliseconds, as a string
pub fn generate_record_id() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}

/// The record's id, if it carries a non-empty string one
pub fn record_id(record: &Record) -> Option<&str> {
    record
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

/// Return the record's id, generating and inserting one when absent.
///
/// A non-string or empty `id` counts as absent and is replaced.
pub fn ensure_record_id(record: &mut Record) -> String {
    if let Some(id) = record_id(record) {
        return id.to_string();
    }
    let id = generate_record_id();
    record.insert("id".to_string(), Value::String(id.clone()));
    id
}

/// Reject collection names that could escape the data directory
pub fn validate_collection_name(name: &str) -> StorageResult<()> {
    if name.is_empty() || name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}
