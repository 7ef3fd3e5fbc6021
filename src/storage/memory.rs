//! In-memory collection store, used as a drop-in test double for the
//! file-backed store.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::warn;

use super::{
    ensure_record_id, record_id, validate_collection_name, CollectionStore, Record, StorageResult,
};

/// HashMap-backed store with the same upsert/delete semantics as the file store
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CollectionStore for MemoryStore {
    fn list(&self, collection: &str) -> Vec<Record> {
        if let Err(e) = validate_collection_name(collection) {
            warn!("Rejected collection read: {}", e);
            return Vec::new();
        }
        self.collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn upsert(&self, collection: &str, mut record: Record) -> StorageResult<Record> {
        validate_collection_name(collection)?;
        let id = ensure_record_id(&mut record);

        let mut collections = self.collections.write();
        let records = collections.entry(collection.to_string()).or_default();
        match records.iter().position(|r| record_id(r) == Some(id.as_str())) {
            Some(pos) => records[pos] = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(record)
    }

    fn delete(&self, collection: &str, id: &str) -> StorageResult<()> {
        validate_collection_name(collection)?;

        let mut collections = self.collections.write();
        collections
            .entry(collection.to_string())
            .or_default()
            .retain(|r| record_id(r) != Some(id));
        Ok(())
    }

    fn replace_all(&self, collection: &str, records: Vec<Record>) -> StorageResult<()> {
        validate_collection_name(collection)?;
        self.collections
            .write()
            .insert(collection.to_string(), records);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn record(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_upsert_then_list() {
        let store = MemoryStore::new();
        let stored = store
            .upsert("articles", record(json!({"title": "Hello"})))
            .unwrap();

        assert!(stored["id"].as_str().unwrap().parse::<i64>().is_ok());
        assert_eq!(store.list("articles").len(), 1);
        assert!(store.list("events").is_empty());
    }

    #[test]
    fn test_upsert_replaces_matching_id_in_place() {
        let store = MemoryStore::new();
        for id in ["a", "b", "c"] {
            store.upsert("articles", record(json!({"id": id}))).unwrap();
        }
        store
            .upsert("articles", record(json!({"id": "b", "rev": 2})))
            .unwrap();

        let listed = store.list("articles");
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[1], record(json!({"id": "b", "rev": 2})));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        store.upsert("articles", record(json!({"id": "42"}))).unwrap();

        store.delete("articles", "42").unwrap();
        store.delete("articles", "42").unwrap();
        assert!(store.list("articles").is_empty());
    }

    #[test]
    fn test_rejects_path_traversal() {
        let store = MemoryStore::new();
        assert!(store.list("../secrets").is_empty());
        assert!(store.upsert("../secrets", Record::new()).is_err());
        assert!(store.delete("a/b", "1").is_err());
    }
}
