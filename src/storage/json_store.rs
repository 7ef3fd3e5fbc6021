//! File-backed JSON collection store.
//!
//! Each collection is one pretty-printed JSON array at
//! `<data_dir>/<collection>.json`. It supports:
//! - Lenient reads: a missing or unparseable file lists as empty
//! - Atomic writes through a temp file and rename
//! - Lazy creation of the data directory on first write

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{
    ensure_record_id, record_id, validate_collection_name, CollectionStore, Record, StorageResult,
};

/// JSON-file store with one array file per collection
pub struct JsonCollectionStore {
    data_dir: PathBuf,
}

impl JsonCollectionStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn collection_path(&self, collection: &str) -> StorageResult<PathBuf> {
        validate_collection_name(collection)?;
        Ok(self.data_dir.join(format!("{}.json", collection)))
    }

    /// Read a collection file, treating every failure as an empty collection
    fn load(&self, path: &Path) -> Vec<Record> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                return Vec::new();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(records) => records,
            Err(e) => {
                warn!("Ignoring unparseable collection file {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }

    fn persist(&self, path: &Path, records: &[Record]) -> StorageResult<()> {
        fs::create_dir_all(&self.data_dir)?;

        let temp_path = path.with_extension("json.tmp");
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, records)?;
            writer.flush()?;
        }
        fs::rename(&temp_path, path)?;
        Ok(())
    }
}

impl CollectionStore for JsonCollectionStore {
    fn list(&self, collection: &str) -> Vec<Record> {
        match self.collection_path(collection) {
            Ok(path) => self.load(&path),
            Err(e) => {
                warn!("Rejected collection read: {}", e);
                Vec::new()
            }
        }
    }

    fn upsert(&self, collection: &str, mut record: Record) -> StorageResult<Record> {
        let path = self.collection_path(collection)?;
        let id = ensure_record_id(&mut record);

        let mut records = self.load(&path);
        match records.iter().position(|r| record_id(r) == Some(id.as_str())) {
            Some(pos) => records[pos] = record.clone(),
            None => records.push(record.clone()),
        }
        self.persist(&path, &records)?;

        debug!("Upserted record {} into {}", id, collection);
        Ok(record)
    }

    fn delete(&self, collection: &str, id: &str) -> StorageResult<()> {
        let path = self.collection_path(collection)?;

        let mut records = self.load(&path);
        records.retain(|r| record_id(r) != Some(id));
        self.persist(&path, &records)?;

        debug!("Deleted record {} from {}", id, collection);
        Ok(())
    }

    fn replace_all(&self, collection: &str, records: Vec<Record>) -> StorageResult<()> {
        let path = self.collection_path(collection)?;
        self.persist(&path, &records)
    }
}
