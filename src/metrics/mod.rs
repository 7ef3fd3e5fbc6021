//! Visit metrics module.
//!
//! Tracks site visits as one record per day:
//! - A visit increments today's count or appends a fresh record
//! - History is capped to the most recent 30 days by append order
//! - Days are dated in UTC

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::storage::{CollectionStore, Record, StorageResult};

/// Collection that holds the hit records
const HITS_COLLECTION: &str = "hits";

/// Number of daily records kept
pub const VISIT_HISTORY_DAYS: usize = 30;

/// One day's visit count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitRecord {
    /// Day in `YYYY-MM-DD` form (UTC)
    pub date: String,
    /// Visits recorded for that day
    pub count: u64,
}

/// Daily visit counter over the shared collection store
pub struct HitCounter {
    store: Arc<dyn CollectionStore>,
}

impl HitCounter {
    pub fn new(store: Arc<dyn CollectionStore>) -> Self {
        Self { store }
    }

    /// Count one visit for today, pruning history beyond the cap
    pub fn record_visit(&self) -> StorageResult<()> {
        self.record_visit_on(&today())
    }

    fn record_visit_on(&self, date: &str) -> StorageResult<()> {
        let mut hits = self.hit_records();

        if let Some(hit) = hits.iter_mut().find(|h| h.date == date) {
            hit.count += 1;
        } else {
            hits.push(HitRecord {
                date: date.to_string(),
                count: 1,
            });
        }

        if hits.len() > VISIT_HISTORY_DAYS {
            let excess = hits.len() - VISIT_HISTORY_DAYS;
            hits.drain(..excess);
        }

        let records = hits.iter().map(to_record).collect();
        self.store.replace_all(HITS_COLLECTION, records)?;

        debug!("Recorded visit for {}", date);
        Ok(())
    }

    /// Stored hit records as raw JSON objects, oldest first
    pub fn list(&self) -> Vec<Record> {
        self.store.list(HITS_COLLECTION)
    }

    /// Parsed hit records, skipping entries that do not fit the shape
    fn hit_records(&self) -> Vec<HitRecord> {
        self.store
            .list(HITS_COLLECTION)
            .into_iter()
            .filter_map(|record| serde_json::from_value(Value::Object(record)).ok())
            .collect()
    }
}

fn to_record(hit: &HitRecord) -> Record {
    let mut record = Record::new();
    record.insert("date".to_string(), Value::String(hit.date.clone()));
    record.insert("count".to_string(), Value::from(hit.count));
    record
}

fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}
