// ABOUTME: In-memory sweeping-output store for tests and the dry-run CLI.
// ABOUTME: Overrides upsert with a genuinely atomic replacement.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::{OutputKey, StoreError, SweepingRecord, SweepingStore};
use crate::types::{AppId, RecordId};

/// A mutex-guarded map keyed by the composite output key.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<OutputKey, SweepingRecord>>,
    next_id: Mutex<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> RecordId {
        let mut next = self.next_id.lock();
        *next += 1;
        RecordId::new(format!("rec-{}", *next))
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl SweepingStore for MemoryStore {
    async fn find(&self, key: &OutputKey) -> Result<Option<SweepingRecord>, StoreError> {
        Ok(self.records.lock().get(key).cloned())
    }

    async fn ensure(&self, mut record: SweepingRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock();
        if records.contains_key(&record.key) {
            return Ok(());
        }
        if record.id.as_str().is_empty() {
            record.id = self.allocate_id();
        }
        records.insert(record.key.clone(), record);
        Ok(())
    }

    async fn delete_by_id(&self, app_id: &AppId, id: &RecordId) -> Result<(), StoreError> {
        let mut records = self.records.lock();
        let key = records
            .iter()
            .find(|(k, r)| k.app_id == *app_id && r.id == *id)
            .map(|(k, _)| k.clone());
        match key {
            Some(key) => {
                records.remove(&key);
                Ok(())
            }
            None => Err(StoreError::NotFound {
                app_id: app_id.to_string(),
                id: id.to_string(),
            }),
        }
    }

    async fn save(&self, mut record: SweepingRecord) -> Result<RecordId, StoreError> {
        if record.id.as_str().is_empty() {
            record.id = self.allocate_id();
        }
        let id = record.id.clone();
        self.records.lock().insert(record.key.clone(), record);
        Ok(id)
    }

    // Single-lock replacement; no window where the key is absent.
    async fn upsert(&self, mut record: SweepingRecord) -> Result<(), StoreError> {
        if record.id.as_str().is_empty() {
            record.id = self.allocate_id();
        }
        self.records.lock().insert(record.key.clone(), record);
        Ok(())
    }
}
