#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use super::{Storage, StorageError};
use crate::{GroupId, SenderIdentity, SenderKeyId, StoredSenderKey};

type Records = HashMap<SenderKeyId, StoredSenderKey>;

/// In-memory storage for tests and examples.
///
/// Clones share one map. Every operation takes the lock for a single map
/// access; a poisoned lock is recovered since no operation can leave the map
/// half-updated.
#[derive(Clone)]
pub struct MemoryStorage {
    inner: Arc<Mutex<Records>>,
}

impl MemoryStorage {
    /// Create a new empty `MemoryStorage`
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Number of stored records.
    pub fn record_count(&self) -> usize {
        self.records().len()
    }

    fn records(&self) -> MutexGuard<'_, Records> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn load_sender_key(&self, id: &SenderKeyId) -> Result<Option<StoredSenderKey>, StorageError> {
        Ok(self.records().get(id).cloned())
    }

    fn store_sender_key(
        &self,
        id: &SenderKeyId,
        record: &StoredSenderKey,
    ) -> Result<(), StorageError> {
        self.records().insert(id.clone(), record.clone());
        Ok(())
    }

    fn delete_sender_key(&self, id: &SenderKeyId) -> Result<bool, StorageError> {
        Ok(self.records().remove(id).is_some())
    }

    fn list_senders(&self, group: &GroupId) -> Result<Vec<SenderIdentity>, StorageError> {
        let records = self.records();
        Ok(records.keys().filter(|id| &id.group == group).map(|id| id.sender.clone()).collect())
    }
}
