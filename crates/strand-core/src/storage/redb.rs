//! Redb-backed durable storage implementation.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety.
//! Every record write is a single committed transaction, so a crash leaves
//! either the old record or the new one.

use std::{path::Path, sync::Arc};

use redb::{Database, ReadableTable, TableDefinition};

use super::{Storage, StorageError};
use crate::{GroupId, SenderIdentity, SenderKeyId, StoredSenderKey};

/// Table: sender_keys
/// Key: group_id length (u32 BE) || group_id || sender identity
/// Value: CBOR-encoded StoredSenderKey
const SENDER_KEYS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("sender_keys");

/// Durable storage backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    /// Open or create a Redb database at the given path.
    ///
    /// Creates the `sender_keys` table if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(|e| StorageError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let _ = txn.open_table(SENDER_KEYS).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        tracing::debug!(path = %path.as_ref().display(), "opened sender key database");

        Ok(Self { db: Arc::new(db) })
    }
}

impl Storage for RedbStorage {
    fn load_sender_key(&self, id: &SenderKeyId) -> Result<Option<StoredSenderKey>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(SENDER_KEYS).map_err(|e| StorageError::Io(e.to_string()))?;

        let key = encode_record_key(id);
        let Some(value) = table.get(key.as_slice()).map_err(|e| StorageError::Io(e.to_string()))?
        else {
            return Ok(None);
        };

        let record: StoredSenderKey = ciborium::from_reader(value.value())
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        Ok(Some(record))
    }

    fn store_sender_key(
        &self,
        id: &SenderKeyId,
        record: &StoredSenderKey,
    ) -> Result<(), StorageError> {
        let mut bytes = Vec::new();
        ciborium::into_writer(record, &mut bytes)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let mut table =
                txn.open_table(SENDER_KEYS).map_err(|e| StorageError::Io(e.to_string()))?;

            let key = encode_record_key(id);
            table
                .insert(key.as_slice(), bytes.as_slice())
                .map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(())
    }

    fn delete_sender_key(&self, id: &SenderKeyId) -> Result<bool, StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        let existed = {
            let mut table =
                txn.open_table(SENDER_KEYS).map_err(|e| StorageError::Io(e.to_string()))?;

            let key = encode_record_key(id);
            table.remove(key.as_slice()).map_err(|e| StorageError::Io(e.to_string()))?.is_some()
        };
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(existed)
    }

    fn list_senders(&self, group: &GroupId) -> Result<Vec<SenderIdentity>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(SENDER_KEYS).map_err(|e| StorageError::Io(e.to_string()))?;

        let prefix = encode_group_prefix(group);
        let results =
            table.range(prefix.as_slice()..).map_err(|e| StorageError::Io(e.to_string()))?;

        let mut senders = Vec::new();
        for result in results {
            let (key, _) = result.map_err(|e| StorageError::Io(e.to_string()))?;
            let Some(sender) = key.value().strip_prefix(prefix.as_slice()) else {
                break;
            };

            let sender = String::from_utf8(sender.to_vec())
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            senders.push(SenderIdentity::new(sender));
        }

        Ok(senders)
    }
}

/// Encode the group part of a record key.
///
/// The length prefix keeps group boundaries unambiguous: no group's prefix
/// is a prefix of another group's keys.
fn encode_group_prefix(group: &GroupId) -> Vec<u8> {
    let group = group.as_str().as_bytes();
    let mut key = Vec::with_capacity(4 + group.len());
    key.extend_from_slice(&(group.len() as u32).to_be_bytes());
    key.extend_from_slice(group);
    key
}

/// Encode a full record key for (group, sender).
fn encode_record_key(id: &SenderKeyId) -> Vec<u8> {
    let mut key = encode_group_prefix(&id.group);
    key.extend_from_slice(id.sender.as_str().as_bytes());
    key
}
