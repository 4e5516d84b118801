//! Storage abstraction for sender key records
//!
//! Trait-based abstraction for persisting one [`StoredSenderKey`] per
//! (group, sender). The trait is synchronous (no async): a job holding a
//! ratchet's turn performs its whole read-modify-write without yielding.

mod chaotic;
mod error;
mod memory;
mod redb;

pub use chaotic::{ChaoticStorage, FaultTarget};
pub use error::StorageError;
pub use memory::MemoryStorage;

pub use self::redb::RedbStorage;
use crate::{GroupId, SenderIdentity, SenderKeyId, StoredSenderKey};

/// Durable key-value store for sender key records
///
/// Must be Clone (shared between the service and tooling), Send + Sync
/// (thread-safe), and synchronous (no async methods). Implementations
/// typically share internal state via Arc, so clones access the same
/// underlying storage.
///
/// # Invariants
///
/// - A record is written as a whole: readers observe either the previous
///   record or the new one, never a mix
/// - A failed write leaves the previous record in place
pub trait Storage: Clone + Send + Sync + 'static {
    /// Load the record for a ratchet
    ///
    /// Returns `None` if no record exists.
    fn load_sender_key(&self, id: &SenderKeyId) -> Result<Option<StoredSenderKey>, StorageError>;

    /// Store the record for a ratchet
    ///
    /// Overwrites any existing record atomically.
    fn store_sender_key(&self, id: &SenderKeyId, record: &StoredSenderKey)
    -> Result<(), StorageError>;

    /// Delete the record for a ratchet
    ///
    /// Returns `true` if a record existed.
    fn delete_sender_key(&self, id: &SenderKeyId) -> Result<bool, StorageError>;

    /// List senders holding a record in a group.
    ///
    /// Order is not guaranteed.
    fn list_senders(&self, group: &GroupId) -> Result<Vec<SenderIdentity>, StorageError>;
}
