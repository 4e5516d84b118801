//! Sender key service: the public face of the ratchet.
//!
//! Every operation that touches a record runs as one job on the
//! [`JobQueue`] turn of its (group, sender) pair:
//!
//! ```text
//! load record -> advance (pure) -> AEAD -> store record
//! ```
//!
//! The job is synchronous and runs on the blocking pool, so once it has
//! loaded a record it always reaches its single store (or fails before it)
//! without yielding to another job for the same pair. A failed job leaves
//! the stored record exactly as it was.

use strand_crypto::{
    Advance, ChainKey, SenderKeyError, SenderKeyRecord, decrypt_message, encrypt_message,
};

use crate::{
    Environment, GroupId, JobQueue, RecordError, SenderIdentity, SenderKeyConfig, SenderKeyId,
    ServiceError, Storage, StorageError, StoredSenderKey,
};

/// Chain key and index handed to other group members.
///
/// Installing a share lets the receiver decrypt every message the owner
/// sends from `index` onwards.
#[derive(Debug, Clone)]
pub struct SenderKeyShare {
    /// Chain key at `index`
    pub chain_key: ChainKey,
    /// Index of the next message the owner will send
    pub index: u32,
}

/// Output of [`SenderKeyService::encrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCiphertext {
    /// Sealed message (nonce, ciphertext, tag)
    pub ciphertext: Vec<u8>,
    /// Ratchet index the message was sealed under. Receivers need it to
    /// decrypt, so it travels alongside the ciphertext.
    pub index: u32,
}

/// Sender key ratchets for every (group, sender) pair this device knows.
#[derive(Clone)]
pub struct SenderKeyService<S: Storage, E: Environment> {
    storage: S,
    env: E,
    config: SenderKeyConfig,
    queue: JobQueue,
}

impl<S: Storage, E: Environment> SenderKeyService<S, E> {
    /// Create a service over `storage`, drawing randomness from `env`.
    pub fn new(storage: S, env: E, config: SenderKeyConfig) -> Self {
        Self { storage, env, config, queue: JobQueue::new() }
    }

    /// Active configuration.
    pub fn config(&self) -> &SenderKeyConfig {
        &self.config
    }

    /// Underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Job queue serializing access to each pair.
    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    /// Start a fresh ratchet for `id` from a random chain key at index 0.
    ///
    /// Replaces any existing record. The returned share is what gets
    /// distributed to the other members of the group.
    ///
    /// # Errors
    ///
    /// - `Storage` if the record cannot be written
    pub async fn create_sender_key(&self, id: &SenderKeyId) -> Result<SenderKeyShare, ServiceError> {
        self.job(id, |service, id| {
            let chain_key = ChainKey::from_bytes(service.env.random_array());
            let record = SenderKeyRecord::new(chain_key.clone());
            service.persist(id, &record)?;

            tracing::info!(%id, "created sender key");
            Ok(SenderKeyShare { chain_key, index: 0 })
        })
        .await
    }

    /// Install a ratchet received from another member.
    ///
    /// Replaces any existing record for `id`, including its skipped keys.
    ///
    /// # Errors
    ///
    /// - `Storage` if the record cannot be written
    pub async fn install_sender_key(
        &self,
        id: &SenderKeyId,
        share: &SenderKeyShare,
    ) -> Result<(), ServiceError> {
        let share = share.clone();
        self.job(id, move |service, id| {
            let record = SenderKeyRecord::at_index(share.chain_key, share.index);
            service.persist(id, &record)?;

            tracing::info!(%id, index = share.index, "installed sender key");
            Ok(())
        })
        .await
    }

    /// Current chain key and index of a ratchet.
    ///
    /// # Errors
    ///
    /// - `RecordNotFound`, `InvalidRecordData`, `Storage`
    pub async fn export_sender_key(&self, id: &SenderKeyId) -> Result<SenderKeyShare, ServiceError> {
        self.job(id, |service, id| {
            let record = service.load(id)?;
            Ok(SenderKeyShare { chain_key: record.chain_key().clone(), index: record.index() })
        })
        .await
    }

    /// Encrypt `plaintext` with the next key of our own ratchet.
    ///
    /// Steps the ratchet exactly once. The returned index is the one the
    /// message was sealed under.
    ///
    /// # Errors
    ///
    /// - `RecordNotFound` if no ratchet was created for `id`
    /// - `IndexExhausted` if the ratchet has no indices left
    /// - `InvalidRecordData`, `Storage`
    pub async fn encrypt(
        &self,
        id: &SenderKeyId,
        plaintext: &[u8],
    ) -> Result<GroupCiphertext, ServiceError> {
        let plaintext = plaintext.to_vec();
        self.job(id, move |service, id| {
            let record = service.load(id)?;
            let index = record.index();

            let Advance { record, message_key } =
                record.next_message_key().map_err(|e| service.reject(id, index, e))?;

            let ciphertext = encrypt_message(&plaintext, &message_key, service.env.random_array());
            service.persist(id, &record)?;

            tracing::debug!(%id, index, len = plaintext.len(), "encrypted group message");
            Ok(GroupCiphertext { ciphertext, index })
        })
        .await
    }

    /// Decrypt a message sealed under `index` of the sender's ratchet.
    ///
    /// Steps forward as far as `index` (retaining keys for the indices walked
    /// past), or consumes the retained key if `index` is behind. The
    /// advanced record is only stored once the ciphertext authenticates, so
    /// a forged message consumes nothing.
    ///
    /// # Errors
    ///
    /// - `KeyNotFound` if the key for `index` was consumed or discarded
    /// - `AuthenticationFailure` if the ciphertext does not verify
    /// - `TooFarAhead` if `index` exceeds the skip limit
    /// - `RecordNotFound`, `IndexExhausted`, `InvalidRecordData`, `Storage`
    pub async fn decrypt(
        &self,
        id: &SenderKeyId,
        index: u32,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, ServiceError> {
        let ciphertext = ciphertext.to_vec();
        self.job(id, move |service, id| {
            let record = service.load(id)?;
            let current = record.index();

            let Advance { record, message_key } = record
                .advance_to(index, &service.config.limits())
                .map_err(|e| service.reject(id, index, e))?;

            let plaintext = decrypt_message(&ciphertext, &message_key)
                .map_err(|e| service.reject(id, index, e))?;
            service.persist(id, &record)?;

            tracing::debug!(
                %id,
                index,
                previous_index = current,
                current_index = record.index(),
                skipped = record.skipped_count(),
                "decrypted group message"
            );
            Ok(plaintext)
        })
        .await
    }

    /// Remove the ratchet for `id`.
    ///
    /// Returns `true` if a record existed.
    ///
    /// # Errors
    ///
    /// - `Storage` if the backend fails
    pub async fn delete_sender_key(&self, id: &SenderKeyId) -> Result<bool, ServiceError> {
        self.job(id, |service, id| {
            let existed =
                service.storage.delete_sender_key(id).map_err(|e| service.storage_failure(id, e))?;

            tracing::info!(%id, existed, "deleted sender key");
            Ok(existed)
        })
        .await
    }

    /// Senders holding a ratchet in `group`.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the listing fails.
    pub fn list_senders(&self, group: &GroupId) -> Result<Vec<SenderIdentity>, StorageError> {
        self.storage.list_senders(group).inspect_err(|e| {
            tracing::error!(%group, error = %e, "failed to list senders");
        })
    }

    /// Queue `job` on the turn of `id`, handing it its own service handle.
    async fn job<T, F>(&self, id: &SenderKeyId, job: F) -> T
    where
        F: FnOnce(&Self, &SenderKeyId) -> T + Send + 'static,
        T: Send + 'static,
    {
        let service = self.clone();
        let owned = id.clone();
        self.queue.run(id, move || job(&service, &owned)).await
    }

    fn load(&self, id: &SenderKeyId) -> Result<SenderKeyRecord, ServiceError> {
        let stored = self
            .storage
            .load_sender_key(id)
            .map_err(|e| match e {
                StorageError::Serialization(reason) => {
                    self.corrupt(id, RecordError::Decode(reason))
                },
                err @ StorageError::Io(_) => self.storage_failure(id, err),
            })?
            .ok_or_else(|| ServiceError::RecordNotFound { id: id.clone() })?;

        stored.to_record().map_err(|e| self.corrupt(id, e))
    }

    fn corrupt(&self, id: &SenderKeyId, err: RecordError) -> ServiceError {
        tracing::error!(%id, error = %err, "stored sender key is corrupt");
        ServiceError::InvalidRecordData { id: id.clone(), source: err }
    }

    fn persist(&self, id: &SenderKeyId, record: &SenderKeyRecord) -> Result<(), ServiceError> {
        let stored = StoredSenderKey::from_record(record);
        self.storage.store_sender_key(id, &stored).map_err(|e| self.storage_failure(id, e))
    }

    fn storage_failure(&self, id: &SenderKeyId, err: StorageError) -> ServiceError {
        tracing::error!(%id, error = %err, "sender key storage failed");
        ServiceError::Storage { id: id.clone(), source: err }
    }

    /// Classify and log a ratchet error for message `index`.
    fn reject(&self, id: &SenderKeyId, index: u32, err: SenderKeyError) -> ServiceError {
        let err = ServiceError::from_ratchet(id, index, err);
        match &err {
            ServiceError::KeyNotFound { current, .. } => {
                tracing::warn!(%id, index, current, "message key unavailable (ordering or replay)");
            },
            ServiceError::AuthenticationFailure { .. } => {
                tracing::warn!(%id, index, "ciphertext rejected (tampering or wrong key)");
            },
            ServiceError::TooFarAhead { current, max_skip, .. } => {
                tracing::warn!(%id, index, current, max_skip, "message index beyond skip limit");
            },
            other => {
                tracing::error!(%id, index, error = %other, "sender key ratchet unusable");
            },
        }
        err
    }
}
