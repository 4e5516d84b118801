//! Chaotic storage wrapper for fault injection testing
//!
//! Wraps another backend and fails operations at a configured rate so tests
//! can check that a failed write never leaves a half-advanced ratchet behind.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{Arc, Mutex, PoisonError};

use super::{Storage, StorageError};
use crate::{GroupId, SenderIdentity, SenderKeyId, StoredSenderKey};

/// Which operations a [`ChaoticStorage`] may fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultTarget {
    /// Reads, writes, deletes and listings
    All,
    /// Only `store_sender_key` and `delete_sender_key`
    Writes,
}

/// Storage wrapper that randomly injects failures
///
/// Delegates to an underlying storage implementation. Failures are drawn from
/// a seeded LCG so a chaos run is reproducible. Clones share the generator and
/// the operation counter.
#[derive(Clone)]
pub struct ChaoticStorage<S: Storage> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    target: FaultTarget,
    state: Arc<Mutex<ChaosState>>,
}

struct ChaosState {
    rng: u64,
    operations: usize,
    injected: usize,
}

impl ChaosState {
    /// Next value in [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // LCG constants from Numerical Recipes
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.rng = (A.wrapping_mul(self.rng).wrapping_add(C)) % M;
        (self.rng as f64) / (M as f64)
    }
}

impl<S: Storage> ChaoticStorage<S> {
    /// Create a wrapper failing any operation with probability `failure_rate`
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Create with explicit seed for reproducible chaos
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            target: FaultTarget::All,
            state: Arc::new(Mutex::new(ChaosState { rng: seed, operations: 0, injected: 0 })),
        }
    }

    /// Restrict injected failures to the given operations.
    #[must_use]
    pub fn targeting(mut self, target: FaultTarget) -> Self {
        self.target = target;
        self
    }

    /// Underlying storage (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total number of storage operations attempted.
    pub fn operation_count(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).operations
    }

    /// Number of operations that were failed on purpose.
    pub fn injected_failures(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).injected
    }

    /// Count the operation and decide whether it fails.
    fn inject(&self, is_write: bool) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.operations += 1;

        let eligible = is_write || self.target == FaultTarget::All;
        if eligible && state.next() < self.failure_rate {
            state.injected += 1;
            return Err(StorageError::Io("chaotic failure injection".to_string()));
        }
        Ok(())
    }
}

impl<S: Storage> Storage for ChaoticStorage<S> {
    fn load_sender_key(&self, id: &SenderKeyId) -> Result<Option<StoredSenderKey>, StorageError> {
        self.inject(false)?;
        self.inner.load_sender_key(id)
    }

    fn store_sender_key(
        &self,
        id: &SenderKeyId,
        record: &StoredSenderKey,
    ) -> Result<(), StorageError> {
        self.inject(true)?;
        self.inner.store_sender_key(id, record)
    }

    fn delete_sender_key(&self, id: &SenderKeyId) -> Result<bool, StorageError> {
        self.inject(true)?;
        self.inner.delete_sender_key(id)
    }

    fn list_senders(&self, group: &GroupId) -> Result<Vec<SenderIdentity>, StorageError> {
        self.inject(false)?;
        self.inner.list_senders(group)
    }
}
