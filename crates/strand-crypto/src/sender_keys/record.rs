//! Sender key record and the advance-to-index algorithm
//!
//! A [`SenderKeyRecord`] is the whole ratchet state for one (group, sender)
//! pair: the current chain key, its index, and the message keys of indices
//! that were stepped past but not consumed yet.
//!
//! # Invariants
//!
//! - `index` only moves forward
//! - Every skipped key index is strictly below `index`
//! - A message key is handed out at most once

use std::collections::BTreeMap;

use super::{
    error::SenderKeyError,
    ratchet::{ChainKey, MessageKey, Step, step},
};

/// Default maximum number of keys skipped by a single advance.
const DEFAULT_MAX_SKIP: u32 = 1000;

/// Default maximum number of skipped keys retained per record.
const DEFAULT_MAX_SKIPPED_KEYS: usize = 2000;

/// Bounds on how much work and memory a single record may consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatchetLimits {
    /// Maximum distance between the current index and a requested index.
    pub max_skip: u32,
    /// Maximum number of skipped keys kept. Oldest indices are evicted first.
    pub max_skipped_keys: usize,
}

impl Default for RatchetLimits {
    fn default() -> Self {
        Self { max_skip: DEFAULT_MAX_SKIP, max_skipped_keys: DEFAULT_MAX_SKIPPED_KEYS }
    }
}

/// Result of advancing a record: the new state and the requested key.
#[derive(Debug)]
pub struct Advance {
    /// Record to persist in place of the one that was advanced
    pub record: SenderKeyRecord,
    /// Message key for the requested index
    pub message_key: MessageKey,
}

/// Ratchet state for a single (group, sender) pair.
#[derive(Debug, Clone)]
pub struct SenderKeyRecord {
    chain_key: ChainKey,
    index: u32,
    skipped: BTreeMap<u32, MessageKey>,
}

impl SenderKeyRecord {
    /// Fresh ratchet at index 0.
    pub fn new(chain_key: ChainKey) -> Self {
        Self::at_index(chain_key, 0)
    }

    /// Ratchet positioned at `index` with no skipped keys.
    ///
    /// Used when installing a chain key shared by another member.
    pub fn at_index(chain_key: ChainKey, index: u32) -> Self {
        Self { chain_key, index, skipped: BTreeMap::new() }
    }

    /// Reassemble a record from its persisted parts.
    ///
    /// # Errors
    ///
    /// - `InvalidSkippedIndex` if a skipped key is not behind `index`
    /// - `DuplicateSkippedIndex` if two skipped keys share an index
    pub fn from_parts(
        chain_key: ChainKey,
        index: u32,
        skipped: impl IntoIterator<Item = MessageKey>,
    ) -> Result<Self, SenderKeyError> {
        let mut map = BTreeMap::new();
        for key in skipped {
            if key.index() >= index {
                return Err(SenderKeyError::InvalidSkippedIndex { skipped: key.index(), current: index });
            }
            let skipped_index = key.index();
            if map.insert(skipped_index, key).is_some() {
                return Err(SenderKeyError::DuplicateSkippedIndex { index: skipped_index });
            }
        }

        Ok(Self { chain_key, index, skipped: map })
    }

    /// Current chain key.
    pub fn chain_key(&self) -> &ChainKey {
        &self.chain_key
    }

    /// Index of the next message key this ratchet will produce.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Skipped message keys in ascending index order.
    pub fn skipped_keys(&self) -> impl Iterator<Item = &MessageKey> {
        self.skipped.values()
    }

    /// Number of skipped keys held.
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Whether a skipped key is held for `index`.
    pub fn has_skipped(&self, index: u32) -> bool {
        self.skipped.contains_key(&index)
    }

    /// Produce the next outgoing message key.
    ///
    /// Always exactly one step: the sender never reuses or back-fills an
    /// index, so no skipped keys are added.
    pub fn next_message_key(&self) -> Result<Advance, SenderKeyError> {
        let Step { next_chain_key, message_key, next_index } = step(&self.chain_key, self.index)?;

        let record =
            Self { chain_key: next_chain_key, index: next_index, skipped: self.skipped.clone() };

        Ok(Advance { record, message_key })
    }

    /// Obtain the message key for `target`, stepping forward if needed.
    ///
    /// - `target < index`: the skipped key is removed and returned, or
    ///   `KeyNotFound` if none is held
    /// - `target >= index`: the ratchet steps to `target + 1`; keys for the
    ///   indices walked past are retained as skipped keys
    ///
    /// `self` is left untouched; the returned record replaces it once the
    /// caller has persisted it.
    pub fn advance_to(
        &self,
        target: u32,
        limits: &RatchetLimits,
    ) -> Result<Advance, SenderKeyError> {
        if target < self.index {
            let mut record = self.clone();
            let Some(message_key) = record.skipped.remove(&target) else {
                return Err(SenderKeyError::KeyNotFound { current: self.index, requested: target });
            };
            return Ok(Advance { record, message_key });
        }

        // We verified target >= self.index above, so this won't underflow
        let skip_count = target - self.index;
        if skip_count > limits.max_skip {
            return Err(SenderKeyError::TooFarAhead {
                current: self.index,
                requested: target,
                max_skip: limits.max_skip,
            });
        }

        let mut chain_key = self.chain_key.clone();
        let mut index = self.index;
        let mut skipped = self.skipped.clone();

        loop {
            let Step { next_chain_key, message_key, next_index } = step(&chain_key, index)?;
            // Previous chain key is zeroized on drop here
            chain_key = next_chain_key;
            index = next_index;

            if message_key.index() == target {
                evict_oldest(&mut skipped, limits.max_skipped_keys);
                let record = Self { chain_key, index, skipped };
                return Ok(Advance { record, message_key });
            }

            skipped.insert(message_key.index(), message_key);
        }
    }
}

fn evict_oldest(skipped: &mut BTreeMap<u32, MessageKey>, max: usize) {
    while skipped.len() > max {
        skipped.pop_first();
    }
}
