//! Service-level errors.
//!
//! Every variant names the ratchet it concerns so callers and logs can tell
//! which (group, sender) pair failed.

use strand_crypto::SenderKeyError;
use thiserror::Error;

use crate::{RecordError, SenderKeyId, StorageError};

/// Errors returned by [`SenderKeyService`](crate::SenderKeyService).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// No ratchet exists for the pair
    #[error("no sender key record for {id}")]
    RecordNotFound {
        /// Ratchet that was addressed
        id: SenderKeyId,
    },

    /// The message key for `index` was already consumed, evicted, or never
    /// retained
    #[error("message key {index} for {id} is unavailable (current index {current})")]
    KeyNotFound {
        /// Ratchet that was addressed
        id: SenderKeyId,
        /// Requested message index
        index: u32,
        /// Ratchet index at the time of the request
        current: u32,
    },

    /// Ciphertext failed authentication
    #[error("authentication failed for {id} at index {index}")]
    AuthenticationFailure {
        /// Ratchet that was addressed
        id: SenderKeyId,
        /// Claimed message index
        index: u32,
    },

    /// Claimed index is beyond the configured skip limit
    #[error("index {index} for {id} is too far ahead of {current} (limit {max_skip})")]
    TooFarAhead {
        /// Ratchet that was addressed
        id: SenderKeyId,
        /// Claimed message index
        index: u32,
        /// Ratchet index at the time of the request
        current: u32,
        /// Configured skip limit
        max_skip: u32,
    },

    /// Ratchet has produced its last index
    #[error("ratchet for {id} is exhausted at index {current}")]
    IndexExhausted {
        /// Ratchet that was addressed
        id: SenderKeyId,
        /// Final index
        current: u32,
    },

    /// Persisted record could not be decoded
    #[error("invalid record data for {id}: {source}")]
    InvalidRecordData {
        /// Ratchet that was addressed
        id: SenderKeyId,
        /// Decode failure
        source: RecordError,
    },

    /// Storage backend failed
    #[error("storage failure for {id}: {source}")]
    Storage {
        /// Ratchet that was addressed
        id: SenderKeyId,
        /// Backend error
        source: StorageError,
    },
}

impl ServiceError {
    /// Classify a ratchet error raised while processing message `index`.
    pub(crate) fn from_ratchet(id: &SenderKeyId, index: u32, err: SenderKeyError) -> Self {
        let id = id.clone();
        match err {
            SenderKeyError::KeyNotFound { current, requested } => {
                Self::KeyNotFound { id, index: requested, current }
            },
            SenderKeyError::TooFarAhead { current, requested, max_skip } => {
                Self::TooFarAhead { id, index: requested, current, max_skip }
            },
            SenderKeyError::AuthenticationFailed { .. }
            | SenderKeyError::CiphertextTooShort { .. } => Self::AuthenticationFailure { id, index },
            SenderKeyError::IndexOverflow { current } => Self::IndexExhausted { id, current },
            err @ (SenderKeyError::InvalidKeyLength { .. }
            | SenderKeyError::InvalidSkippedIndex { .. }
            | SenderKeyError::DuplicateSkippedIndex { .. }) => {
                Self::InvalidRecordData { id, source: RecordError::Ratchet(err) }
            },
        }
    }

    /// Ratchet this error concerns.
    pub fn id(&self) -> &SenderKeyId {
        match self {
            Self::RecordNotFound { id }
            | Self::KeyNotFound { id, .. }
            | Self::AuthenticationFailure { id, .. }
            | Self::TooFarAhead { id, .. }
            | Self::IndexExhausted { id, .. }
            | Self::InvalidRecordData { id, .. }
            | Self::Storage { id, .. } => id,
        }
    }

    /// Returns true if only the message being processed is lost.
    ///
    /// The ratchet remains usable for other indices. Otherwise the whole pair
    /// is unusable until its record is created, installed or repaired.
    pub fn is_message_failure(&self) -> bool {
        match self {
            Self::KeyNotFound { .. }
            | Self::AuthenticationFailure { .. }
            | Self::TooFarAhead { .. } => true,

            Self::RecordNotFound { .. }
            | Self::IndexExhausted { .. }
            | Self::InvalidRecordData { .. }
            | Self::Storage { .. } => false,
        }
    }
}
