//! Error types for Sender Keys operations

use thiserror::Error;

/// Errors from sender key operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SenderKeyError {
    /// Requested index is behind the ratchet and no skipped key is held for
    /// it (already consumed, evicted, or never produced)
    #[error("message key not found: index {requested} is behind current index {current}")]
    KeyNotFound {
        /// Current ratchet index
        current: u32,
        /// Requested index
        requested: u32,
    },

    /// Requested index is further ahead than the configured skip limit
    #[error("index too far ahead: at {current}, requested {requested}, limit {max_skip}")]
    TooFarAhead {
        /// Current ratchet index
        current: u32,
        /// Requested index
        requested: u32,
        /// Maximum number of keys that may be skipped in one advance
        max_skip: u32,
    },

    /// Decryption failed (authentication tag mismatch)
    #[error("authentication failed: {reason}")]
    AuthenticationFailed {
        /// Reason for decryption failure
        reason: String,
    },

    /// Ciphertext cannot even hold a nonce and tag
    #[error("ciphertext too short: {len} bytes")]
    CiphertextTooShort {
        /// Length of the rejected ciphertext
        len: usize,
    },

    /// Invalid key material length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length
        expected: usize,
        /// Actual key length
        actual: usize,
    },

    /// Ratchet index would overflow
    #[error("ratchet index overflow at {current}")]
    IndexOverflow {
        /// Current index when overflow was detected
        current: u32,
    },

    /// A skipped key is stored at or ahead of the current index
    #[error("skipped key at index {skipped} is not behind current index {current}")]
    InvalidSkippedIndex {
        /// Index of the offending skipped key
        skipped: u32,
        /// Current ratchet index
        current: u32,
    },

    /// Two skipped keys claim the same index
    #[error("duplicate skipped key at index {index}")]
    DuplicateSkippedIndex {
        /// Index held more than once
        index: u32,
    },
}

impl SenderKeyError {
    /// Returns true if the error only concerns the message being processed.
    ///
    /// The ratchet itself is still usable afterwards. The remaining errors
    /// mean the record is exhausted or malformed.
    pub fn is_message_failure(&self) -> bool {
        match self {
            Self::KeyNotFound { .. }
            | Self::TooFarAhead { .. }
            | Self::AuthenticationFailed { .. }
            | Self::CiphertextTooShort { .. } => true,

            Self::InvalidKeyLength { .. }
            | Self::IndexOverflow { .. }
            | Self::InvalidSkippedIndex { .. }
            | Self::DuplicateSkippedIndex { .. } => false,
        }
    }
}
