//! Hash ratchet stepping for sender keys
//!
//! # Security Properties
//!
//! - Forward Secrecy: the input chain key is never part of the output, and
//!   callers drop (zeroize) it once the step has been taken
//! - Key Uniqueness: each index produces a distinct message key
//! - Determinism: the same chain key always produces the same step

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroize;

use super::error::SenderKeyError;

type HmacSha256 = Hmac<Sha256>;

/// Size in bytes of chain keys and message keys.
pub const KEY_SIZE: usize = 32;

/// HMAC input for deriving a message key
const MESSAGE_KEY_SEED: [u8; 1] = [0x01];

/// HMAC input for deriving the next chain key
const CHAIN_KEY_SEED: [u8; 1] = [0x02];

/// Current position of a sender's hash ratchet.
///
/// Never leaves the process except through an explicit share with other
/// group members. Zeroized on drop.
#[derive(Clone)]
pub struct ChainKey {
    bytes: [u8; KEY_SIZE],
}

impl ChainKey {
    /// Wrap 32 bytes of key material.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Build a chain key from a slice, checking its length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SenderKeyError> {
        let bytes: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| SenderKeyError::InvalidKeyLength { expected: KEY_SIZE, actual: bytes.len() })?;
        Ok(Self { bytes })
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for ChainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChainKey(<redacted>)")
    }
}

impl Drop for ChainKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

/// A message key derived from the ratchet.
///
/// Used for exactly one encryption or decryption, then discarded.
#[derive(Clone)]
pub struct MessageKey {
    /// The 32-byte symmetric key for XChaCha20-Poly1305
    key: [u8; KEY_SIZE],
    /// The ratchet index this key belongs to
    index: u32,
}

impl MessageKey {
    /// Rebuild a message key from persisted bytes.
    pub fn from_bytes(key: [u8; KEY_SIZE], index: u32) -> Self {
        Self { key, index }
    }

    /// 32-byte symmetric key for XChaCha20-Poly1305 AEAD.
    pub fn key(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    /// Ratchet index this key was derived at.
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Debug for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageKey").field("index", &self.index).finish_non_exhaustive()
    }
}

// Implement Drop to zeroize key material
impl Drop for MessageKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Output of a single ratchet step.
#[derive(Debug)]
pub struct Step {
    /// Chain key for `next_index`
    pub next_chain_key: ChainKey,
    /// Message key for the index the step started from
    pub message_key: MessageKey,
    /// Index of the new chain key
    pub next_index: u32,
}

/// Take one step of the ratchet.
///
/// Both derivations are keyed with the same input chain key:
/// `message_key = HMAC-SHA256(chain_key, 0x01)` and
/// `next_chain_key = HMAC-SHA256(chain_key, 0x02)`.
///
/// Fails only when `index` is `u32::MAX`, since the next index would not be
/// representable.
pub fn step(chain_key: &ChainKey, index: u32) -> Result<Step, SenderKeyError> {
    let Some(next_index) = index.checked_add(1) else {
        return Err(SenderKeyError::IndexOverflow { current: index });
    };

    let message_key = MessageKey { key: derive(chain_key, &MESSAGE_KEY_SEED), index };
    let next_chain_key = ChainKey { bytes: derive(chain_key, &CHAIN_KEY_SEED) };

    Ok(Step { next_chain_key, message_key, next_index })
}

fn derive(chain_key: &ChainKey, seed: &[u8]) -> [u8; KEY_SIZE] {
    let Ok(mut mac) = HmacSha256::new_from_slice(&chain_key.bytes) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(seed);
    let result = mac.finalize().into_bytes();

    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&result);
    key
}
