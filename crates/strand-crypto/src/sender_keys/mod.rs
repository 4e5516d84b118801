//! Sender Keys: per-(group, sender) symmetric ratchets
//!
//! Every group member encrypts with its own hash ratchet, so a message is
//! sealed once for the whole group instead of once per recipient.
//!
//! # Architecture
//!
//! ```text
//! ChainKey (index n)
//!        │
//!        ▼ step
//! (ChainKey n+1, MessageKey n)
//!        │
//!        ▼ SenderKeyRecord::advance_to
//! MessageKey[target] + skipped keys for the gap
//!        │
//!        ▼ encrypt_message / decrypt_message
//! XChaCha20-Poly1305 Ciphertext
//! ```
//!
//! The record operations are pure: they return a new [`SenderKeyRecord`]
//! and leave the input untouched, so the caller decides when (and whether)
//! the new state is persisted.

pub mod encryption;
pub mod error;
pub mod ratchet;
pub mod record;

pub use encryption::{NONCE_RANDOM_SIZE, NONCE_SIZE, decrypt_message, encrypt_message};
pub use error::SenderKeyError;
pub use ratchet::{ChainKey, KEY_SIZE, MessageKey, Step, step};
pub use record::{Advance, RatchetLimits, SenderKeyRecord};
