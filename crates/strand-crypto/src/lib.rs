//! Strand Cryptographic Primitives
//!
//! Cryptographic building blocks for per-(group, sender) sender keys. Pure
//! functions with deterministic outputs. Callers provide random bytes for
//! deterministic testing.
//!
//! # Key Lifecycle
//!
//! Every sender in a group owns a hash ratchet. The root chain key is 32
//! random bytes generated by the sender and shared with the other members out
//! of band. Each step of the ratchet yields one message key and replaces the
//! chain key.
//!
//! ```text
//! Root Chain Key K_0 (random, shared once)
//!        │
//!        ▼
//! HMAC(K_n, 0x02) → K_{n+1}
//! HMAC(K_n, 0x01) → M_n (message key for index n)
//!        │
//!        ▼
//! AEAD Encryption → Ciphertext (sent together with n)
//! ```
//!
//! # Security
//!
//! Forward Secrecy:
//! - Chain keys are zeroized as soon as the next one has been derived
//! - A message key is kept only while its index is skipped (out-of-order
//!   delivery) and is removed when consumed
//! - `M_n` cannot be recomputed from `K_{n+1}`
//!
//! Sender Isolation:
//! - Each (group, sender) pair has an independent root key
//! - Compromising one ratchet does not expose other senders' messages
//!
//! Authenticity:
//! - XChaCha20-Poly1305 AEAD provides tamper-proof encryption
//! - Nonce binds the ciphertext to its ratchet index
//! - Failed authentication tag -> reject message

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod sender_keys;

pub use sender_keys::{
    Advance, ChainKey, KEY_SIZE, MessageKey, NONCE_RANDOM_SIZE, NONCE_SIZE, RatchetLimits,
    SenderKeyError, SenderKeyRecord, Step, decrypt_message, encrypt_message, step,
};
