//! Message encryption using `XChaCha20-Poly1305`
//!
//! All functions are pure - random bytes must be provided by the caller.
//! This enables deterministic testing.
//!
//! Sealed layout: `nonce (24 bytes) || ciphertext || tag (16 bytes)`.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};

use super::{error::SenderKeyError, ratchet::MessageKey};

/// Size of the `XChaCha20` nonce (24 bytes)
pub const NONCE_SIZE: usize = 24;

/// Size of the random part of the nonce (20 bytes)
pub const NONCE_RANDOM_SIZE: usize = NONCE_SIZE - INDEX_SIZE;

/// Size of the ratchet index prefix in the nonce
const INDEX_SIZE: usize = 4;

/// Poly1305 tag size (16 bytes)
const POLY1305_TAG_SIZE: usize = 16;

/// Encrypt a message with a single-use message key.
///
/// Returns the sealed bytes (nonce followed by ciphertext and tag).
///
/// # Security
///
/// - Nonce carries the key's ratchet index plus caller-provided randomness
/// - Authenticated encryption prevents tampering
/// - Caller MUST provide cryptographically secure random bytes in production
pub fn encrypt_message(
    plaintext: &[u8],
    message_key: &MessageKey,
    random_suffix: [u8; NONCE_RANDOM_SIZE],
) -> Vec<u8> {
    let nonce = build_nonce(message_key.index(), random_suffix);
    let cipher = XChaCha20Poly1305::new(message_key.key().into());

    let Ok(ciphertext) = cipher.encrypt(XNonce::from_slice(&nonce), plaintext) else {
        unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    sealed
}

/// Decrypt sealed bytes produced by [`encrypt_message`].
///
/// # Errors
///
/// - `CiphertextTooShort`: fewer bytes than a nonce and a tag
/// - `AuthenticationFailed`: index mismatch, wrong key, or tampering
pub fn decrypt_message(sealed: &[u8], message_key: &MessageKey) -> Result<Vec<u8>, SenderKeyError> {
    if sealed.len() < NONCE_SIZE + POLY1305_TAG_SIZE {
        return Err(SenderKeyError::CiphertextTooShort { len: sealed.len() });
    }

    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);

    let mut index_bytes = [0u8; INDEX_SIZE];
    index_bytes.copy_from_slice(&nonce[..INDEX_SIZE]);
    let nonce_index = u32::from_be_bytes(index_bytes);
    if nonce_index != message_key.index() {
        return Err(SenderKeyError::AuthenticationFailed {
            reason: format!(
                "index mismatch: key is {}, message is {}",
                message_key.index(),
                nonce_index
            ),
        });
    }

    let cipher = XChaCha20Poly1305::new(message_key.key().into());

    cipher.decrypt(XNonce::from_slice(nonce), ciphertext).map_err(|_| {
        SenderKeyError::AuthenticationFailed { reason: "authentication failed".to_string() }
    })
}

/// Build a 24-byte nonce for `XChaCha20`.
///
/// Structure:
/// - bytes 0-3: ratchet index (big-endian)
/// - bytes 4-23: random suffix (caller-provided)
fn build_nonce(index: u32, random_suffix: [u8; NONCE_RANDOM_SIZE]) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce[..INDEX_SIZE].copy_from_slice(&index.to_be_bytes());
    nonce[INDEX_SIZE..].copy_from_slice(&random_suffix);
    nonce
}
