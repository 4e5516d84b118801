//! Fuzz target for the sender key ratchet
//!
//! Drives a sender and a receiver that share one chain key through arbitrary
//! operation sequences.
//!
//! # Strategy
//!
//! - Arbitrary seeds and starting indices (including near u32::MAX)
//! - Random interleavings of encrypt, in-order and out-of-order decrypt
//! - Replays, forged ciphertexts and far-future indices
//! - Tight skip and retention limits
//!
//! # Invariants
//!
//! - The ratchet never panics
//! - advance_to(n) yields the same key the sender used for n
//! - A delivered index can never be decrypted again
//! - Skipped keys are always behind the current index and within the limit
//! - Corrupted ciphertext fails decryption

#![no_main]

use std::collections::BTreeSet;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use strand_crypto::{
    decrypt_message, encrypt_message, ChainKey, RatchetLimits, SenderKeyError,
    SenderKeyRecord, KEY_SIZE, NONCE_RANDOM_SIZE,
};

#[derive(Debug, Clone, Arbitrary)]
struct SenderKeyScenario {
    /// Initial chain key
    seed: [u8; KEY_SIZE],
    /// Starting index, clamped near the top of the range when `near_max`
    start: u16,
    near_max: bool,
    /// Skip limit (small, to reach the boundary)
    max_skip: u8,
    /// Retention limit
    max_skipped_keys: u8,
    /// Ratchet operations to perform
    operations: Vec<RatchetOperation>,
    /// Random bytes for encryption nonces
    random_bytes: [u8; NONCE_RANDOM_SIZE],
}

#[derive(Debug, Clone, Arbitrary)]
enum RatchetOperation {
    /// Sender seals a message with its next key
    Encrypt { message: Vec<u8> },
    /// Receiver opens the n-th sealed message (modulo count)
    Deliver { which: u16 },
    /// Receiver opens a sealed message with one byte flipped
    DeliverCorrupted { which: u16, position: u16 },
    /// Receiver asks for an index with no message behind it
    AdvanceTo { offset: u16 },
}

fuzz_target!(|scenario: SenderKeyScenario| {
    let start = if scenario.near_max {
        u32::MAX - u32::from(scenario.start % 64)
    } else {
        u32::from(scenario.start)
    };
    let limits = RatchetLimits {
        max_skip: u32::from(scenario.max_skip),
        max_skipped_keys: usize::from(scenario.max_skipped_keys),
    };

    let chain_key = ChainKey::from_bytes(scenario.seed);
    let mut sender = SenderKeyRecord::at_index(chain_key.clone(), start);
    let mut receiver = SenderKeyRecord::at_index(chain_key, start);

    let mut sealed: Vec<(u32, Vec<u8>, Vec<u8>)> = Vec::new();
    let mut delivered = BTreeSet::new();

    for op in scenario.operations {
        match op {
            RatchetOperation::Encrypt { message } => {
                // INVARIANT: encrypt only fails on index exhaustion
                match sender.next_message_key() {
                    Ok(advance) => {
                        let index = advance.message_key.index();
                        assert_eq!(index, sender.index(), "sender reports pre-step index");
                        let ciphertext =
                            encrypt_message(&message, &advance.message_key, scenario.random_bytes);
                        sealed.push((index, message, ciphertext));
                        sender = advance.record;
                    },
                    Err(err) => {
                        assert!(matches!(err, SenderKeyError::IndexOverflow { .. }));
                    },
                }
            },

            RatchetOperation::Deliver { which } => {
                let Some((index, message, ciphertext)) = pick(&sealed, which) else {
                    continue;
                };

                match receiver.advance_to(*index, &limits) {
                    Ok(advance) => {
                        // INVARIANT: a key is handed out at most once
                        assert!(delivered.insert(*index), "index {index} delivered twice");

                        let opened = decrypt_message(ciphertext, &advance.message_key);
                        assert_eq!(opened.as_deref(), Ok(message.as_slice()));
                        receiver = advance.record;
                    },
                    Err(SenderKeyError::KeyNotFound { .. }) => {
                        // Already delivered, evicted, or skipped past before it was sealed
                    },
                    Err(SenderKeyError::TooFarAhead { current, requested, max_skip }) => {
                        assert!(requested - current > max_skip);
                    },
                    Err(SenderKeyError::IndexOverflow { .. }) => {},
                    Err(other) => panic!("unexpected error: {other}"),
                }
            },

            RatchetOperation::DeliverCorrupted { which, position } => {
                let Some((index, _, ciphertext)) = pick(&sealed, which) else {
                    continue;
                };

                let mut corrupted = ciphertext.clone();
                let position = usize::from(position) % corrupted.len();
                corrupted[position] ^= 0x01;

                if let Ok(advance) = receiver.advance_to(*index, &limits) {
                    // INVARIANT: tampering is always detected
                    assert!(decrypt_message(&corrupted, &advance.message_key).is_err());
                    // Record is discarded, exactly as a rejected decrypt would
                }
            },

            RatchetOperation::AdvanceTo { offset } => {
                let target = receiver.index().saturating_add(u32::from(offset));
                if let Ok(advance) = receiver.advance_to(target, &limits) {
                    assert_eq!(advance.message_key.index(), target);
                    assert_eq!(advance.record.index(), target + 1);
                    receiver = advance.record;
                    check_receiver(&receiver, &limits);
                }
            },
        }

        check_receiver(&receiver, &limits);
    }
});

fn pick<T>(items: &[T], which: u16) -> Option<&T> {
    if items.is_empty() {
        return None;
    }
    items.get(usize::from(which) % items.len())
}

fn check_receiver(receiver: &SenderKeyRecord, limits: &RatchetLimits) {
    // INVARIANT: skipped keys are behind the index and bounded
    assert!(receiver.skipped_count() <= limits.max_skipped_keys);
    for key in receiver.skipped_keys() {
        assert!(key.index() < receiver.index());
    }
}
