//! Property-based tests for Sender Keys
//!
//! These tests verify the fundamental invariants of the ratchet:
//!
//! 1. **Round-trip**: decrypt(encrypt(m)) == m for every index
//! 2. **Determinism**: the same chain key always yields the same keys
//! 3. **Reconciliation**: any delivery order yields each key exactly once
//! 4. **Forward secrecy**: advanced records hold no earlier chain key

use proptest::prelude::*;
use strand_crypto::{
    ChainKey, KEY_SIZE, MessageKey, NONCE_RANDOM_SIZE, RatchetLimits, SenderKeyError,
    SenderKeyRecord, decrypt_message, encrypt_message, step,
};

fn counting_seed() -> ChainKey {
    let mut seed = [0u8; KEY_SIZE];
    for (i, byte) in seed.iter_mut().enumerate() {
        *byte = i as u8;
    }
    ChainKey::from_bytes(seed)
}

fn decode_key(hex_str: &str) -> [u8; KEY_SIZE] {
    let mut out = [0u8; KEY_SIZE];
    out.copy_from_slice(&hex::decode(hex_str).unwrap());
    out
}

fn sender_keys(seed: &ChainKey, count: u32) -> Vec<MessageKey> {
    let mut record = SenderKeyRecord::new(seed.clone());
    let mut keys = Vec::new();
    for _ in 0..count {
        let advance = record.next_message_key().unwrap();
        keys.push(advance.message_key);
        record = advance.record;
    }
    keys
}

#[test]
fn step_known_answer() {
    let k0 = counting_seed();

    let step0 = step(&k0, 0).unwrap();
    assert_eq!(
        step0.message_key.key(),
        &decode_key("9b4c8120a4823a95f47cde17a244f4507244ee6e3957d1fab9fa29b44d3829b7")
    );
    assert_eq!(
        step0.next_chain_key.as_bytes(),
        &decode_key("4304c22c84a53755ab08ead8d97a8d429be5efa480682d7ad1da27f73e1fbe1d")
    );
}

#[test]
fn advance_known_answer() {
    let advance = SenderKeyRecord::new(counting_seed())
        .advance_to(2, &RatchetLimits::default())
        .unwrap();

    assert_eq!(
        advance.message_key.key(),
        &decode_key("5d2042bf4c603cf3aa7194739ed08bc1c698a7ec7fb8e77d3ea2588c6fe78ce1")
    );
    assert_eq!(advance.record.index(), 3);
    assert_eq!(
        advance.record.chain_key().as_bytes(),
        &decode_key("04428b813675036c07233edd0be13b7c422610a8c3d6ecc7c8fbd85671e47a13")
    );

    let skipped: Vec<_> = advance.record.skipped_keys().collect();
    assert_eq!(skipped.len(), 2);
    assert_eq!(
        skipped[0].key(),
        &decode_key("9b4c8120a4823a95f47cde17a244f4507244ee6e3957d1fab9fa29b44d3829b7")
    );
    assert_eq!(
        skipped[1].key(),
        &decode_key("f7703c39dea9feb30cb6369304ad7b847b9aca58c1152af317aa78a91beddda1")
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_encrypt_decrypt_roundtrip(
        plaintext in prop::collection::vec(any::<u8>(), 0..1000),
        seed in any::<[u8; KEY_SIZE]>(),
        index in 0u32..50,
        random_byte in any::<u8>(),
    ) {
        let message_key = SenderKeyRecord::new(ChainKey::from_bytes(seed))
            .advance_to(index, &RatchetLimits::default())
            .unwrap()
            .message_key;

        let sealed = encrypt_message(&plaintext, &message_key, [random_byte; NONCE_RANDOM_SIZE]);
        let decrypted = decrypt_message(&sealed, &message_key).unwrap();

        prop_assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn prop_step_is_deterministic(seed in any::<[u8; KEY_SIZE]>(), index in any::<u32>()) {
        let chain_key = ChainKey::from_bytes(seed);

        match (step(&chain_key, index), step(&chain_key, index)) {
            (Ok(a), Ok(b)) => {
                prop_assert_eq!(a.message_key.key(), b.message_key.key());
                prop_assert_eq!(a.next_chain_key.as_bytes(), b.next_chain_key.as_bytes());
                prop_assert_eq!(a.next_index, index + 1);
            },
            (Err(_), Err(_)) => prop_assert_eq!(index, u32::MAX),
            _ => prop_assert!(false, "step must be deterministic"),
        }
    }

    #[test]
    fn prop_any_delivery_order_yields_each_key_once(
        order in Just((0u32..20).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        let seed = counting_seed();
        let expected = sender_keys(&seed, 20);
        let limits = RatchetLimits::default();

        let mut receiver = SenderKeyRecord::new(seed);
        for &index in &order {
            let advance = receiver.advance_to(index, &limits).unwrap();
            prop_assert_eq!(advance.message_key.key(), expected[index as usize].key());
            receiver = advance.record;
        }

        // Every skipped key was consumed
        prop_assert_eq!(receiver.skipped_count(), 0);

        // Replaying any index is rejected
        for &index in &order {
            let result = receiver.advance_to(index, &limits);
            let is_not_found = matches!(result, Err(SenderKeyError::KeyNotFound { .. }));
            prop_assert!(is_not_found);
        }
    }

    #[test]
    fn prop_advanced_record_holds_no_earlier_chain_key(
        seed in any::<[u8; KEY_SIZE]>(),
        target in 0u32..40,
    ) {
        let chain_key = ChainKey::from_bytes(seed);
        let mut earlier = vec![chain_key.clone()];
        let mut current = chain_key.clone();
        for index in 0..=target {
            current = step(&current, index).unwrap().next_chain_key;
            earlier.push(current.clone());
        }
        // Last entry is the new chain key itself
        earlier.pop();

        let advance = SenderKeyRecord::new(chain_key)
            .advance_to(target, &RatchetLimits::default())
            .unwrap();

        for old in &earlier {
            prop_assert_ne!(advance.record.chain_key().as_bytes(), old.as_bytes());
            for skipped in advance.record.skipped_keys() {
                prop_assert_ne!(skipped.key(), old.as_bytes());
            }
        }
    }

    #[test]
    fn prop_tampering_is_detected(
        plaintext in prop::collection::vec(any::<u8>(), 1..200),
        flip in any::<prop::sample::Index>(),
    ) {
        let message_key = SenderKeyRecord::new(counting_seed())
            .next_message_key()
            .unwrap()
            .message_key;
        let mut sealed = encrypt_message(&plaintext, &message_key, [0; NONCE_RANDOM_SIZE]);

        let position = flip.index(sealed.len());
        sealed[position] ^= 0x01;

        let result = decrypt_message(&sealed, &message_key);
        let rejected = matches!(result, Err(SenderKeyError::AuthenticationFailed { .. }));
        prop_assert!(rejected);
    }
}
