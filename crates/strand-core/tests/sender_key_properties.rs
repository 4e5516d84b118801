//! Property-based tests for the sender key service
//!
//! These tests drive a sender and a receiver sharing one chain key through
//! arbitrary delivery orders and check:
//!
//! 1. **Round-trip**: every message decrypts to its plaintext in any order
//! 2. **Single use**: a delivered index can never be decrypted again
//! 3. **Drained state**: once everything is delivered no skipped key remains

use proptest::prelude::*;
use strand_core::{
    GroupCiphertext, GroupId, MemoryStorage, SeededEnv, SenderIdentity, SenderKeyConfig,
    SenderKeyId, SenderKeyService, ServiceError, Storage,
};

type TestService = SenderKeyService<MemoryStorage, SeededEnv>;

fn alice() -> SenderKeyId {
    SenderKeyId::new(GroupId::new("group"), SenderIdentity::new("alice"))
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(future)
}

/// Sender and receiver sharing one chain key, plus `count` sealed messages.
async fn sealed_messages(seed: u64, count: usize) -> (TestService, Vec<GroupCiphertext>) {
    let config = SenderKeyConfig::default();
    let sender = SenderKeyService::new(MemoryStorage::new(), SeededEnv::new(seed), config);
    let receiver = SenderKeyService::new(MemoryStorage::new(), SeededEnv::new(!seed), config);

    let share = sender.create_sender_key(&alice()).await.unwrap();
    receiver.install_sender_key(&alice(), &share).await.unwrap();

    let mut sealed = Vec::with_capacity(count);
    for i in 0..count {
        sealed.push(sender.encrypt(&alice(), &plaintext(i)).await.unwrap());
    }
    (receiver, sealed)
}

fn plaintext(i: usize) -> Vec<u8> {
    format!("message {i}").into_bytes()
}

#[test]
fn in_order_round_trip() {
    block_on(async {
        let (receiver, sealed) = sealed_messages(1, 10).await;

        for (i, message) in sealed.iter().enumerate() {
            assert_eq!(message.index, i as u32);
            let decrypted = receiver.decrypt(&alice(), message.index, &message.ciphertext).await;
            assert_eq!(decrypted.unwrap(), plaintext(i));
        }

        let stored = receiver.storage().load_sender_key(&alice()).unwrap().unwrap();
        assert_eq!(stored.key_idx, 10);
        assert!(stored.message_keys.is_empty());
    });
}

#[test]
fn out_of_order_example() {
    block_on(async {
        let (receiver, sealed) = sealed_messages(2, 3).await;

        receiver.decrypt(&alice(), 2, &sealed[2].ciphertext).await.unwrap();
        let stored = receiver.storage().load_sender_key(&alice()).unwrap().unwrap();
        let skipped: Vec<&str> = stored.message_keys.keys().map(String::as_str).collect();
        assert_eq!(skipped, vec!["0", "1"]);
        assert_eq!(stored.key_idx, 3);

        receiver.decrypt(&alice(), 0, &sealed[0].ciphertext).await.unwrap();
        receiver.decrypt(&alice(), 1, &sealed[1].ciphertext).await.unwrap();

        let stored = receiver.storage().load_sender_key(&alice()).unwrap().unwrap();
        assert!(stored.message_keys.is_empty());
    });
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_any_delivery_order_round_trips(
        seed in any::<u64>(),
        order in Just((0usize..16).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        block_on(async {
            let (receiver, sealed) = sealed_messages(seed, order.len()).await;

            for &i in &order {
                let message = &sealed[i];
                let decrypted = receiver.decrypt(&alice(), message.index, &message.ciphertext).await;
                prop_assert_eq!(decrypted.unwrap(), plaintext(i));
            }

            let stored = receiver.storage().load_sender_key(&alice()).unwrap().unwrap();
            prop_assert!(stored.message_keys.is_empty());
            prop_assert_eq!(stored.key_idx, order.len() as u32);
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn prop_delivered_index_is_never_decrypted_twice(
        seed in any::<u64>(),
        delivered in prop::collection::vec(0usize..12, 1..24),
    ) {
        block_on(async {
            let (receiver, sealed) = sealed_messages(seed, 12).await;
            let mut seen = std::collections::HashSet::new();

            for &i in &delivered {
                let message = &sealed[i];
                let result = receiver.decrypt(&alice(), message.index, &message.ciphertext).await;

                if seen.insert(i) {
                    prop_assert_eq!(result.unwrap(), plaintext(i));
                } else {
                    let is_not_found = matches!(result, Err(ServiceError::KeyNotFound { .. }));
                    prop_assert!(is_not_found);
                }
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
