//! Fuzz target for persisted record decoding
//!
//! Feeds arbitrary field contents to `StoredSenderKey::to_record`.
//!
//! # Invariants
//!
//! - Decoding NEVER panics on malformed hex, indices or key lengths
//! - A record that decodes re-encodes to the same fields
//! - Decoded skipped keys are all behind the decoded index
//! - Every accepted map entry survives decoding (no two entries alias)

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use strand_core::StoredSenderKey;

#[derive(Debug, Clone, Arbitrary)]
struct RecordInput {
    chain_key: String,
    key_idx: u32,
    message_keys: Vec<(String, String)>,
    /// Replace chain key with valid hex of the given bytes
    valid_chain_key: Option<[u8; 32]>,
}

fuzz_target!(|input: RecordInput| {
    let chain_key = match input.valid_chain_key {
        Some(bytes) => bytes.iter().map(|b| format!("{b:02x}")).collect(),
        None => input.chain_key,
    };
    let stored = StoredSenderKey {
        chain_key,
        key_idx: input.key_idx,
        message_keys: input.message_keys.into_iter().collect(),
    };

    let Ok(record) = stored.to_record() else {
        return;
    };

    assert_eq!(record.index(), stored.key_idx);
    assert_eq!(record.skipped_count(), stored.message_keys.len());
    for key in record.skipped_keys() {
        assert!(key.index() < record.index());
    }

    let reencoded = StoredSenderKey::from_record(&record);
    assert_eq!(reencoded.key_idx, stored.key_idx);
    assert_eq!(reencoded.chain_key, stored.chain_key.to_lowercase());
    let indices: Vec<&String> = reencoded.message_keys.keys().collect();
    let original: Vec<&String> = stored.message_keys.keys().collect();
    assert_eq!(indices, original);
});
