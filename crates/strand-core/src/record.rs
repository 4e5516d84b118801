//! Persisted form of a sender key record.
//!
//! Records are stored as
//!
//! ```text
//! {
//!   "chainKey":    "<64 hex chars>",
//!   "keyIdx":      <index>,
//!   "messageKeys": { "<decimal index>": "<64 hex chars>", ... }
//! }
//! ```
//!
//! Backends encode this shape with CBOR. Decoding validates every field so a
//! corrupted record surfaces as [`RecordError`] instead of a bad ratchet.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use strand_crypto::{ChainKey, KEY_SIZE, MessageKey, SenderKeyError, SenderKeyRecord};
use thiserror::Error;
use zeroize::Zeroize;

/// Errors decoding a persisted sender key record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// A key field is not valid hex
    #[error("{field} is not valid hex: {reason}")]
    InvalidHex {
        /// Field that failed to decode
        field: &'static str,
        /// Decoder message
        reason: String,
    },

    /// The stored bytes are not a record at all
    #[error("record does not decode: {0}")]
    Decode(String),

    /// A skipped-key map entry is not a canonical decimal index
    #[error("invalid skipped key index {0:?}")]
    InvalidIndex(String),

    /// Decoded key material failed ratchet validation
    #[error(transparent)]
    Ratchet(#[from] SenderKeyError),
}

/// Serialized sender key record.
///
/// String fields hold key material and are zeroized on drop.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSenderKey {
    /// Hex-encoded chain key
    pub chain_key: String,
    /// Index of the next message key
    pub key_idx: u32,
    /// Skipped message keys: decimal index -> hex-encoded key
    #[serde(default)]
    pub message_keys: BTreeMap<String, String>,
}

impl StoredSenderKey {
    /// Serialize a record.
    pub fn from_record(record: &SenderKeyRecord) -> Self {
        let message_keys = record
            .skipped_keys()
            .map(|key| (key.index().to_string(), hex::encode(key.key())))
            .collect();

        Self {
            chain_key: hex::encode(record.chain_key().as_bytes()),
            key_idx: record.index(),
            message_keys,
        }
    }

    /// Decode and validate into a live record.
    pub fn to_record(&self) -> Result<SenderKeyRecord, RecordError> {
        let chain_key = ChainKey::from_bytes(decode_key("chainKey", &self.chain_key)?);

        let mut skipped = Vec::with_capacity(self.message_keys.len());
        for (encoded, key) in &self.message_keys {
            let index = decode_index(encoded)?;
            skipped.push(MessageKey::from_bytes(decode_key("messageKeys", key)?, index));
        }

        Ok(SenderKeyRecord::from_parts(chain_key, self.key_idx, skipped)?)
    }
}

impl fmt::Debug for StoredSenderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredSenderKey")
            .field("key_idx", &self.key_idx)
            .field("message_keys", &self.message_keys.len())
            .finish_non_exhaustive()
    }
}

impl Drop for StoredSenderKey {
    fn drop(&mut self) {
        self.chain_key.zeroize();
        for key in self.message_keys.values_mut() {
            key.zeroize();
        }
    }
}

fn decode_key(field: &'static str, encoded: &str) -> Result<[u8; KEY_SIZE], RecordError> {
    let mut bytes = [0u8; KEY_SIZE];
    hex::decode_to_slice(encoded, &mut bytes)
        .map_err(|e| RecordError::InvalidHex { field, reason: e.to_string() })?;
    Ok(bytes)
}

/// Parse a skipped-key index, accepting only the form `from_record` writes
/// so that no two map entries can name the same index.
fn decode_index(encoded: &str) -> Result<u32, RecordError> {
    match encoded.parse::<u32>() {
        Ok(index) if index.to_string() == encoded => Ok(index),
        _ => Err(RecordError::InvalidIndex(encoded.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use strand_crypto::RatchetLimits;

    use super::*;

    fn advanced_record() -> SenderKeyRecord {
        SenderKeyRecord::new(ChainKey::from_bytes([9u8; KEY_SIZE]))
            .advance_to(3, &RatchetLimits::default())
            .unwrap()
            .record
    }

    #[test]
    fn stored_form_uses_hex_and_decimal_indices() {
        let stored = StoredSenderKey::from_record(&advanced_record());

        assert_eq!(stored.key_idx, 4);
        assert_eq!(stored.chain_key.len(), 64);
        let indices: Vec<&str> = stored.message_keys.keys().map(String::as_str).collect();
        assert_eq!(indices, vec!["0", "1", "2"]);
        assert!(stored.message_keys.values().all(|key| key.len() == 64));
    }

    #[test]
    fn decoded_record_matches_original() {
        let record = advanced_record();
        let decoded = StoredSenderKey::from_record(&record).to_record().unwrap();

        assert_eq!(decoded.index(), record.index());
        assert_eq!(decoded.chain_key().as_bytes(), record.chain_key().as_bytes());
        let original: Vec<_> = record.skipped_keys().map(|k| (k.index(), *k.key())).collect();
        let restored: Vec<_> = decoded.skipped_keys().map(|k| (k.index(), *k.key())).collect();
        assert_eq!(original, restored);
    }

    #[test]
    fn cbor_field_names_are_camel_case() {
        let stored = StoredSenderKey::from_record(&advanced_record());
        let mut bytes = Vec::new();
        ciborium::into_writer(&stored, &mut bytes).unwrap();

        let value: ciborium::Value = ciborium::from_reader(bytes.as_slice()).unwrap();
        let map = value.as_map().unwrap();
        let names: Vec<&str> = map.iter().filter_map(|(k, _)| k.as_text()).collect();
        assert_eq!(names, vec!["chainKey", "keyIdx", "messageKeys"]);
    }

    #[test]
    fn non_hex_chain_key_is_rejected() {
        let mut stored = StoredSenderKey::from_record(&advanced_record());
        stored.chain_key = "zz".repeat(32);

        let result = stored.to_record();
        assert!(matches!(result, Err(RecordError::InvalidHex { field: "chainKey", .. })));
    }

    #[test]
    fn short_chain_key_is_rejected() {
        let mut stored = StoredSenderKey::from_record(&advanced_record());
        stored.chain_key = "ab".repeat(16);

        assert!(matches!(stored.to_record(), Err(RecordError::InvalidHex { .. })));
    }

    #[test]
    fn non_decimal_index_is_rejected() {
        let mut stored = StoredSenderKey::from_record(&advanced_record());
        stored.message_keys.insert("one".to_string(), "00".repeat(32));

        assert!(matches!(stored.to_record(), Err(RecordError::InvalidIndex(index)) if index == "one"));
    }

    #[test]
    fn non_canonical_indices_are_rejected() {
        for encoded in ["01", "+2", " 3", ""] {
            let mut stored = StoredSenderKey::from_record(&advanced_record());
            stored.message_keys.insert(encoded.to_string(), "00".repeat(32));

            let result = stored.to_record();
            assert!(
                matches!(&result, Err(RecordError::InvalidIndex(index)) if index == encoded),
                "{encoded:?} accepted"
            );
        }
    }

    #[test]
    fn aliased_indices_do_not_drop_keys() {
        let stored = StoredSenderKey {
            chain_key: "11".repeat(32),
            key_idx: 5,
            message_keys: [("1", "aa"), ("01", "bb"), ("+2", "cc")]
                .into_iter()
                .map(|(index, byte)| (index.to_string(), byte.repeat(32)))
                .collect(),
        };

        assert!(matches!(stored.to_record(), Err(RecordError::InvalidIndex(_))));
    }

    #[test]
    fn skipped_key_ahead_of_index_is_rejected() {
        let mut stored = StoredSenderKey::from_record(&advanced_record());
        stored.message_keys.insert("4".to_string(), "00".repeat(32));

        assert!(matches!(
            stored.to_record(),
            Err(RecordError::Ratchet(SenderKeyError::InvalidSkippedIndex { skipped: 4, current: 4 }))
        ));
    }

    #[test]
    fn missing_message_keys_defaults_to_empty() {
        let fresh = StoredSenderKey {
            chain_key: "11".repeat(32),
            key_idx: 0,
            message_keys: BTreeMap::new(),
        };
        let mut bytes = Vec::new();
        ciborium::into_writer(
            &ciborium::Value::Map(vec![
                (ciborium::Value::Text("chainKey".into()), ciborium::Value::Text(fresh.chain_key.clone())),
                (ciborium::Value::Text("keyIdx".into()), ciborium::Value::Integer(0u32.into())),
            ]),
            &mut bytes,
        )
        .unwrap();

        let decoded: StoredSenderKey = ciborium::from_reader(bytes.as_slice()).unwrap();
        assert_eq!(decoded, fresh);
    }
}
