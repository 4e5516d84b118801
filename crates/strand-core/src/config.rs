//! Service configuration.

use strand_crypto::RatchetLimits;

/// Tunables for a [`SenderKeyService`](crate::SenderKeyService).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderKeyConfig {
    /// Maximum number of indices a single decrypt may skip ahead.
    ///
    /// A ciphertext claiming an index further ahead is rejected with
    /// `TooFarAhead` and leaves the record untouched.
    pub max_skip: u32,

    /// Maximum number of skipped message keys retained per record.
    ///
    /// Once exceeded, the lowest indices are discarded.
    pub max_skipped_keys: usize,
}

impl SenderKeyConfig {
    /// Ratchet limits derived from this configuration.
    pub fn limits(&self) -> RatchetLimits {
        RatchetLimits { max_skip: self.max_skip, max_skipped_keys: self.max_skipped_keys }
    }
}

impl Default for SenderKeyConfig {
    fn default() -> Self {
        let limits = RatchetLimits::default();
        Self { max_skip: limits.max_skip, max_skipped_keys: limits.max_skipped_keys }
    }
}
