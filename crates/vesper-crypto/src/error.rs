//! Error types for symmetric ratchet operations

use thiserror::Error;

/// Errors from chain and root key derivation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Chain iteration would overflow
    #[error("chain iteration overflow at {current}")]
    IterationOverflow {
        /// Current iteration when overflow was detected
        current: u32,
    },

    /// Invalid key material length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length
        expected: usize,
        /// Actual key length
        actual: usize,
    },
}
