//! Error types for the Vesper session-state core.
//!
//! Strongly-typed errors for the three failure surfaces: record decoding
//! (`DecodeError`), ratchet state operations (`SessionError`), and store
//! access (`StoreError`). A corrupt record is never treated as a fresh
//! one; decode failures always surface to the caller.

use thiserror::Error;
use vesper_crypto::CryptoError;

/// Errors from parsing a serialized record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Input shorter than the record envelope
    #[error("record truncated: need {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum length of a valid record
        expected: usize,
        /// Length of the rejected input
        actual: usize,
    },

    /// Envelope magic did not match
    #[error("bad record magic: {got:#010x}")]
    BadMagic {
        /// Magic value found in the input
        got: u32,
    },

    /// Record written by an unknown format version
    #[error("unsupported record version: {0}")]
    UnsupportedVersion(u8),

    /// Record body failed CBOR decoding
    #[error("malformed record body: {0}")]
    Body(String),
}

/// Errors from ratchet state operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No session state exists for the requested operation
    #[error("no session state")]
    NoSession,

    /// Sender key record is empty or has no state with the requested id
    #[error("no sender key state for id {key_id:?}")]
    NoSenderKeyState {
        /// Requested state id, `None` when the most-recent state was asked
        /// for and the record was empty
        key_id: Option<u32>,
    },

    /// Receiver-chain catch-up would skip more keys than the cache holds
    ///
    /// Retrying with the same state would re-attempt the same unbounded
    /// work, so callers must not retry without a state change.
    #[error("too many skipped messages: at iteration {current}, need {requested} (max skip {max})")]
    TooManySkippedMessages {
        /// Current chain iteration
        current: u32,
        /// Requested message iteration
        requested: u32,
        /// Maximum permitted skip
        max: u32,
    },

    /// Message key already consumed or evicted from the bounded cache
    ///
    /// Recoverable at the message level: that single message is
    /// undecryptable, the session itself is intact.
    #[error("message key unavailable for iteration {iteration}")]
    ReplayedOrEvictedKey {
        /// Iteration whose key was requested
        iteration: u32,
    },

    /// Key derivation failed
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Record decoding failed
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

impl SessionError {
    /// Returns true if this error is fatal (unrecoverable).
    ///
    /// Fatal errors indicate corruption or a protocol violation. The rest
    /// signal a missing or stale session and are recoverable by a fresh
    /// handshake or, for replayed keys, by dropping the single message.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Crypto(_) | Self::Decode(_) => true,

            Self::NoSession
            | Self::NoSenderKeyState { .. }
            | Self::TooManySkippedMessages { .. }
            | Self::ReplayedOrEvictedKey { .. } => false,
        }
    }
}

/// Errors from store access.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Requested key id does not exist (or was already consumed)
    ///
    /// One-time pre-keys are consumed on use and must not silently
    /// reappear as fresh, so a missing id is an error rather than an
    /// empty record.
    #[error("no such key id: {id}")]
    InvalidKeyId {
        /// The id that was requested
        id: u32,
    },

    /// Stored record failed decoding
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_errors_are_fatal() {
        let err = SessionError::Decode(DecodeError::BadMagic { got: 0 });
        assert!(err.is_fatal());

        let err = SessionError::Crypto(CryptoError::IterationOverflow { current: u32::MAX });
        assert!(err.is_fatal());
    }

    #[test]
    fn missing_state_is_not_fatal() {
        assert!(!SessionError::NoSession.is_fatal());
        assert!(!SessionError::NoSenderKeyState { key_id: Some(3) }.is_fatal());
    }

    #[test]
    fn replayed_key_is_not_fatal() {
        assert!(!SessionError::ReplayedOrEvictedKey { iteration: 500 }.is_fatal());
    }

    #[test]
    fn skipped_bound_is_not_fatal() {
        let err = SessionError::TooManySkippedMessages { current: 0, requested: 5000, max: 2000 };
        assert!(!err.is_fatal());
    }

    #[test]
    fn error_display() {
        let err = SessionError::ReplayedOrEvictedKey { iteration: 7 };
        assert_eq!(err.to_string(), "message key unavailable for iteration 7");

        let err = StoreError::InvalidKeyId { id: 42 };
        assert_eq!(err.to_string(), "no such key id: 42");
    }
}
