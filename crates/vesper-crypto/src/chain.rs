//! Symmetric chain ratchet for forward-secure message key derivation
//!
//! # Security Properties
//!
//! - Forward Secrecy: superseded chain seeds are zeroized when advancing
//! - Key Uniqueness: each iteration produces a unique message key seed
//! - Determinism: same seed always produces the same key sequence

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::CryptoError;

type HmacSha256 = Hmac<Sha256>;

/// Label for deriving the next chain key
const CHAIN_LABEL: &[u8] = b"chain";

/// Label for deriving a message key seed
const MESSAGE_LABEL: &[u8] = b"message";

/// A message key seed derived from the chain.
///
/// Feeds a single message encryption/decryption in the cipher layer.
/// The state layer caches these for out-of-order delivery and removes
/// them on first use.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderMessageKey {
    /// Chain iteration this seed was derived at
    iteration: u32,
    /// 32-byte seed handed to the cipher layer
    seed: [u8; 32],
}

impl SenderMessageKey {
    /// Reconstruct a cached message key seed.
    pub fn new(iteration: u32, seed: [u8; 32]) -> Self {
        Self { iteration, seed }
    }

    /// Chain iteration this seed was derived at.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// 32-byte seed for the cipher layer.
    pub fn seed(&self) -> &[u8; 32] {
        &self.seed
    }
}

impl std::fmt::Debug for SenderMessageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderMessageKey")
            .field("iteration", &self.iteration)
            .field("seed", &"[REDACTED]")
            .finish()
    }
}

impl Drop for SenderMessageKey {
    fn drop(&mut self) {
        self.seed.zeroize();
    }
}

/// Forward-secure chain key.
///
/// Each [`next()`](Self::next) derives the successor chain key and each
/// [`message_key()`](Self::message_key) derives the per-message seed for
/// the current iteration. Advancing is the caller's replace of `self`
/// with `next()`; the superseded seed is zeroized on drop.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainKey {
    /// Current iteration (number of advances since the chain seed)
    iteration: u32,
    /// Current 32-byte chain seed
    seed: [u8; 32],
}

impl ChainKey {
    /// Create a chain key at a given iteration.
    pub fn new(iteration: u32, seed: [u8; 32]) -> Self {
        Self { iteration, seed }
    }

    /// Current iteration number.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Current chain seed.
    pub fn seed(&self) -> &[u8; 32] {
        &self.seed
    }

    /// Derive the message key seed for the current iteration.
    pub fn message_key(&self) -> SenderMessageKey {
        SenderMessageKey { iteration: self.iteration, seed: self.derive(MESSAGE_LABEL) }
    }

    /// Derive the successor chain key.
    ///
    /// Fails with [`CryptoError::IterationOverflow`] at `u32::MAX` rather
    /// than wrapping; a wrapped iteration would alias cached message keys.
    pub fn next(&self) -> Result<ChainKey, CryptoError> {
        if self.iteration == u32::MAX {
            return Err(CryptoError::IterationOverflow { current: self.iteration });
        }

        Ok(ChainKey { iteration: self.iteration + 1, seed: self.derive(CHAIN_LABEL) })
    }

    fn derive(&self, label: &[u8]) -> [u8; 32] {
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.seed) else {
            unreachable!("HMAC-SHA256 accepts any key size");
        };
        mac.update(label);
        let result = mac.finalize().into_bytes();

        let mut out = [0u8; 32];
        out.copy_from_slice(&result);
        out
    }
}

impl std::fmt::Debug for ChainKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainKey")
            .field("iteration", &self.iteration)
            .field("seed", &"[REDACTED]")
            .finish()
    }
}

impl Drop for ChainKey {
    fn drop(&mut self) {
        self.seed.zeroize();
    }
}
