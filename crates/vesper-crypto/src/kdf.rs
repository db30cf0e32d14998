//! Root key steps for the Diffie-Hellman ratchet
//!
//! The root key absorbs each DH agreement and yields the next root key
//! plus the initial chain key for the new chain. The agreement bytes are
//! computed by the caller; this module never performs curve math.

use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::chain::ChainKey;

/// Label used for root key derivation
const ROOT_LABEL: &[u8] = b"vesperRootV1";

/// Root key of a pairwise ratchet session.
///
/// Stepped once per DH ratchet turn via [`create_chain`](Self::create_chain).
/// Chain keys handle the per-message symmetric ratchet; the root key only
/// moves when a fresh ephemeral key is seen or sent.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootKey {
    /// Current 32-byte root seed
    key: [u8; 32],
}

impl RootKey {
    /// Create a root key from session-setup key material.
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Current root seed bytes.
    pub fn bytes(&self) -> &[u8; 32] {
        &self.key
    }

    /// Absorb a DH agreement and derive the next (root key, chain key) pair.
    ///
    /// HKDF-SHA256 with the current root key as salt and the agreement as
    /// input key material, expanded to 64 bytes: the first half becomes the
    /// next root key, the second half seeds the new chain at iteration 0.
    ///
    /// Deterministic: both peers computing the same agreement derive the
    /// same pair.
    pub fn create_chain(&self, agreement: &[u8]) -> (RootKey, ChainKey) {
        let hkdf = Hkdf::<Sha256>::new(Some(&self.key), agreement);

        let mut okm = [0u8; 64];
        let Ok(()) = hkdf.expand(ROOT_LABEL, &mut okm) else {
            unreachable!("64 bytes is a valid HKDF-SHA256 output length");
        };

        let mut root = [0u8; 32];
        let mut chain = [0u8; 32];
        root.copy_from_slice(&okm[..32]);
        chain.copy_from_slice(&okm[32..]);
        okm.zeroize();

        (RootKey { key: root }, ChainKey::new(0, chain))
    }
}

impl std::fmt::Debug for RootKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootKey").field("key", &"[REDACTED]").finish()
    }
}

impl Drop for RootKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_root() -> RootKey {
        let mut key = [0u8; 32];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = i as u8;
        }
        RootKey::new(key)
    }

    #[test]
    fn create_chain_is_deterministic() {
        let agreement = [0x42u8; 32];

        let (root_a, chain_a) = test_root().create_chain(&agreement);
        let (root_b, chain_b) = test_root().create_chain(&agreement);

        assert_eq!(root_a.bytes(), root_b.bytes());
        assert_eq!(chain_a.seed(), chain_b.seed());
    }

    #[test]
    fn new_chain_starts_at_iteration_zero() {
        let (_, chain) = test_root().create_chain(&[0x42u8; 32]);
        assert_eq!(chain.iteration(), 0);
    }

    #[test]
    fn next_root_differs_from_current() {
        let root = test_root();
        let (next, _) = root.create_chain(&[0x42u8; 32]);
        assert_ne!(root.bytes(), next.bytes());
    }

    #[test]
    fn root_and_chain_halves_differ() {
        let (root, chain) = test_root().create_chain(&[0x42u8; 32]);
        assert_ne!(root.bytes(), chain.seed());
    }

    #[test]
    fn different_agreements_produce_different_chains() {
        let root = test_root();

        let (_, chain_a) = root.create_chain(&[0x01u8; 32]);
        let (_, chain_b) = root.create_chain(&[0x02u8; 32]);

        assert_ne!(chain_a.seed(), chain_b.seed());
    }

    #[test]
    fn different_roots_produce_different_chains() {
        let agreement = [0x42u8; 32];

        let (_, chain_a) = RootKey::new([1u8; 32]).create_chain(&agreement);
        let (_, chain_b) = RootKey::new([2u8; 32]).create_chain(&agreement);

        assert_ne!(chain_a.seed(), chain_b.seed());
    }

    #[test]
    fn works_with_variable_length_agreement() {
        // Curve implementations differ in point encoding length
        let (_, chain_33) = test_root().create_chain(&[0xAB; 33]);
        let (_, chain_32) = test_root().create_chain(&[0xAB; 32]);
        assert_ne!(chain_32.seed(), chain_33.seed());
    }
}
