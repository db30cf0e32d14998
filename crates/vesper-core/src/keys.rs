//! Durable key records: one-time pre-keys, signed pre-keys, device keys.
//!
//! Each record is an immutable (id, timestamp, key pair, signature) tuple
//! with byte-exact serialization. Records are transparent containers: no
//! signature verification happens here: a record parsed from untrusted
//! bytes must be signature-checked by the caller before use.

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::{
    codec::{decode_record, encode_record},
    error::DecodeError,
};

/// Opaque curve key pair.
///
/// Key bytes are whatever encoding the caller's curve implementation
/// produces; this crate never interprets them. Private bytes are zeroized
/// on drop and redacted from debug output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    /// Public key bytes
    public: Vec<u8>,
    /// Private key bytes
    private: Vec<u8>,
}

impl KeyPair {
    /// Create a key pair from caller-generated curve key bytes.
    pub fn new(public: Vec<u8>, private: Vec<u8>) -> Self {
        Self { public, private }
    }

    /// Public key bytes.
    pub fn public(&self) -> &[u8] {
        &self.public
    }

    /// Private key bytes.
    pub fn private(&self) -> &[u8] {
        &self.private
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("private", &"[REDACTED]")
            .finish()
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        self.private.zeroize();
    }
}

macro_rules! key_record {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            id: u32,
            timestamp: i64,
            key_pair: KeyPair,
            signature: Vec<u8>,
        }

        impl $name {
            /// Create a record at key-generation time.
            ///
            /// `id` is caller-assigned and must be unique within the
            /// record's store.
            pub fn new(id: u32, timestamp: i64, key_pair: KeyPair, signature: Vec<u8>) -> Self {
                Self { id, timestamp, key_pair, signature }
            }

            /// Caller-assigned record id.
            pub fn id(&self) -> u32 {
                self.id
            }

            /// Creation timestamp, milliseconds since the epoch.
            pub fn timestamp(&self) -> i64 {
                self.timestamp
            }

            /// The stored key pair.
            pub fn key_pair(&self) -> &KeyPair {
                &self.key_pair
            }

            /// Signature over the public key, empty when unsigned.
            pub fn signature(&self) -> &[u8] {
                &self.signature
            }

            /// Serialize into the versioned record envelope.
            pub fn serialize(&self) -> Vec<u8> {
                encode_record(self)
            }

            /// Parse from the versioned record envelope.
            pub fn deserialize(bytes: &[u8]) -> Result<Self, DecodeError> {
                decode_record(bytes)
            }
        }
    };
}

key_record! {
    /// One-time pre-key record.
    ///
    /// Published in advance for asynchronous session establishment and
    /// consumed (removed from its store) on first use. One-time pre-keys
    /// are unsigned; the signature field is empty.
    PreKeyRecord
}

key_record! {
    /// Signed pre-key record.
    ///
    /// Medium-lived pre-key whose public half is signed by the identity
    /// key. Rotated out rather than consumed.
    SignedPreKeyRecord
}

key_record! {
    /// Device key record.
    ///
    /// Long-lived per-device key used during multi-device pairing.
    DeviceKeyRecord
}
