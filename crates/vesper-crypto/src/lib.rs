//! Vesper Cryptographic Primitives
//!
//! Symmetric building blocks for the Vesper session-state core. Pure
//! functions with deterministic outputs; no I/O and no randomness. Curve
//! math (key-pair generation, Diffie-Hellman agreement) is the caller's
//! capability; this crate only derives key material from bytes it is
//! handed.
//!
//! # Key Lifecycle
//!
//! ```text
//! DH Agreement (caller-supplied bytes)
//!        │
//!        ▼ HKDF
//! Root Key ──► Chain Key (per ratchet step)
//!                  │
//!                  ▼ HMAC advance
//!              Message Key Seeds (one per message)
//! ```
//!
//! Chain keys are advanced with HMAC-SHA256 and the superseded seed is
//! zeroized, so compromise of current state does not reveal past message
//! keys. Message key seeds are used for exactly one decryption and then
//! discarded by the state layer.

pub mod bytes;
pub mod chain;
pub mod error;
pub mod kdf;

pub use bytes::constant_time_eq;
pub use chain::{ChainKey, SenderMessageKey};
pub use error::CryptoError;
pub use kdf::RootKey;
