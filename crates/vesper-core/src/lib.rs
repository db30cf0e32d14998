//! Vesper Session-State Core
//!
//! The durable, per-peer and per-group cryptographic ratchet state of an
//! end-to-end encrypted messaging protocol: pairwise double-ratchet
//! session records, group sender-key records, pre-key record lifecycle,
//! and the store contracts these components require.
//!
//! A higher-level cipher loads a record from its store, asks the current
//! state for chain/message keys, mutates the state in place, and writes
//! the record back; the store is the sole durability boundary. This
//! crate performs no I/O and no curve math: Diffie-Hellman agreements
//! arrive as opaque bytes, and everything here is a pure in-memory
//! transformation over them.
//!
//! # Concurrency
//!
//! The core is single-threaded per identity by contract. Ratchet
//! mutation is not commutative (chain advancement order matters), so
//! callers serialize all operations for a given (peer, device) or
//! (group, sender, device), one worker queue per peer. Operations on
//! different identities share no state and run freely in parallel. The
//! core takes no locks of its own; a caller that races two mutations of
//! the same identity gets duplicate chain use, which is a caller bug,
//! not something this layer can repair.
//!
//! # Bounded memory
//!
//! Every cache in this crate is bounded with oldest-first eviction:
//! message-key caches (2000 per chain), sender-key states (5 per
//! record), receiver chains (5 per session), archived session states
//! (5 per record). Reordering tolerance is a window, not a promise.

pub mod codec;
pub mod error;
pub mod keys;
pub mod sender_key;
pub mod session;
pub mod storage;

pub use error::{DecodeError, SessionError, StoreError};
pub use keys::{DeviceKeyRecord, KeyPair, PreKeyRecord, SignedPreKeyRecord};
pub use sender_key::{SenderKeyRecord, SenderKeyState};
pub use session::{PendingKeyExchange, PendingPreKey, SessionRecord, SessionState};
pub use storage::{
    DeviceKeyStore, IdentityKeyStore, MemoryDeviceKeyStore, MemoryIdentityKeyStore,
    MemoryPreKeyStore, MemorySenderKeyStore, MemorySessionStore, MemorySignedPreKeyStore,
    PreKeyStore, RemoteAddress, SenderKeyName, SenderKeyStore, SessionStore, SignedPreKeyStore,
};
