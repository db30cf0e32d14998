//! Pairwise double-ratchet session state.
//!
//! One [`SessionRecord`] exists per (peer, device). The record holds the
//! current [`SessionState`] plus a bounded archive of previous states:
//! a peer may restart a session while old messages are still in flight,
//! and those messages must stay decryptable against the superseded state
//! until the archive evicts it.
//!
//! The DH/KDF transitions that *produce* chain material live in the
//! cipher layer; this module owns the state shape, the bounded caches,
//! and the replay discipline (a message key, once extracted, is gone).

pub mod record;
pub mod state;

pub use record::SessionRecord;
pub use state::{PendingKeyExchange, PendingPreKey, SessionState};
