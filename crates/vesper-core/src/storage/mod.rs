//! Storage contracts for the session-state core.
//!
//! Trait-based persistence interfaces the ratchet components depend on
//! but do not implement. The traits are synchronous: none of the core's
//! operations perform I/O themselves, and callers are required to
//! serialize all operations for a given identity (one worker per peer),
//! so the contracts define no internal locking.
//!
//! # Load semantics
//!
//! `load` on a missing identity returns a *fresh, empty* record for
//! sessions and sender keys: "no session yet" is a normal state the
//! cipher handles by starting a handshake. Key-record stores are the
//! exception: a one-time pre-key is consumed on use and must not
//! silently reappear as fresh, so a missing id is
//! [`StoreError::InvalidKeyId`].
//!
//! # Copy semantics
//!
//! `load` must return an independent copy: in-memory mutation by a
//! caller must not corrupt durable state until `store` is explicitly
//! called. The store is the sole durability boundary; load, mutate,
//! store is the only commit discipline.

mod memory;

use serde::{Deserialize, Serialize};

pub use memory::{
    MemoryDeviceKeyStore, MemoryIdentityKeyStore, MemoryPreKeyStore, MemorySenderKeyStore,
    MemorySessionStore, MemorySignedPreKeyStore,
};

use crate::{
    error::StoreError,
    keys::{DeviceKeyRecord, KeyPair, PreKeyRecord, SignedPreKeyRecord},
    sender_key::SenderKeyRecord,
    session::SessionRecord,
};

/// Address of one remote device: a peer and one of their devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteAddress {
    peer_id: u64,
    device_id: u32,
}

impl RemoteAddress {
    /// Address a (peer, device) pair.
    pub fn new(peer_id: u64, device_id: u32) -> Self {
        Self { peer_id, device_id }
    }

    /// The peer identifier.
    pub fn peer_id(&self) -> u64 {
        self.peer_id
    }

    /// The device identifier within the peer's account.
    pub fn device_id(&self) -> u32 {
        self.device_id
    }
}

impl std::fmt::Display for RemoteAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.peer_id, self.device_id)
    }
}

/// Identity of a group sender: (group, sender, device).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SenderKeyName {
    group_id: u128,
    sender: RemoteAddress,
}

impl SenderKeyName {
    /// Name the sender-key identity for one sender in one group.
    pub fn new(group_id: u128, sender: RemoteAddress) -> Self {
        Self { group_id, sender }
    }

    /// The group identifier.
    pub fn group_id(&self) -> u128 {
        self.group_id
    }

    /// The sending (peer, device) address.
    pub fn sender(&self) -> RemoteAddress {
        self.sender
    }
}

/// Persistence for pairwise session records.
pub trait SessionStore {
    /// Load the session record for an address.
    ///
    /// A missing address yields a fresh record
    /// ([`SessionRecord::is_fresh`] returns true), never an error.
    fn load_session(&self, address: &RemoteAddress) -> Result<SessionRecord, StoreError>;

    /// Device ids of every known session for a peer, for multi-device
    /// fan-out.
    fn get_sub_device_sessions(&self, peer_id: u64) -> Result<Vec<u32>, StoreError>;

    /// Persist the record. This is the commit point of the
    /// load → mutate → store discipline.
    fn store_session(
        &self,
        address: &RemoteAddress,
        record: &SessionRecord,
    ) -> Result<(), StoreError>;

    /// Whether a stored session exists for the address.
    fn contains_session(&self, address: &RemoteAddress) -> Result<bool, StoreError>;

    /// Remove the session for one device.
    fn delete_session(&self, address: &RemoteAddress) -> Result<(), StoreError>;

    /// Remove the sessions for every device of a peer.
    fn delete_all_sessions(&self, peer_id: u64) -> Result<(), StoreError>;
}

/// Persistence for one-time pre-key records.
pub trait PreKeyStore {
    /// Load a one-time pre-key.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidKeyId`] if the id is unknown, including ids
    /// that were consumed. A consumed key cannot be regenerated; the
    /// current decrypt attempt is fatal.
    fn load_pre_key(&self, id: u32) -> Result<PreKeyRecord, StoreError>;

    /// Persist a record under its id.
    fn store_pre_key(&self, id: u32, record: &PreKeyRecord) -> Result<(), StoreError>;

    /// Whether a record exists for the id.
    fn contains_pre_key(&self, id: u32) -> Result<bool, StoreError>;

    /// Consume a one-time pre-key.
    fn remove_pre_key(&self, id: u32) -> Result<(), StoreError>;
}

/// Persistence for signed pre-key records.
pub trait SignedPreKeyStore {
    /// Load a signed pre-key.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidKeyId`] if the id is unknown.
    fn load_signed_pre_key(&self, id: u32) -> Result<SignedPreKeyRecord, StoreError>;

    /// All stored signed pre-keys, for rotation sweeps.
    fn load_signed_pre_keys(&self) -> Result<Vec<SignedPreKeyRecord>, StoreError>;

    /// Persist a record under its id.
    fn store_signed_pre_key(&self, id: u32, record: &SignedPreKeyRecord)
    -> Result<(), StoreError>;

    /// Whether a record exists for the id.
    fn contains_signed_pre_key(&self, id: u32) -> Result<bool, StoreError>;

    /// Rotate out a signed pre-key.
    fn remove_signed_pre_key(&self, id: u32) -> Result<(), StoreError>;
}

/// Persistence for device key records.
pub trait DeviceKeyStore {
    /// Load a device key.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidKeyId`] if the id is unknown.
    fn load_device_key(&self, id: u32) -> Result<DeviceKeyRecord, StoreError>;

    /// Persist a record under its id.
    fn store_device_key(&self, id: u32, record: &DeviceKeyRecord) -> Result<(), StoreError>;

    /// Whether a record exists for the id.
    fn contains_device_key(&self, id: u32) -> Result<bool, StoreError>;

    /// Remove a device key.
    fn remove_device_key(&self, id: u32) -> Result<(), StoreError>;
}

/// Persistence for our identity key and the identities we trust.
pub trait IdentityKeyStore {
    /// Our long-term identity key pair.
    fn identity_key_pair(&self) -> Result<KeyPair, StoreError>;

    /// Our registration id.
    fn local_registration_id(&self) -> Result<u32, StoreError>;

    /// Record the identity key seen for an address.
    ///
    /// Returns true when this *replaced a different* stored key; the
    /// caller surfaces that as a safety-number change.
    fn save_identity(&self, address: &RemoteAddress, identity: &[u8]) -> Result<bool, StoreError>;

    /// Trust-on-first-use check: an unknown address is trusted, a known
    /// address is trusted only with its recorded key.
    fn is_trusted_identity(
        &self,
        address: &RemoteAddress,
        identity: &[u8],
    ) -> Result<bool, StoreError>;

    /// The identity key recorded for an address, if any.
    fn identity(&self, address: &RemoteAddress) -> Result<Option<Vec<u8>>, StoreError>;
}

/// Persistence for group sender-key records.
pub trait SenderKeyStore {
    /// Load the sender-key record for an identity.
    ///
    /// A missing identity yields a fresh empty record ("no key yet"),
    /// never an error.
    fn load_sender_key(&self, name: &SenderKeyName) -> Result<SenderKeyRecord, StoreError>;

    /// Persist the record.
    fn store_sender_key(
        &self,
        name: &SenderKeyName,
        record: &SenderKeyRecord,
    ) -> Result<(), StoreError>;

    /// Whether a stored record exists for the identity.
    fn contains_sender_key(&self, name: &SenderKeyName) -> Result<bool, StoreError>;

    /// Remove the record for an identity.
    fn remove_sender_key(&self, name: &SenderKeyName) -> Result<(), StoreError>;
}
