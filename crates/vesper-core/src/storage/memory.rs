//! In-memory store implementations for testing and simulation.
//!
//! Each store keeps *serialized* records and re-decodes on load, so every
//! `load` hands out an independent copy: mutating a loaded record cannot
//! corrupt the stored one until `store` commits it. State lives behind
//! `Arc<Mutex<_>>` so clones share the underlying map.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use vesper_crypto::constant_time_eq;

use super::{
    DeviceKeyStore, IdentityKeyStore, PreKeyStore, RemoteAddress, SenderKeyName, SenderKeyStore,
    SessionStore, SignedPreKeyStore,
};
use crate::{
    error::StoreError,
    keys::{DeviceKeyRecord, KeyPair, PreKeyRecord, SignedPreKeyRecord},
    sender_key::SenderKeyRecord,
    session::SessionRecord,
};

/// In-memory [`SessionStore`].
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<Mutex<HashMap<RemoteAddress, Vec<u8>>>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for
    /// test/simulation code.
    #[allow(clippy::expect_used)]
    fn load_session(&self, address: &RemoteAddress) -> Result<SessionRecord, StoreError> {
        let sessions = self.sessions.lock().expect("Mutex poisoned");

        match sessions.get(address) {
            Some(bytes) => Ok(SessionRecord::deserialize(bytes)?),
            None => Ok(SessionRecord::new_fresh()),
        }
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for
    /// test/simulation code.
    #[allow(clippy::expect_used)]
    fn get_sub_device_sessions(&self, peer_id: u64) -> Result<Vec<u32>, StoreError> {
        let sessions = self.sessions.lock().expect("Mutex poisoned");

        Ok(sessions
            .keys()
            .filter(|address| address.peer_id() == peer_id)
            .map(RemoteAddress::device_id)
            .collect())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for
    /// test/simulation code.
    #[allow(clippy::expect_used)]
    fn store_session(
        &self,
        address: &RemoteAddress,
        record: &SessionRecord,
    ) -> Result<(), StoreError> {
        self.sessions.lock().expect("Mutex poisoned").insert(*address, record.serialize());
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for
    /// test/simulation code.
    #[allow(clippy::expect_used)]
    fn contains_session(&self, address: &RemoteAddress) -> Result<bool, StoreError> {
        Ok(self.sessions.lock().expect("Mutex poisoned").contains_key(address))
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for
    /// test/simulation code.
    #[allow(clippy::expect_used)]
    fn delete_session(&self, address: &RemoteAddress) -> Result<(), StoreError> {
        self.sessions.lock().expect("Mutex poisoned").remove(address);
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for
    /// test/simulation code.
    #[allow(clippy::expect_used)]
    fn delete_all_sessions(&self, peer_id: u64) -> Result<(), StoreError> {
        self.sessions
            .lock()
            .expect("Mutex poisoned")
            .retain(|address, _| address.peer_id() != peer_id);
        Ok(())
    }
}

macro_rules! keyed_record_store {
    ($(#[$doc:meta])* $store:ident, $trait:ident, $record:ty,
     $load:ident, $store_fn:ident, $contains:ident, $remove:ident) => {
        $(#[$doc])*
        #[derive(Clone, Default)]
        pub struct $store {
            records: Arc<Mutex<HashMap<u32, Vec<u8>>>>,
        }

        impl $store {
            /// Create an empty store.
            pub fn new() -> Self {
                Self::default()
            }
        }

        impl $trait for $store {
            /// # Panics
            ///
            /// Panics if the internal mutex is poisoned. This is
            /// acceptable for test/simulation code.
            #[allow(clippy::expect_used)]
            fn $load(&self, id: u32) -> Result<$record, StoreError> {
                let records = self.records.lock().expect("Mutex poisoned");

                let bytes = records.get(&id).ok_or(StoreError::InvalidKeyId { id })?;
                Ok(<$record>::deserialize(bytes)?)
            }

            /// # Panics
            ///
            /// Panics if the internal mutex is poisoned. This is
            /// acceptable for test/simulation code.
            #[allow(clippy::expect_used)]
            fn $store_fn(&self, id: u32, record: &$record) -> Result<(), StoreError> {
                self.records.lock().expect("Mutex poisoned").insert(id, record.serialize());
                Ok(())
            }

            /// # Panics
            ///
            /// Panics if the internal mutex is poisoned. This is
            /// acceptable for test/simulation code.
            #[allow(clippy::expect_used)]
            fn $contains(&self, id: u32) -> Result<bool, StoreError> {
                Ok(self.records.lock().expect("Mutex poisoned").contains_key(&id))
            }

            /// # Panics
            ///
            /// Panics if the internal mutex is poisoned. This is
            /// acceptable for test/simulation code.
            #[allow(clippy::expect_used)]
            fn $remove(&self, id: u32) -> Result<(), StoreError> {
                self.records.lock().expect("Mutex poisoned").remove(&id);
                Ok(())
            }
        }
    };
}

keyed_record_store! {
    /// In-memory [`PreKeyStore`].
    ///
    /// A removed (consumed) id fails subsequent loads with
    /// [`StoreError::InvalidKeyId`]; consumed one-time pre-keys never
    /// reappear as fresh.
    MemoryPreKeyStore, PreKeyStore, PreKeyRecord,
    load_pre_key, store_pre_key, contains_pre_key, remove_pre_key
}

keyed_record_store! {
    /// In-memory [`DeviceKeyStore`].
    MemoryDeviceKeyStore, DeviceKeyStore, DeviceKeyRecord,
    load_device_key, store_device_key, contains_device_key, remove_device_key
}

/// In-memory [`SignedPreKeyStore`].
#[derive(Clone, Default)]
pub struct MemorySignedPreKeyStore {
    records: Arc<Mutex<HashMap<u32, Vec<u8>>>>,
}

impl MemorySignedPreKeyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SignedPreKeyStore for MemorySignedPreKeyStore {
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for
    /// test/simulation code.
    #[allow(clippy::expect_used)]
    fn load_signed_pre_key(&self, id: u32) -> Result<SignedPreKeyRecord, StoreError> {
        let records = self.records.lock().expect("Mutex poisoned");

        let bytes = records.get(&id).ok_or(StoreError::InvalidKeyId { id })?;
        Ok(SignedPreKeyRecord::deserialize(bytes)?)
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for
    /// test/simulation code.
    #[allow(clippy::expect_used)]
    fn load_signed_pre_keys(&self) -> Result<Vec<SignedPreKeyRecord>, StoreError> {
        let records = self.records.lock().expect("Mutex poisoned");

        records.values().map(|bytes| Ok(SignedPreKeyRecord::deserialize(bytes)?)).collect()
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for
    /// test/simulation code.
    #[allow(clippy::expect_used)]
    fn store_signed_pre_key(
        &self,
        id: u32,
        record: &SignedPreKeyRecord,
    ) -> Result<(), StoreError> {
        self.records.lock().expect("Mutex poisoned").insert(id, record.serialize());
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for
    /// test/simulation code.
    #[allow(clippy::expect_used)]
    fn contains_signed_pre_key(&self, id: u32) -> Result<bool, StoreError> {
        Ok(self.records.lock().expect("Mutex poisoned").contains_key(&id))
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for
    /// test/simulation code.
    #[allow(clippy::expect_used)]
    fn remove_signed_pre_key(&self, id: u32) -> Result<(), StoreError> {
        self.records.lock().expect("Mutex poisoned").remove(&id);
        Ok(())
    }
}

/// In-memory [`SenderKeyStore`].
#[derive(Clone, Default)]
pub struct MemorySenderKeyStore {
    records: Arc<Mutex<HashMap<SenderKeyName, Vec<u8>>>>,
}

impl MemorySenderKeyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SenderKeyStore for MemorySenderKeyStore {
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for
    /// test/simulation code.
    #[allow(clippy::expect_used)]
    fn load_sender_key(&self, name: &SenderKeyName) -> Result<SenderKeyRecord, StoreError> {
        let records = self.records.lock().expect("Mutex poisoned");

        match records.get(name) {
            Some(bytes) => Ok(SenderKeyRecord::deserialize(bytes)?),
            None => Ok(SenderKeyRecord::new()),
        }
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for
    /// test/simulation code.
    #[allow(clippy::expect_used)]
    fn store_sender_key(
        &self,
        name: &SenderKeyName,
        record: &SenderKeyRecord,
    ) -> Result<(), StoreError> {
        self.records.lock().expect("Mutex poisoned").insert(*name, record.serialize());
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for
    /// test/simulation code.
    #[allow(clippy::expect_used)]
    fn contains_sender_key(&self, name: &SenderKeyName) -> Result<bool, StoreError> {
        Ok(self.records.lock().expect("Mutex poisoned").contains_key(name))
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for
    /// test/simulation code.
    #[allow(clippy::expect_used)]
    fn remove_sender_key(&self, name: &SenderKeyName) -> Result<(), StoreError> {
        self.records.lock().expect("Mutex poisoned").remove(name);
        Ok(())
    }
}

/// In-memory [`IdentityKeyStore`] with trust-on-first-use semantics.
#[derive(Clone)]
pub struct MemoryIdentityKeyStore {
    identity_key_pair: KeyPair,
    registration_id: u32,
    trusted: Arc<Mutex<HashMap<RemoteAddress, Vec<u8>>>>,
}

impl MemoryIdentityKeyStore {
    /// Create a store around our local identity.
    pub fn new(identity_key_pair: KeyPair, registration_id: u32) -> Self {
        Self { identity_key_pair, registration_id, trusted: Arc::new(Mutex::new(HashMap::new())) }
    }
}

impl IdentityKeyStore for MemoryIdentityKeyStore {
    fn identity_key_pair(&self) -> Result<KeyPair, StoreError> {
        Ok(self.identity_key_pair.clone())
    }

    fn local_registration_id(&self) -> Result<u32, StoreError> {
        Ok(self.registration_id)
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for
    /// test/simulation code.
    #[allow(clippy::expect_used)]
    fn save_identity(&self, address: &RemoteAddress, identity: &[u8]) -> Result<bool, StoreError> {
        let mut trusted = self.trusted.lock().expect("Mutex poisoned");

        let replaced = trusted
            .get(address)
            .is_some_and(|known| !constant_time_eq(known, identity));
        trusted.insert(*address, identity.to_vec());

        Ok(replaced)
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for
    /// test/simulation code.
    #[allow(clippy::expect_used)]
    fn is_trusted_identity(
        &self,
        address: &RemoteAddress,
        identity: &[u8],
    ) -> Result<bool, StoreError> {
        let trusted = self.trusted.lock().expect("Mutex poisoned");

        Ok(match trusted.get(address) {
            Some(known) => constant_time_eq(known, identity),
            None => true,
        })
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for
    /// test/simulation code.
    #[allow(clippy::expect_used)]
    fn identity(&self, address: &RemoteAddress) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.trusted.lock().expect("Mutex poisoned").get(address).cloned())
    }
}

#[cfg(test)]
mod tests {
    use vesper_crypto::ChainKey;

    use super::*;

    fn test_key_pair(tag: u8) -> KeyPair {
        KeyPair::new(vec![tag; 33], vec![tag; 32])
    }

    fn test_address() -> RemoteAddress {
        RemoteAddress::new(42, 1)
    }

    #[test]
    fn load_missing_session_is_fresh() {
        let store = MemorySessionStore::new();
        let record = store.load_session(&test_address()).unwrap();
        assert!(record.is_fresh());
    }

    #[test]
    fn session_store_round_trip() {
        let store = MemorySessionStore::new();
        let address = test_address();

        let mut record = SessionRecord::new_fresh();
        record.current_state_mut().set_local_registration_id(7);
        store.store_session(&address, &record).unwrap();

        let loaded = store.load_session(&address).unwrap();
        assert_eq!(loaded.current_state().local_registration_id(), 7);
        assert!(store.contains_session(&address).unwrap());
    }

    #[test]
    fn load_returns_independent_copies() {
        let store = MemorySessionStore::new();
        let address = test_address();

        let mut record = SessionRecord::new_fresh();
        record.current_state_mut().set_local_registration_id(7);
        store.store_session(&address, &record).unwrap();

        // Mutate a loaded copy without storing it back
        let mut loaded = store.load_session(&address).unwrap();
        loaded.current_state_mut().set_local_registration_id(99);

        // Durable state is unchanged until store() commits
        let reloaded = store.load_session(&address).unwrap();
        assert_eq!(reloaded.current_state().local_registration_id(), 7);
    }

    #[test]
    fn sub_device_sessions_for_peer() {
        let store = MemorySessionStore::new();
        let record = SessionRecord::new_fresh();

        store.store_session(&RemoteAddress::new(42, 1), &record).unwrap();
        store.store_session(&RemoteAddress::new(42, 3), &record).unwrap();
        store.store_session(&RemoteAddress::new(99, 1), &record).unwrap();

        let mut devices = store.get_sub_device_sessions(42).unwrap();
        devices.sort_unstable();
        assert_eq!(devices, vec![1, 3]);
    }

    #[test]
    fn delete_all_sessions_clears_only_that_peer() {
        let store = MemorySessionStore::new();
        let record = SessionRecord::new_fresh();

        store.store_session(&RemoteAddress::new(42, 1), &record).unwrap();
        store.store_session(&RemoteAddress::new(42, 2), &record).unwrap();
        store.store_session(&RemoteAddress::new(99, 1), &record).unwrap();

        store.delete_all_sessions(42).unwrap();

        assert!(!store.contains_session(&RemoteAddress::new(42, 1)).unwrap());
        assert!(!store.contains_session(&RemoteAddress::new(42, 2)).unwrap());
        assert!(store.contains_session(&RemoteAddress::new(99, 1)).unwrap());
    }

    #[test]
    fn missing_pre_key_is_invalid_key_id() {
        let store = MemoryPreKeyStore::new();
        let result = store.load_pre_key(7);
        assert_eq!(result.err(), Some(StoreError::InvalidKeyId { id: 7 }));
    }

    #[test]
    fn consumed_pre_key_does_not_reappear() {
        let store = MemoryPreKeyStore::new();
        let record = PreKeyRecord::new(7, 0, test_key_pair(1), Vec::new());

        store.store_pre_key(7, &record).unwrap();
        assert!(store.contains_pre_key(7).unwrap());

        store.remove_pre_key(7).unwrap();
        assert!(!store.contains_pre_key(7).unwrap());
        assert_eq!(store.load_pre_key(7).err(), Some(StoreError::InvalidKeyId { id: 7 }));
    }

    #[test]
    fn signed_pre_key_store_lists_all() {
        let store = MemorySignedPreKeyStore::new();

        for id in [1u32, 2, 3] {
            let record = SignedPreKeyRecord::new(id, 0, test_key_pair(id as u8), vec![0xA5]);
            store.store_signed_pre_key(id, &record).unwrap();
        }

        let mut ids: Vec<u32> =
            store.load_signed_pre_keys().unwrap().iter().map(SignedPreKeyRecord::id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn device_key_store_round_trip() {
        let store = MemoryDeviceKeyStore::new();
        let record = DeviceKeyRecord::new(1, 99, test_key_pair(1), vec![1, 2, 3]);

        store.store_device_key(1, &record).unwrap();
        assert_eq!(store.load_device_key(1).unwrap(), record);

        store.remove_device_key(1).unwrap();
        assert_eq!(store.load_device_key(1).err(), Some(StoreError::InvalidKeyId { id: 1 }));
    }

    #[test]
    fn load_missing_sender_key_is_empty_record() {
        let store = MemorySenderKeyStore::new();
        let name = SenderKeyName::new(1, test_address());

        let record = store.load_sender_key(&name).unwrap();
        assert!(record.is_empty());
        assert!(!store.contains_sender_key(&name).unwrap());
    }

    #[test]
    fn sender_key_store_round_trip() {
        let store = MemorySenderKeyStore::new();
        let name = SenderKeyName::new(1, test_address());

        let mut record = SenderKeyRecord::new();
        record.add_state(3, 0, [1u8; 32], vec![0x05; 33], None);
        store.store_sender_key(&name, &record).unwrap();

        let loaded = store.load_sender_key(&name).unwrap();
        assert_eq!(loaded.state().unwrap().key_id(), 3);
        assert_eq!(loaded.state().unwrap().chain_key(), &ChainKey::new(0, [1u8; 32]));
    }

    #[test]
    fn identity_store_trust_on_first_use() {
        let store = MemoryIdentityKeyStore::new(test_key_pair(9), 1234);
        let address = test_address();

        assert_eq!(store.local_registration_id().unwrap(), 1234);
        assert!(store.identity(&address).unwrap().is_none());

        // Unknown address: trusted, and first save is not a change
        assert!(store.is_trusted_identity(&address, &[1u8; 33]).unwrap());
        assert!(!store.save_identity(&address, &[1u8; 33]).unwrap());

        // Known address: only the recorded key is trusted
        assert!(store.is_trusted_identity(&address, &[1u8; 33]).unwrap());
        assert!(!store.is_trusted_identity(&address, &[2u8; 33]).unwrap());

        // Replacing with a different key reports the change
        assert!(store.save_identity(&address, &[2u8; 33]).unwrap());
        assert_eq!(store.identity(&address).unwrap(), Some(vec![2u8; 33]));
    }
}
