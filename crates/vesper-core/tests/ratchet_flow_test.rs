//! End-to-end flow over the state core: two peers sharing derived chain
//! material, out-of-order delivery, a session restart mid-flight, and the
//! load → mutate → store discipline against the in-memory stores.
//!
//! Curve math stays out of scope: both sides are handed the same
//! "agreement" bytes, as the cipher layer would after a real DH.

use vesper_core::{
    KeyPair, MemoryPreKeyStore, MemorySessionStore, PreKeyRecord, PreKeyStore, RemoteAddress,
    SessionRecord, SessionStore, StoreError,
};
use vesper_crypto::RootKey;

fn shared_agreement() -> Vec<u8> {
    hex::decode("4242424242424242424242424242424242424242424242424242424242424242")
        .expect("valid hex fixture")
}

fn alice_ratchet_key() -> KeyPair {
    KeyPair::new(vec![0xA1; 33], vec![0xA2; 32])
}

#[test]
fn paired_sessions_derive_identical_message_keys() {
    let root = RootKey::new([1u8; 32]);

    // Both sides step the same root with the same agreement
    let (_, alice_chain) = root.create_chain(&shared_agreement());
    let (_, bob_chain) = root.create_chain(&shared_agreement());

    let mut alice = SessionRecord::new_fresh();
    alice.current_state_mut().set_sender_chain(alice_ratchet_key(), alice_chain);

    let mut bob = SessionRecord::new_fresh();
    bob.current_state_mut().add_receiver_chain(vec![0xA1; 33], bob_chain);

    // Alice sends five messages; delivery reorders them
    let mut outgoing = Vec::new();
    for _ in 0..5 {
        outgoing.push(alice.current_state_mut().advance_sender_chain().unwrap());
    }

    for counter in [4u32, 0, 2, 1, 3] {
        let key = bob.current_state_mut().message_key_for(&[0xA1; 33], counter).unwrap();
        assert_eq!(key.seed(), outgoing[counter as usize].seed());
    }
}

#[test]
fn session_restart_keeps_old_messages_decryptable() {
    let root = RootKey::new([1u8; 32]);
    let (_, bob_chain) = root.create_chain(&shared_agreement());

    let store = MemorySessionStore::new();
    let address = RemoteAddress::new(7, 1);

    // Bob establishes a session and persists it
    let mut bob = store.load_session(&address).unwrap();
    bob.current_state_mut().add_receiver_chain(vec![0xA1; 33], bob_chain);
    store.store_session(&address, &bob).unwrap();

    // Alice restarts her session while message 3 is still in flight.
    // Bob archives and starts over.
    let mut bob = store.load_session(&address).unwrap();
    bob.archive_current_state();
    let (_, new_chain) = RootKey::new([2u8; 32]).create_chain(&shared_agreement());
    bob.current_state_mut().add_receiver_chain(vec![0xB1; 33], new_chain);
    store.store_session(&address, &bob).unwrap();

    // The late message from the old session still decrypts via the archive
    let mut bob = store.load_session(&address).unwrap();
    assert!(!bob.current_state().has_receiver_chain(&[0xA1; 33]));

    let archived = bob.previous_state_mut(0).unwrap();
    let key = archived.message_key_for(&[0xA1; 33], 3).unwrap();
    assert_eq!(key.iteration(), 3);

    // The archived state that decrypted becomes current again
    bob.promote_state(0).unwrap();
    assert!(bob.current_state().has_receiver_chain(&[0xA1; 33]));
    store.store_session(&address, &bob).unwrap();
}

#[test]
fn uncommitted_mutation_never_reaches_the_store() {
    let store = MemorySessionStore::new();
    let address = RemoteAddress::new(7, 1);

    let mut bob = store.load_session(&address).unwrap();
    let (_, chain) = RootKey::new([1u8; 32]).create_chain(&shared_agreement());
    bob.current_state_mut().add_receiver_chain(vec![0xA1; 33], chain);
    store.store_session(&address, &bob).unwrap();

    // A decrypt attempt fails mid-way: the working copy advanced, but the
    // caller does not commit it
    let mut working = store.load_session(&address).unwrap();
    working.current_state_mut().message_key_for(&[0xA1; 33], 2).unwrap();
    drop(working);

    // Durable state still serves counter 2
    let mut reloaded = store.load_session(&address).unwrap();
    assert!(reloaded.current_state_mut().message_key_for(&[0xA1; 33], 2).is_ok());
}

#[test]
fn consumed_pre_key_fails_closed() {
    let store = MemoryPreKeyStore::new();
    let record = PreKeyRecord::new(31, 0, KeyPair::new(vec![0x05; 33], vec![0x50; 32]), Vec::new());

    store.store_pre_key(31, &record).unwrap();

    // First use consumes the key
    let loaded = store.load_pre_key(31).unwrap();
    assert_eq!(loaded.id(), 31);
    store.remove_pre_key(31).unwrap();

    // A replayed pre-key message cannot resurrect it
    assert_eq!(store.load_pre_key(31).err(), Some(StoreError::InvalidKeyId { id: 31 }));
}
