//! One side of a pairwise double-ratchet session.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;
use vesper_crypto::{ChainKey, RootKey, SenderMessageKey, constant_time_eq};

use crate::{
    error::SessionError,
    keys::KeyPair,
    sender_key::state::{MAX_MESSAGE_KEYS, MAX_SKIP},
};

/// Session protocol version stamped on newly created states.
pub const CURRENT_VERSION: u32 = 3;

/// Maximum retained receiver chains.
///
/// One chain exists per distinct ratchet ephemeral seen from the peer;
/// honest peers step their ephemeral once per round trip, so a small
/// bound covers realistic reordering while capping memory.
pub const MAX_RECEIVER_CHAINS: usize = 5;

/// The active sending chain: our ratchet key pair and its chain key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderChain {
    ratchet_key: KeyPair,
    chain_key: ChainKey,
}

impl SenderChain {
    /// Our current ratchet key pair.
    pub fn ratchet_key(&self) -> &KeyPair {
        &self.ratchet_key
    }

    /// Current sending chain key.
    pub fn chain_key(&self) -> &ChainKey {
        &self.chain_key
    }
}

/// A receiving chain for one peer ratchet ephemeral, with its bounded
/// skipped-message-key cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ReceiverChain {
    ratchet_public: Vec<u8>,
    chain_key: ChainKey,
    message_keys: VecDeque<SenderMessageKey>,
}

impl ReceiverChain {
    fn add_message_key(&mut self, key: SenderMessageKey) {
        self.message_keys.push_back(key);

        if self.message_keys.len() > MAX_MESSAGE_KEYS {
            if let Some(evicted) = self.message_keys.pop_front() {
                debug!(iteration = evicted.iteration(), "evicted receiver message key");
            }
        }
    }

    fn remove_message_key(&mut self, counter: u32) -> Option<SenderMessageKey> {
        let index = self.message_keys.iter().position(|key| key.iteration() == counter)?;
        self.message_keys.remove(index)
    }
}

/// In-flight handshake material, retained until the peer's reply confirms
/// the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingKeyExchange {
    sequence: u32,
    base_key: KeyPair,
    ephemeral_key: KeyPair,
    identity_key: KeyPair,
}

impl PendingKeyExchange {
    /// Record handshake material for a not-yet-confirmed exchange.
    pub fn new(
        sequence: u32,
        base_key: KeyPair,
        ephemeral_key: KeyPair,
        identity_key: KeyPair,
    ) -> Self {
        Self { sequence, base_key, ephemeral_key, identity_key }
    }

    /// Exchange sequence number.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Our base key pair for this exchange.
    pub fn base_key(&self) -> &KeyPair {
        &self.base_key
    }

    /// Our ephemeral ratchet key pair for this exchange.
    pub fn ephemeral_key(&self) -> &KeyPair {
        &self.ephemeral_key
    }

    /// Our identity key pair as offered in this exchange.
    pub fn identity_key(&self) -> &KeyPair {
        &self.identity_key
    }
}

/// Pre-key reference attached to outgoing messages until the peer's first
/// reply proves the session is established.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPreKey {
    pre_key_id: Option<u32>,
    signed_pre_key_id: u32,
    base_key: Vec<u8>,
}

impl PendingPreKey {
    /// One-time pre-key id used, if one was consumed.
    pub fn pre_key_id(&self) -> Option<u32> {
        self.pre_key_id
    }

    /// Signed pre-key id used.
    pub fn signed_pre_key_id(&self) -> u32 {
        self.signed_pre_key_id
    }

    /// Our base key public bytes for the handshake.
    pub fn base_key(&self) -> &[u8] {
        &self.base_key
    }
}

/// Mutable state of one pairwise ratchet session.
///
/// # Invariants
///
/// - At most one sender chain is active at a time.
/// - One receiver chain exists per distinct ratchet ephemeral seen from
///   the peer, bounded to [`MAX_RECEIVER_CHAINS`], oldest evicted first.
/// - Message-key extraction is destructive and at-most-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    session_version: u32,
    local_identity_public: Vec<u8>,
    remote_identity_public: Vec<u8>,
    root_key: Option<RootKey>,
    previous_counter: u32,
    sender_chain: Option<SenderChain>,
    receiver_chains: Vec<ReceiverChain>,
    pending_key_exchange: Option<PendingKeyExchange>,
    pending_pre_key: Option<PendingPreKey>,
    remote_registration_id: u32,
    local_registration_id: u32,
    needs_refresh: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// Create a fresh state with no chains.
    pub fn new() -> Self {
        Self {
            session_version: CURRENT_VERSION,
            local_identity_public: Vec::new(),
            remote_identity_public: Vec::new(),
            root_key: None,
            previous_counter: 0,
            sender_chain: None,
            receiver_chains: Vec::new(),
            pending_key_exchange: None,
            pending_pre_key: None,
            remote_registration_id: 0,
            local_registration_id: 0,
            needs_refresh: false,
        }
    }

    /// Whether this state has never ratcheted nor started a handshake.
    pub fn is_fresh(&self) -> bool {
        self.sender_chain.is_none()
            && self.receiver_chains.is_empty()
            && self.pending_key_exchange.is_none()
            && self.pending_pre_key.is_none()
    }

    /// Session protocol version.
    pub fn session_version(&self) -> u32 {
        self.session_version
    }

    /// Override the session protocol version (set at handshake time).
    pub fn set_session_version(&mut self, version: u32) {
        self.session_version = version;
    }

    /// Our identity public key bytes.
    pub fn local_identity_public(&self) -> &[u8] {
        &self.local_identity_public
    }

    /// The peer's identity public key bytes.
    pub fn remote_identity_public(&self) -> &[u8] {
        &self.remote_identity_public
    }

    /// Record both identity public keys at session setup.
    pub fn set_identity_keys(&mut self, local: Vec<u8>, remote: Vec<u8>) {
        self.local_identity_public = local;
        self.remote_identity_public = remote;
    }

    /// Current root key, absent until the first ratchet step.
    pub fn root_key(&self) -> Option<&RootKey> {
        self.root_key.as_ref()
    }

    /// Install the stepped root key.
    pub fn set_root_key(&mut self, root_key: RootKey) {
        self.root_key = Some(root_key);
    }

    /// Length of the superseded sender chain when the peer last advanced.
    ///
    /// Bounds how long keys from before a ratchet step stay reachable.
    pub fn previous_counter(&self) -> u32 {
        self.previous_counter
    }

    /// Record the superseded sender-chain length during a ratchet step.
    pub fn set_previous_counter(&mut self, counter: u32) {
        self.previous_counter = counter;
    }

    /// The peer's registration id.
    pub fn remote_registration_id(&self) -> u32 {
        self.remote_registration_id
    }

    /// Set the peer's registration id.
    pub fn set_remote_registration_id(&mut self, id: u32) {
        self.remote_registration_id = id;
    }

    /// Our registration id.
    pub fn local_registration_id(&self) -> u32 {
        self.local_registration_id
    }

    /// Set our registration id.
    pub fn set_local_registration_id(&mut self, id: u32) {
        self.local_registration_id = id;
    }

    /// Whether the session is flagged for re-handshake.
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh
    }

    /// Flag or clear the re-handshake marker.
    pub fn set_needs_refresh(&mut self, needs_refresh: bool) {
        self.needs_refresh = needs_refresh;
    }

    // --- sender chain ---

    /// Install a sender chain derived from a fresh ephemeral pair.
    ///
    /// Replaces any previous sender chain; at most one is active.
    pub fn set_sender_chain(&mut self, ratchet_key: KeyPair, chain_key: ChainKey) {
        self.sender_chain = Some(SenderChain { ratchet_key, chain_key });
    }

    /// The active sender chain, if any.
    pub fn sender_chain(&self) -> Option<&SenderChain> {
        self.sender_chain.as_ref()
    }

    /// Whether a sender chain is active.
    pub fn has_sender_chain(&self) -> bool {
        self.sender_chain.is_some()
    }

    /// Number of messages sent on the active chain.
    pub fn sender_chain_length(&self) -> u32 {
        self.sender_chain.as_ref().map_or(0, |chain| chain.chain_key.iteration())
    }

    /// Derive the next outgoing message key and advance the sender chain.
    ///
    /// The sender side never caches: it always derives forward.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoSession`] if no sender chain is active.
    pub fn advance_sender_chain(&mut self) -> Result<SenderMessageKey, SessionError> {
        let chain = self.sender_chain.as_mut().ok_or(SessionError::NoSession)?;

        let key = chain.chain_key.message_key();
        chain.chain_key = chain.chain_key.next()?;
        Ok(key)
    }

    // --- receiver chains ---

    /// Register a receiver chain for a newly seen peer ratchet ephemeral.
    ///
    /// Bounded to [`MAX_RECEIVER_CHAINS`]; the oldest chain (and its
    /// cached keys) is evicted first.
    pub fn add_receiver_chain(&mut self, ratchet_public: Vec<u8>, chain_key: ChainKey) {
        self.receiver_chains.push(ReceiverChain {
            ratchet_public,
            chain_key,
            message_keys: VecDeque::new(),
        });

        if self.receiver_chains.len() > MAX_RECEIVER_CHAINS {
            let evicted = self.receiver_chains.remove(0);
            debug!(
                cached_keys = evicted.message_keys.len(),
                "evicted receiver chain"
            );
        }
    }

    /// Whether a receiver chain exists for the ratchet ephemeral.
    pub fn has_receiver_chain(&self, ratchet_public: &[u8]) -> bool {
        self.find_chain(ratchet_public).is_some()
    }

    /// Current chain key of the addressed receiver chain.
    pub fn receiver_chain_key(&self, ratchet_public: &[u8]) -> Option<&ChainKey> {
        self.find_chain(ratchet_public).map(|chain| &chain.chain_key)
    }

    /// Replace the chain key of the addressed receiver chain.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoSession`] if no chain matches.
    pub fn set_receiver_chain_key(
        &mut self,
        ratchet_public: &[u8],
        chain_key: ChainKey,
    ) -> Result<(), SessionError> {
        let chain = self.find_chain_mut(ratchet_public).ok_or(SessionError::NoSession)?;
        chain.chain_key = chain_key;
        Ok(())
    }

    /// Cache a skipped message key on the addressed receiver chain.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoSession`] if no chain matches.
    pub fn add_message_keys(
        &mut self,
        ratchet_public: &[u8],
        key: SenderMessageKey,
    ) -> Result<(), SessionError> {
        let chain = self.find_chain_mut(ratchet_public).ok_or(SessionError::NoSession)?;
        chain.add_message_key(key);
        Ok(())
    }

    /// Whether a cached key exists for (ephemeral, counter).
    pub fn has_message_keys(&self, ratchet_public: &[u8], counter: u32) -> bool {
        self.find_chain(ratchet_public)
            .is_some_and(|chain| chain.message_keys.iter().any(|key| key.iteration() == counter))
    }

    /// Remove and return the cached key for (ephemeral, counter).
    ///
    /// Destructive and at-most-once: once retrieved for decryption the
    /// key is not retrievable again.
    pub fn remove_message_keys(
        &mut self,
        ratchet_public: &[u8],
        counter: u32,
    ) -> Option<SenderMessageKey> {
        self.find_chain_mut(ratchet_public)?.remove_message_key(counter)
    }

    /// Obtain the message key for (ephemeral, counter), advancing the
    /// addressed receiver chain as needed.
    ///
    /// Behind the chain: consume the cached skipped key or fail
    /// [`SessionError::ReplayedOrEvictedKey`]. Ahead: advance the chain
    /// caching each intermediate key, failing
    /// [`SessionError::TooManySkippedMessages`] past the skip bound.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoSession`] if no chain matches `ratchet_public`; the
    /// caller must perform a DH ratchet step first.
    pub fn message_key_for(
        &mut self,
        ratchet_public: &[u8],
        counter: u32,
    ) -> Result<SenderMessageKey, SessionError> {
        let chain = self.find_chain_mut(ratchet_public).ok_or(SessionError::NoSession)?;
        let current = chain.chain_key.iteration();

        if counter < current {
            return chain
                .remove_message_key(counter)
                .ok_or(SessionError::ReplayedOrEvictedKey { iteration: counter });
        }

        if counter - current > MAX_SKIP {
            return Err(SessionError::TooManySkippedMessages {
                current,
                requested: counter,
                max: MAX_SKIP,
            });
        }

        while chain.chain_key.iteration() < counter {
            chain.add_message_key(chain.chain_key.message_key());
            chain.chain_key = chain.chain_key.next()?;
        }

        let key = chain.chain_key.message_key();
        chain.chain_key = chain.chain_key.next()?;
        Ok(key)
    }

    // --- pending handshake material ---

    /// Record in-flight key exchange material.
    ///
    /// Idempotent for retried sends: re-setting the same material is
    /// harmless, the field is simply overwritten.
    pub fn set_pending_key_exchange(&mut self, pending: PendingKeyExchange) {
        self.pending_key_exchange = Some(pending);
    }

    /// Whether a key exchange is awaiting the peer's reply.
    pub fn has_pending_key_exchange(&self) -> bool {
        self.pending_key_exchange.is_some()
    }

    /// In-flight key exchange material, if any.
    pub fn pending_key_exchange(&self) -> Option<&PendingKeyExchange> {
        self.pending_key_exchange.as_ref()
    }

    /// Clear the pending exchange on confirmation.
    ///
    /// Exactly-once: returns the material on the first call, `None`
    /// afterwards.
    pub fn clear_pending_key_exchange(&mut self) -> Option<PendingKeyExchange> {
        self.pending_key_exchange.take()
    }

    /// Attach the pre-key reference carried until the session confirms.
    pub fn set_pending_pre_key(
        &mut self,
        pre_key_id: Option<u32>,
        signed_pre_key_id: u32,
        base_key: Vec<u8>,
    ) {
        self.pending_pre_key = Some(PendingPreKey { pre_key_id, signed_pre_key_id, base_key });
    }

    /// Whether an unconfirmed pre-key reference is attached.
    pub fn has_pending_pre_key(&self) -> bool {
        self.pending_pre_key.is_some()
    }

    /// The unconfirmed pre-key reference, if any.
    pub fn pending_pre_key(&self) -> Option<&PendingPreKey> {
        self.pending_pre_key.as_ref()
    }

    /// Clear the pre-key reference once the peer's reply confirms the
    /// session. Exactly-once, like
    /// [`clear_pending_key_exchange`](Self::clear_pending_key_exchange).
    pub fn clear_pending_pre_key(&mut self) -> Option<PendingPreKey> {
        self.pending_pre_key.take()
    }

    fn find_chain(&self, ratchet_public: &[u8]) -> Option<&ReceiverChain> {
        self.receiver_chains
            .iter()
            .find(|chain| constant_time_eq(&chain.ratchet_public, ratchet_public))
    }

    fn find_chain_mut(&mut self, ratchet_public: &[u8]) -> Option<&mut ReceiverChain> {
        self.receiver_chains
            .iter_mut()
            .find(|chain| constant_time_eq(&chain.ratchet_public, ratchet_public))
    }
}
