//! Durable record holding a sender's recent key states.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{DecodeError, SessionError},
    sender_key::state::SenderKeyState,
};

/// Maximum retained states per (group, sender, device) identity.
pub const MAX_STATES: usize = 5;

/// The durable sender-key record for one (group, sender, device) identity.
///
/// States are ordered most-recent-first. A new epoch prepends; the oldest
/// state falls off the end once [`MAX_STATES`] is exceeded, so in-flight
/// messages from recently superseded epochs stay decryptable for a
/// bounded window.
///
/// An empty record is a valid "no key yet" state, distinct from an absent
/// record; stores hand out empty records for unknown identities.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SenderKeyRecord {
    states: VecDeque<SenderKeyState>,
}

impl SenderKeyRecord {
    /// Create an empty record ("no key yet").
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this record holds no states.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Number of retained states.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Retained states, most recent first.
    pub fn states(&self) -> impl Iterator<Item = &SenderKeyState> {
        self.states.iter()
    }

    /// Most recent state.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoSenderKeyState`] if the record is empty.
    pub fn state(&self) -> Result<&SenderKeyState, SessionError> {
        self.states.front().ok_or(SessionError::NoSenderKeyState { key_id: None })
    }

    /// Most recent state, mutable.
    pub fn state_mut(&mut self) -> Result<&mut SenderKeyState, SessionError> {
        self.states.front_mut().ok_or(SessionError::NoSenderKeyState { key_id: None })
    }

    /// State for a specific key epoch id.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoSenderKeyState`] if no state carries `key_id`.
    pub fn state_for(&self, key_id: u32) -> Result<&SenderKeyState, SessionError> {
        self.states
            .iter()
            .find(|state| state.key_id() == key_id)
            .ok_or(SessionError::NoSenderKeyState { key_id: Some(key_id) })
    }

    /// State for a specific key epoch id, mutable.
    pub fn state_for_mut(&mut self, key_id: u32) -> Result<&mut SenderKeyState, SessionError> {
        self.states
            .iter_mut()
            .find(|state| state.key_id() == key_id)
            .ok_or(SessionError::NoSenderKeyState { key_id: Some(key_id) })
    }

    /// Begin a new key epoch while old epochs keep decrypting.
    ///
    /// Prepends a fresh state; beyond [`MAX_STATES`] the oldest state is
    /// evicted.
    pub fn add_state(
        &mut self,
        key_id: u32,
        iteration: u32,
        chain_seed: [u8; 32],
        signing_key_public: Vec<u8>,
        signing_key_private: Option<Vec<u8>>,
    ) {
        self.states.push_front(SenderKeyState::new(
            key_id,
            iteration,
            chain_seed,
            signing_key_public,
            signing_key_private,
        ));

        if self.states.len() > MAX_STATES {
            if let Some(evicted) = self.states.pop_back() {
                debug!(key_id = evicted.key_id(), "evicted sender key state");
            }
        }
    }

    /// Destructive reset to exactly one state.
    ///
    /// Used on an explicit distribution-message-triggered re-key; every
    /// prior epoch becomes undecryptable.
    pub fn set_state(
        &mut self,
        key_id: u32,
        iteration: u32,
        chain_seed: [u8; 32],
        signing_key_public: Vec<u8>,
        signing_key_private: Option<Vec<u8>>,
    ) {
        self.states.clear();
        self.add_state(key_id, iteration, chain_seed, signing_key_public, signing_key_private);
    }

    /// Serialize into the versioned record envelope.
    pub fn serialize(&self) -> Vec<u8> {
        crate::codec::encode_record(self)
    }

    /// Parse from the versioned record envelope.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, DecodeError> {
        crate::codec::decode_record(bytes)
    }
}
