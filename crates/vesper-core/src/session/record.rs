//! Durable record holding the current session state and its archive.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{DecodeError, SessionError},
    session::state::SessionState,
};

/// Maximum archived previous states, same bound as sender-key states.
pub const MAX_ARCHIVED_STATES: usize = 5;

/// The durable session record for one (peer, device).
///
/// Holds the current [`SessionState`] plus archived previous states,
/// most-recent-first. Archiving happens when a session is reset while old
/// messages may still be in flight: the archived state remains queryable
/// for decrypting (never for encrypting) until evicted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    current: SessionState,
    previous: VecDeque<SessionState>,
    #[serde(skip, default)]
    fresh: bool,
}

impl Default for SessionRecord {
    fn default() -> Self {
        Self::new_fresh()
    }
}

impl SessionRecord {
    /// Create the record a store hands out when no session exists yet.
    pub fn new_fresh() -> Self {
        Self { current: SessionState::new(), previous: VecDeque::new(), fresh: true }
    }

    /// Wrap an established state in a record.
    pub fn from_state(state: SessionState) -> Self {
        Self { current: state, previous: VecDeque::new(), fresh: false }
    }

    /// Whether this record was created for a previously unknown identity
    /// and has never been stored.
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// The current state, the only state allowed to encrypt.
    pub fn current_state(&self) -> &SessionState {
        &self.current
    }

    /// The current state, mutable.
    pub fn current_state_mut(&mut self) -> &mut SessionState {
        self.fresh = false;
        &mut self.current
    }

    /// Archived states, most recent first. Decrypt-only.
    pub fn previous_states(&self) -> impl Iterator<Item = &SessionState> {
        self.previous.iter()
    }

    /// Mutable access to one archived state for message-key extraction.
    ///
    /// Archived states are otherwise read-only from the cipher's
    /// perspective.
    pub fn previous_state_mut(&mut self, index: usize) -> Option<&mut SessionState> {
        self.previous.get_mut(index)
    }

    /// Number of archived states.
    pub fn archive_len(&self) -> usize {
        self.previous.len()
    }

    /// All states, current first, for decrypt attempts across a session
    /// restart.
    pub fn session_states(&self) -> impl Iterator<Item = &SessionState> {
        std::iter::once(&self.current).chain(self.previous.iter())
    }

    /// Move the current state to the front of the archive and install a
    /// fresh current state.
    ///
    /// Called whenever a session is reset while old messages may still be
    /// in flight. Archiving a fresh current state is a no-op. Beyond
    /// [`MAX_ARCHIVED_STATES`] the oldest archived state is evicted.
    pub fn archive_current_state(&mut self) {
        if self.current.is_fresh() {
            debug!("skipping archive of fresh session state");
            return;
        }

        let archived = std::mem::replace(&mut self.current, SessionState::new());
        self.previous.push_front(archived);

        if self.previous.len() > MAX_ARCHIVED_STATES {
            self.previous.pop_back();
            debug!("evicted oldest archived session state");
        }
        self.fresh = false;
    }

    /// Promote an archived state back to current.
    ///
    /// Used when a decrypt attempt succeeds against an archived state:
    /// that state becomes current again and the superseded current state
    /// is archived in its place.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoSession`] if `index` is out of range.
    pub fn promote_state(&mut self, index: usize) -> Result<(), SessionError> {
        let promoted = self.previous.remove(index).ok_or(SessionError::NoSession)?;

        let superseded = std::mem::replace(&mut self.current, promoted);
        if !superseded.is_fresh() {
            self.previous.push_front(superseded);
            if self.previous.len() > MAX_ARCHIVED_STATES {
                self.previous.pop_back();
            }
        }
        self.fresh = false;
        Ok(())
    }

    /// Discard all state, current and archived.
    ///
    /// Used only when the peer relationship itself is invalidated.
    pub fn reset(&mut self) {
        self.current = SessionState::new();
        self.previous.clear();
        self.fresh = true;
    }

    /// Serialize into the versioned record envelope.
    pub fn serialize(&self) -> Vec<u8> {
        crate::codec::encode_record(self)
    }

    /// Parse from the versioned record envelope.
    ///
    /// A decoded record is never fresh: it was stored, so it has history.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, DecodeError> {
        crate::codec::decode_record(bytes)
    }
}
