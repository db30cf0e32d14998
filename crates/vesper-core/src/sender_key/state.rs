//! A single sender-key ratchet state.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;
use vesper_crypto::{ChainKey, SenderMessageKey};

use crate::error::SessionError;

/// Maximum cached message keys per state.
///
/// Inserting beyond the bound evicts the oldest entry unconditionally,
/// whether or not it was ever consumed.
pub const MAX_MESSAGE_KEYS: usize = 2000;

/// Maximum chain iterations to skip in one catch-up.
///
/// Matches the cache bound so a single catch-up can never cache more
/// keys than the cache holds. Larger gaps fail instead of doing
/// unbounded work.
pub const MAX_SKIP: u32 = 2000;

/// One epoch of a sender's group ratchet.
///
/// Holds the chain key, the sender's signing key (private half present
/// only on the sending side), and the bounded cache of message keys
/// derived for not-yet-seen iterations.
///
/// # Invariants
///
/// - `chain_key.iteration()` is monotonically non-decreasing while this
///   state is active.
/// - `message_keys` holds at most [`MAX_MESSAGE_KEYS`] entries, oldest at
///   index 0, evicted first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderKeyState {
    key_id: u32,
    chain_key: ChainKey,
    signing_key_public: Vec<u8>,
    signing_key_private: Option<Vec<u8>>,
    message_keys: VecDeque<SenderMessageKey>,
}

impl SenderKeyState {
    /// Create a state for a new key epoch.
    pub fn new(
        key_id: u32,
        iteration: u32,
        chain_seed: [u8; 32],
        signing_key_public: Vec<u8>,
        signing_key_private: Option<Vec<u8>>,
    ) -> Self {
        Self {
            key_id,
            chain_key: ChainKey::new(iteration, chain_seed),
            signing_key_public,
            signing_key_private,
            message_keys: VecDeque::new(),
        }
    }

    /// Distribution id of this key epoch.
    pub fn key_id(&self) -> u32 {
        self.key_id
    }

    /// Current chain key.
    pub fn chain_key(&self) -> &ChainKey {
        &self.chain_key
    }

    /// Replace the chain key after an advance.
    pub fn set_chain_key(&mut self, chain_key: ChainKey) {
        self.chain_key = chain_key;
    }

    /// Public half of the sender's signing key.
    pub fn signing_key_public(&self) -> &[u8] {
        &self.signing_key_public
    }

    /// Private half of the signing key, present only on the sending side.
    pub fn signing_key_private(&self) -> Option<&[u8]> {
        self.signing_key_private.as_deref()
    }

    /// Number of cached message keys.
    pub fn cached_message_keys(&self) -> usize {
        self.message_keys.len()
    }

    /// Cache a message key for a not-yet-delivered iteration.
    ///
    /// FIFO-bounded: beyond [`MAX_MESSAGE_KEYS`] the oldest entry is
    /// evicted unconditionally.
    pub fn add_message_key(&mut self, key: SenderMessageKey) {
        self.message_keys.push_back(key);

        if self.message_keys.len() > MAX_MESSAGE_KEYS {
            if let Some(evicted) = self.message_keys.pop_front() {
                debug!(key_id = self.key_id, iteration = evicted.iteration(), "evicted message key");
            }
        }
    }

    /// Whether a cached key exists for the iteration.
    pub fn has_message_key(&self, iteration: u32) -> bool {
        self.message_keys.iter().any(|key| key.iteration() == iteration)
    }

    /// Remove and return the cached key for the iteration.
    ///
    /// Destructive and at-most-once: a second call for the same iteration
    /// returns `None`, as does a call for a key already evicted. Callers
    /// treat `None` as "undecryptable, possibly replayed or too old".
    pub fn remove_message_key(&mut self, iteration: u32) -> Option<SenderMessageKey> {
        let index = self.message_keys.iter().position(|key| key.iteration() == iteration)?;
        self.message_keys.remove(index)
    }

    /// Obtain the message key for an iteration, advancing the chain if
    /// needed.
    ///
    /// Behind the chain: consume the cached key, or fail
    /// [`SessionError::ReplayedOrEvictedKey`] if it was already used or
    /// evicted. Ahead of the chain: advance iteration by iteration,
    /// caching each skipped key, failing
    /// [`SessionError::TooManySkippedMessages`] for gaps beyond
    /// [`MAX_SKIP`].
    pub fn message_key_for(&mut self, iteration: u32) -> Result<SenderMessageKey, SessionError> {
        let current = self.chain_key.iteration();

        if iteration < current {
            return self
                .remove_message_key(iteration)
                .ok_or(SessionError::ReplayedOrEvictedKey { iteration });
        }

        if iteration - current > MAX_SKIP {
            return Err(SessionError::TooManySkippedMessages {
                current,
                requested: iteration,
                max: MAX_SKIP,
            });
        }

        while self.chain_key.iteration() < iteration {
            self.add_message_key(self.chain_key.message_key());
            self.chain_key = self.chain_key.next()?;
        }

        let key = self.chain_key.message_key();
        self.chain_key = self.chain_key.next()?;
        Ok(key)
    }
}
