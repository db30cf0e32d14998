//! Group-messaging sender key ratchet.
//!
//! One [`SenderKeyRecord`] exists per (group, sender, device) identity and
//! holds an ordered list of up to [`record::MAX_STATES`] ratchet states,
//! newest first, so receivers can keep decrypting in-flight messages from
//! superseded key epochs while the sender has already rotated.
//!
//! Group fan-out means many receivers decrypt the same sender's messages
//! at different times and orders. The per-state message-key cache is
//! bounded ([`state::MAX_MESSAGE_KEYS`]) and evicts oldest-first, trading
//! a small replay-window loss for bounded memory, an explicit policy
//! choice, not an oversight.

pub mod record;
pub mod state;

pub use record::SenderKeyRecord;
pub use state::SenderKeyState;
