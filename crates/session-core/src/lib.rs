//! # Session core library for the voipd project
//!
//! `session-core` owns the conference/call bridging state machine: in
//! response to user and signaling actions it mutates the
//! [`RingBufferPool`](voipd_media_core::RingBufferPool) binding graph and a
//! small per-conference state machine, as calls are answered, held,
//! conferenced, transferred and hung up.
//!
//! The call objects themselves live in the signaling layer; this crate only
//! consumes them through the [`CallController`](api::CallController) trait
//! (id, conference id, coarse state, hold/unhold/answer).
//!
//! All of this logic runs serialized on the control thread; it races only
//! against the pool's own internal lock, never against call state directly.

// Error handling
pub mod errors;

// Call-side types consumed from the signaling layer
pub mod api;

// Conference bridging
pub mod conference;

// Re-export common types
pub use errors::{Result, SessionError};
pub use api::types::{CallController, CallState};
pub use conference::conference::Conference;
pub use conference::events::{ConferenceEvent, ConferenceEventHandler};
pub use conference::manager::ConferenceManager;
pub use conference::types::{ConferenceId, ConferenceState};

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::{
        CallController,
        CallState,
        Conference,
        ConferenceEvent,
        ConferenceEventHandler,
        ConferenceId,
        ConferenceManager,
        ConferenceState,
        Result,
        SessionError,
    };
    pub use voipd_media_core::prelude::*;
}
