//! Call state and the signaling-layer boundary.

use serde::{Deserialize, Serialize};

/// Coarse call state as exposed by the signaling layer.
///
/// The bridging logic dispatches exhaustively on this when a call is pulled
/// into a conference: held calls are unheld, incoming calls answered,
/// current calls bound directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallState {
    /// Outgoing call, remote side not yet answered
    Ringing,
    /// Established and active
    Current,
    /// Established and on hold
    Hold,
    /// Incoming call, not yet answered
    Incoming,
    /// Not established
    Inactive,
}

impl CallState {
    /// Canonical string form, as published to clients
    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Ringing => "RINGING",
            CallState::Current => "CURRENT",
            CallState::Hold => "HOLD",
            CallState::Incoming => "INCOMING",
            CallState::Inactive => "INACTIVE",
        }
    }
}

/// Boundary to the signaling layer owning the actual call objects.
///
/// The conference manager consumes calls exclusively through this trait: it
/// reads the id/conference-id/state triple and asks signaling to hold,
/// unhold or answer a leg. Implementations must tolerate unknown ids and
/// report them with `None`/`false` rather than panicking.
pub trait CallController: Send + Sync {
    /// Coarse state of the call, `None` if the id is unknown
    fn call_state(&self, call_id: &str) -> Option<CallState>;

    /// Conference the call belongs to, if any
    fn conf_id(&self, call_id: &str) -> Option<String>;

    /// Attach the call to a conference (or clear with `None`)
    fn set_conf_id(&self, call_id: &str, conf_id: Option<&str>);

    /// Whether the call leg is currently being recorded
    fn is_recording(&self, call_id: &str) -> bool;

    /// Put the call on hold; returns false if signaling refused
    fn hold_call(&self, call_id: &str) -> bool;

    /// Take the call off hold
    fn unhold_call(&self, call_id: &str) -> bool;

    /// Answer an incoming call
    fn answer_call(&self, call_id: &str) -> bool;
}
