//! Conference identity and state.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConferenceId(String);

impl ConferenceId {
    /// Generate a fresh conference id
    pub fn new() -> Self {
        Self(format!("conf_{}", Uuid::new_v4().simple()))
    }

    /// The id as a string slice (also the pool-facing form)
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConferenceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConferenceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Per-conference state.
///
/// "Attached" means the local hardware participant is bound into the mix;
/// "detached" keeps the conference running for the remote participants while
/// the local user is elsewhere. The `Rec` variants carry recording status,
/// orthogonal to the attach/hold axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConferenceState {
    /// Local participant in the mix
    ActiveAttached,
    /// Local participant in the mix, recording
    ActiveAttachedRec,
    /// Running without the local participant
    ActiveDetached,
    /// Running without the local participant, recording
    ActiveDetachedRec,
    /// All participants on hold
    Hold,
    /// All participants on hold, recording
    HoldRec,
}

impl ConferenceState {
    /// Whether this state carries the recording flag
    pub fn is_recording(&self) -> bool {
        matches!(
            self,
            ConferenceState::ActiveAttachedRec
                | ConferenceState::ActiveDetachedRec
                | ConferenceState::HoldRec
        )
    }

    /// Same attach/hold position with the recording flag set or cleared
    pub fn with_recording(&self, recording: bool) -> Self {
        match (self, recording) {
            (ConferenceState::ActiveAttached | ConferenceState::ActiveAttachedRec, true) => {
                ConferenceState::ActiveAttachedRec
            }
            (ConferenceState::ActiveAttached | ConferenceState::ActiveAttachedRec, false) => {
                ConferenceState::ActiveAttached
            }
            (ConferenceState::ActiveDetached | ConferenceState::ActiveDetachedRec, true) => {
                ConferenceState::ActiveDetachedRec
            }
            (ConferenceState::ActiveDetached | ConferenceState::ActiveDetachedRec, false) => {
                ConferenceState::ActiveDetached
            }
            (ConferenceState::Hold | ConferenceState::HoldRec, true) => ConferenceState::HoldRec,
            (ConferenceState::Hold | ConferenceState::HoldRec, false) => ConferenceState::Hold,
        }
    }

    /// Canonical string form, as published to clients
    pub fn as_str(&self) -> &'static str {
        match self {
            ConferenceState::ActiveAttached => "ACTIVE_ATTACHED",
            ConferenceState::ActiveAttachedRec => "ACTIVE_ATTACHED_REC",
            ConferenceState::ActiveDetached => "ACTIVE_DETACHED",
            ConferenceState::ActiveDetachedRec => "ACTIVE_DETACHED_REC",
            ConferenceState::Hold => "HOLD",
            ConferenceState::HoldRec => "HOLD_REC",
        }
    }
}

impl fmt::Display for ConferenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_flag_is_orthogonal() {
        assert_eq!(
            ConferenceState::ActiveDetached.with_recording(true),
            ConferenceState::ActiveDetachedRec
        );
        assert_eq!(
            ConferenceState::HoldRec.with_recording(false),
            ConferenceState::Hold
        );
        assert!(ConferenceState::ActiveAttachedRec.is_recording());
        assert!(!ConferenceState::Hold.is_recording());
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(ConferenceId::new(), ConferenceId::new());
    }
}
