//! One-way conference notifications for the client/event-signal layer.

use super::types::{ConferenceId, ConferenceState};

/// Events published whenever conference state mutates. Purely
/// observational: handlers must not call back into the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConferenceEvent {
    /// A new conference was created
    Created {
        /// Id of the new conference
        conference_id: ConferenceId,
    },
    /// A conference changed participants or state
    Changed {
        /// Id of the conference
        conference_id: ConferenceId,
        /// State after the change
        state: ConferenceState,
    },
    /// A conference was torn down
    Removed {
        /// Id of the removed conference
        conference_id: ConferenceId,
    },
}

/// Handler for conference events, registered by name on the manager.
/// Dispatched synchronously on the control thread.
pub trait ConferenceEventHandler: Send + Sync {
    /// Called for every published event
    fn handle_event(&self, event: ConferenceEvent);
}
