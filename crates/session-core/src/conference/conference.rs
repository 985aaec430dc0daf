//! A single conference: id, participant set and state.

use std::collections::BTreeSet;

use voipd_media_core::RingBufferPool;

use super::types::{ConferenceId, ConferenceState};

/// A named group of call legs whose audio is mixed together through the
/// binding graph. A call id belongs to at most one conference; a conference
/// with one participant or fewer is collapsed by the manager.
#[derive(Debug, Clone)]
pub struct Conference {
    id: ConferenceId,
    participants: BTreeSet<String>,
    state: ConferenceState,
}

impl Conference {
    /// Create an empty conference with a generated id
    pub fn new() -> Self {
        Self::with_id(ConferenceId::new())
    }

    /// Create an empty conference under the given id
    pub fn with_id(id: ConferenceId) -> Self {
        Self {
            id,
            participants: BTreeSet::new(),
            state: ConferenceState::ActiveAttached,
        }
    }

    /// The conference id
    pub fn id(&self) -> &ConferenceId {
        &self.id
    }

    /// Current state
    pub fn state(&self) -> ConferenceState {
        self.state
    }

    /// Set the state
    pub fn set_state(&mut self, state: ConferenceState) {
        self.state = state;
    }

    /// Add a call leg to the participant set
    pub fn add(&mut self, call_id: impl Into<String>) {
        self.participants.insert(call_id.into());
    }

    /// Remove a call leg from the participant set
    pub fn remove(&mut self, call_id: &str) {
        self.participants.remove(call_id);
    }

    /// Whether the call leg participates in this conference
    pub fn contains(&self, call_id: &str) -> bool {
        self.participants.contains(call_id)
    }

    /// Number of participants
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Whether the participant set is empty
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Participant ids, in stable order
    pub fn participant_list(&self) -> Vec<String> {
        self.participants.iter().cloned().collect()
    }

    /// Wire `call_id` into the conference mix: bind it full-duplex to every
    /// other participant and to the hardware path, flushing each peer so no
    /// stale audio is replayed into the freshly joined leg.
    pub fn bind_participant(&self, pool: &RingBufferPool, call_id: &str) {
        for other in &self.participants {
            if other != call_id {
                pool.bind_ring_buffers(call_id, other);
                pool.flush(other);
            }
        }
        pool.bind_ring_buffers(call_id, RingBufferPool::DEFAULT_ID);
        pool.flush(RingBufferPool::DEFAULT_ID);
    }
}

impl Default for Conference {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participants_are_a_set() {
        let mut conf = Conference::new();
        conf.add("c1");
        conf.add("c1");
        conf.add("c2");
        assert_eq!(conf.len(), 2);
        assert!(conf.contains("c1"));

        conf.remove("c1");
        assert_eq!(conf.participant_list(), vec!["c2".to_string()]);
    }

    #[test]
    fn new_conference_starts_attached() {
        assert_eq!(Conference::new().state(), ConferenceState::ActiveAttached);
    }
}
