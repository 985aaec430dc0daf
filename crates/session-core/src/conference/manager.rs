//! Conference manager: the bridging state machine.
//!
//! Every transition here is expressed as a mutation of the
//! [`RingBufferPool`] binding graph plus per-call hold/unhold/answer
//! requests to the signaling layer. The manager runs serialized on the
//! control thread; the pool's internal lock is its only contact point with
//! the real-time audio threads.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, warn};

use voipd_media_core::RingBufferPool;

use crate::api::types::{CallController, CallState};
use crate::errors::{Result, SessionError};

use super::conference::Conference;
use super::events::{ConferenceEvent, ConferenceEventHandler};
use super::types::{ConferenceId, ConferenceState};

const DEFAULT_ID: &str = RingBufferPool::DEFAULT_ID;

/// Policy layer that builds and tears down the audio routing graph as calls
/// are conferenced, held, detached and hung up.
pub struct ConferenceManager {
    /// The audio routing graph this manager mutates
    pool: Arc<RingBufferPool>,
    /// Boundary to the signaling layer owning the call objects
    controller: Arc<dyn CallController>,
    /// Active conferences
    conferences: DashMap<ConferenceId, Conference>,
    /// Named event handlers, dispatched in registration order
    handlers: RwLock<Vec<(String, Arc<dyn ConferenceEventHandler>)>>,
    /// Id of the call or conference the local user is listening to
    current: Mutex<Option<String>>,
}

impl ConferenceManager {
    /// Create a manager over the given pool and signaling boundary
    pub fn new(pool: Arc<RingBufferPool>, controller: Arc<dyn CallController>) -> Self {
        Self {
            pool,
            controller,
            conferences: DashMap::new(),
            handlers: RwLock::new(Vec::new()),
            current: Mutex::new(None),
        }
    }

    // ---- event handler registry ----

    /// Register an event handler under a unique name
    pub fn add_event_handler(&self, name: &str, handler: Arc<dyn ConferenceEventHandler>) {
        self.handlers.write().push((name.to_string(), handler));
    }

    /// Remove an event handler by name; returns whether one was removed
    pub fn remove_event_handler(&self, name: &str) -> bool {
        let mut handlers = self.handlers.write();
        if let Some(pos) = handlers.iter().position(|(n, _)| n == name) {
            handlers.remove(pos);
            true
        } else {
            false
        }
    }

    /// Number of registered event handlers
    pub fn event_handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    fn emit(&self, event: ConferenceEvent) {
        let handlers = self.handlers.read();
        for (_, handler) in handlers.iter() {
            handler.handle_event(event.clone());
        }
    }

    fn emit_changed(&self, conf_id: &ConferenceId) {
        if let Some(state) = self.conference_state(conf_id) {
            self.emit(ConferenceEvent::Changed {
                conference_id: conf_id.clone(),
                state,
            });
        }
    }

    // ---- current-call tracking ----

    /// Id of the call or conference the local user is listening to
    pub fn current_call_id(&self) -> Option<String> {
        self.current.lock().clone()
    }

    /// Mark a call or conference as the one being listened to
    pub fn set_current_call(&self, id: &str) {
        *self.current.lock() = Some(id.to_string());
    }

    /// Clear the current call/conference
    pub fn unset_current_call(&self) {
        *self.current.lock() = None;
    }

    // ---- accessors ----

    /// Whether `id` names a registered conference
    pub fn is_conference(&self, id: &str) -> bool {
        self.conferences.contains_key(&ConferenceId::from(id))
    }

    /// Whether the call currently belongs to a conference
    pub fn is_conference_participant(&self, call_id: &str) -> bool {
        self.controller.conf_id(call_id).is_some()
    }

    /// State of a conference, if it exists
    pub fn conference_state(&self, conf_id: &ConferenceId) -> Option<ConferenceState> {
        self.conferences.get(conf_id).map(|c| c.state())
    }

    /// Participants of a conference, in stable order
    pub fn participant_list(&self, conf_id: &ConferenceId) -> Vec<String> {
        self.conferences
            .get(conf_id)
            .map(|c| c.participant_list())
            .unwrap_or_default()
    }

    /// Number of active conferences
    pub fn conference_count(&self) -> usize {
        self.conferences.len()
    }

    // ---- single-call graph helpers ----

    /// Hold one plain call: signaling hold plus full graph teardown
    fn hold_single_call(&self, call_id: &str) {
        self.controller.hold_call(call_id);
        self.pool.unbind_all(call_id);
    }

    /// Park whatever the local user is currently listening to, unless it is
    /// one of `keep`: a conference is detached from, a plain call is held.
    fn park_current(&self, keep: &[&str]) {
        let current = self.current_call_id();
        if let Some(cur) = current {
            if keep.contains(&cur.as_str()) {
                return;
            }
            if self.is_conference(&cur) {
                let _ = self.detach_participant(DEFAULT_ID);
            } else {
                self.hold_single_call(&cur);
            }
        }
    }

    /// Wire `call_id` into `conf_id`'s mix (peers + hardware path)
    fn bind_participant(&self, conf_id: &ConferenceId, call_id: &str) {
        let conf = match self.conferences.get(conf_id) {
            Some(conf) => conf.clone(),
            None => return,
        };
        conf.bind_participant(&self.pool, call_id);
    }

    /// Per-state dispatch applied to a leg being pulled into a conference
    fn join_call_leg(&self, conf_id: &ConferenceId, call_id: &str, state: CallState) {
        debug!("Process call {} state: {}", call_id, state.as_str());
        match state {
            CallState::Hold => {
                self.bind_participant(conf_id, call_id);
                self.controller.unhold_call(call_id);
            }
            CallState::Incoming | CallState::Inactive => {
                self.bind_participant(conf_id, call_id);
                self.controller.answer_call(call_id);
            }
            CallState::Current => {
                self.bind_participant(conf_id, call_id);
            }
            CallState::Ringing => {
                warn!("Call {} is still ringing, not bound into the mix", call_id);
            }
        }
    }

    /// Drop `call_id` from whatever conference it previously belonged to
    fn leave_previous_conference(&self, call_id: &str, target: &ConferenceId) {
        let Some(prior) = self.controller.conf_id(call_id) else {
            return;
        };
        let prior = ConferenceId::from(prior.as_str());
        if prior == *target {
            return;
        }

        if let Some(mut conf) = self.conferences.get_mut(&prior) {
            conf.remove(call_id);
        }
        self.controller.set_conf_id(call_id, None);
        self.emit_changed(&prior);
        self.process_remaining_participants(&prior);
    }

    // ---- transitions ----

    /// Join two call legs into a fresh conference. Each leg is dispatched on
    /// its coarse state (held legs are unheld, incoming legs answered) and
    /// bound into the mix; the new conference becomes current and attached.
    pub fn join_participant(&self, call_id1: &str, call_id2: &str) -> Result<ConferenceId> {
        debug!("Join participants {}, {}", call_id1, call_id2);
        if call_id1 == call_id2 {
            error!("Cannot join participant {} to itself", call_id1);
            return Err(SessionError::InvalidParameter(format!(
                "cannot join {} to itself",
                call_id1
            )));
        }

        let state1 = self
            .controller
            .call_state(call_id1)
            .ok_or_else(|| SessionError::call_not_found(call_id1))?;
        let state2 = self
            .controller
            .call_state(call_id2)
            .ok_or_else(|| SessionError::call_not_found(call_id2))?;

        // Detach from the current conversation before switching over
        self.park_current(&[call_id1, call_id2]);

        let mut conf = Conference::new();
        conf.add(call_id1);
        conf.add(call_id2);
        let conf_id = conf.id().clone();
        self.conferences.insert(conf_id.clone(), conf);
        self.emit(ConferenceEvent::Created {
            conference_id: conf_id.clone(),
        });

        self.controller.set_conf_id(call_id1, Some(conf_id.as_str()));
        self.pool.unbind_all(call_id1);
        self.controller.set_conf_id(call_id2, Some(conf_id.as_str()));
        self.pool.unbind_all(call_id2);

        self.join_call_leg(&conf_id, call_id1, state1);
        self.join_call_leg(&conf_id, call_id2, state2);

        self.set_current_call(conf_id.as_str());
        if let Some(mut conf) = self.conferences.get_mut(&conf_id) {
            conf.set_state(ConferenceState::ActiveAttached);
        }
        self.emit_changed(&conf_id);

        Ok(conf_id)
    }

    /// Pull one more call leg into an existing conference
    pub fn add_participant(&self, call_id: &str, conf_id: &ConferenceId) -> Result<()> {
        debug!("Add participant {} to {}", call_id, conf_id);
        if !self.conferences.contains_key(conf_id) {
            error!("Conference id {} is not valid", conf_id);
            return Err(SessionError::conference_not_found(conf_id.as_str()));
        }
        let state = self.controller.call_state(call_id).ok_or_else(|| {
            error!("Call id {} is not valid", call_id);
            SessionError::call_not_found(call_id)
        })?;

        self.leave_previous_conference(call_id, conf_id);

        // Park the current conversation and move over to this conference
        self.park_current(&[call_id]);
        self.unset_current_call();
        self.add_main_participant(conf_id)?;
        self.set_current_call(conf_id.as_str());

        self.controller.set_conf_id(call_id, Some(conf_id.as_str()));
        if let Some(mut conf) = self.conferences.get_mut(conf_id) {
            conf.add(call_id);
        }

        // Reconnect the leg's audio from scratch
        self.pool.unbind_all(call_id);
        self.join_call_leg(conf_id, call_id, state);

        // Reset every participant's read offsets so the new mix starts clean
        for p in self.participant_list(conf_id) {
            self.pool.flush(&p);
        }
        self.pool.flush(DEFAULT_ID);

        self.emit_changed(conf_id);
        Ok(())
    }

    /// Bind the local hardware participant into a conference's mix
    pub fn add_main_participant(&self, conf_id: &ConferenceId) -> Result<()> {
        self.park_current(&[]);

        let participants = {
            let conf = self.conferences.get(conf_id).ok_or_else(|| {
                error!("Conference {} not found", conf_id);
                SessionError::conference_not_found(conf_id.as_str())
            })?;
            conf.participant_list()
        };

        for p in &participants {
            self.pool.bind_ring_buffers(p, DEFAULT_ID);
            self.pool.flush(p);
        }
        self.pool.flush(DEFAULT_ID);

        if let Some(mut conf) = self.conferences.get_mut(conf_id) {
            match conf.state() {
                ConferenceState::ActiveDetached => conf.set_state(ConferenceState::ActiveAttached),
                ConferenceState::ActiveDetachedRec => {
                    conf.set_state(ConferenceState::ActiveAttachedRec)
                }
                other => {
                    warn!(
                        "Invalid conference state {} while adding main participant",
                        other
                    );
                }
            }
        }
        self.emit_changed(conf_id);

        self.set_current_call(conf_id.as_str());
        Ok(())
    }

    /// Detach a participant from its conference. `DEFAULT_ID` detaches the
    /// local hardware participant from the current conference, leaving it
    /// running for the remote legs; any other id is held (unless still
    /// ringing) and removed.
    pub fn detach_participant(&self, call_id: &str) -> Result<()> {
        debug!("Detach participant {}", call_id);

        if call_id != DEFAULT_ID {
            let state = self.controller.call_state(call_id).ok_or_else(|| {
                error!("Could not find call {}", call_id);
                SessionError::call_not_found(call_id)
            })?;
            if self.controller.conf_id(call_id).is_none() {
                error!("Call {} is not conferencing, cannot detach", call_id);
                return Err(SessionError::invalid_state("call is not in a conference"));
            }

            // A ringing leg dragged into a conference was never answered, so
            // it must not be put on hold on the way out
            if state != CallState::Ringing {
                self.hold_single_call(call_id);
            }
            return self.remove_participant(call_id);
        }

        // Unbind the local participant, keep the conference running
        self.pool.unbind_all(DEFAULT_ID);

        let current = self.current_call_id().unwrap_or_default();
        if !self.is_conference(&current) {
            error!("Current call id ({}) is not a conference", current);
            return Err(SessionError::invalid_state("current call is not a conference"));
        }
        let conf_id = ConferenceId::from(current.as_str());

        if let Some(mut conf) = self.conferences.get_mut(&conf_id) {
            match conf.state() {
                ConferenceState::ActiveAttached => conf.set_state(ConferenceState::ActiveDetached),
                ConferenceState::ActiveAttachedRec => {
                    conf.set_state(ConferenceState::ActiveDetachedRec)
                }
                other => warn!("Invalid conference state {} in detach participant", other),
            }
        }
        self.emit_changed(&conf_id);
        self.unset_current_call();
        Ok(())
    }

    /// Remove a call leg from its conference, collapsing the conference
    /// when one or zero participants remain.
    pub fn remove_participant(&self, call_id: &str) -> Result<()> {
        debug!("Remove participant {}", call_id);

        let conf_id = self
            .controller
            .conf_id(call_id)
            .map(|id| ConferenceId::from(id.as_str()))
            .filter(|id| self.conferences.contains_key(id))
            .ok_or_else(|| {
                error!("No conference for call {}, cannot remove participant", call_id);
                SessionError::conference_not_found(call_id)
            })?;

        if let Some(mut conf) = self.conferences.get_mut(&conf_id) {
            conf.remove(call_id);
        }
        self.controller.set_conf_id(call_id, None);
        self.pool.unbind_all(call_id);

        self.emit_changed(&conf_id);
        self.process_remaining_participants(&conf_id);
        Ok(())
    }

    /// After a removal: flush the survivors of a still-valid conference, or
    /// collapse it when one or zero participants remain.
    fn process_remaining_participants(&self, conf_id: &ConferenceId) {
        let participants = self.participant_list(conf_id);
        debug!(
            "Process remaining {} participant(s) from conference {}",
            participants.len(),
            conf_id
        );

        match participants.len() {
            n if n > 1 => {
                for p in &participants {
                    self.pool.flush(p);
                }
                self.pool.flush(DEFAULT_ID);
            }
            1 => {
                // Last participant left: the conference is over and the
                // survivor reverts to a plain call
                let survivor = &participants[0];
                self.controller.set_conf_id(survivor, None);
                if self.current_call_id().as_deref() != Some(conf_id.as_str()) {
                    // Not the conversation being listened to; park it
                    self.controller.hold_call(survivor);
                } else {
                    self.set_current_call(survivor);
                }
                self.remove_conference(conf_id);
            }
            _ => {
                self.remove_conference(conf_id);
                self.unset_current_call();
            }
        }
    }

    /// Tear down a conference, rebinding the hardware path to the first
    /// remaining participant if any.
    fn remove_conference(&self, conf_id: &ConferenceId) {
        self.emit(ConferenceEvent::Removed {
            conference_id: conf_id.clone(),
        });

        self.pool.unbind_all(DEFAULT_ID);
        if let Some(first) = self.participant_list(conf_id).first() {
            self.pool.bind_ring_buffers(first, DEFAULT_ID);
        }

        if self.conferences.remove(conf_id).is_some() {
            debug!("Conference {} removed successfully", conf_id);
        } else {
            error!("Cannot remove conference: {}", conf_id);
        }
    }

    /// Put every participant of a conference on hold
    pub fn hold_conference(&self, conf_id: &ConferenceId) -> Result<()> {
        let state = self.conference_state(conf_id).ok_or_else(|| {
            error!("Conference {} not found", conf_id);
            SessionError::conference_not_found(conf_id.as_str())
        })?;
        if matches!(state, ConferenceState::Hold | ConferenceState::HoldRec) {
            warn!("Conference {} is already on hold", conf_id);
            return Err(SessionError::invalid_state("conference already on hold"));
        }

        let is_rec = state.is_recording();
        for p in self.participant_list(conf_id) {
            self.hold_single_call(&p);
        }

        if let Some(mut conf) = self.conferences.get_mut(conf_id) {
            conf.set_state(ConferenceState::Hold.with_recording(is_rec));
        }
        self.emit_changed(conf_id);
        Ok(())
    }

    /// Resume a held conference: every participant is unheld and rebound
    /// into the mix.
    pub fn unhold_conference(&self, conf_id: &ConferenceId) -> Result<()> {
        let state = self.conference_state(conf_id).ok_or_else(|| {
            error!("Conference {} not found", conf_id);
            SessionError::conference_not_found(conf_id.as_str())
        })?;
        if !matches!(state, ConferenceState::Hold | ConferenceState::HoldRec) {
            warn!("Conference {} is not on hold", conf_id);
            return Err(SessionError::invalid_state("conference is not on hold"));
        }

        let mut is_rec = state.is_recording();
        for p in self.participant_list(conf_id) {
            // A participant recording on its own keeps the conference in a
            // recording state
            is_rec |= self.controller.is_recording(&p);
            self.bind_participant(conf_id, &p);
            self.controller.unhold_call(&p);
        }

        if let Some(mut conf) = self.conferences.get_mut(conf_id) {
            conf.set_state(ConferenceState::ActiveAttached.with_recording(is_rec));
        }
        self.emit_changed(conf_id);
        self.set_current_call(conf_id.as_str());
        Ok(())
    }

    /// Merge conference 1 into conference 2
    pub fn join_conference(&self, conf_id1: &ConferenceId, conf_id2: &ConferenceId) -> Result<()> {
        debug!("Join conferences {} and {}", conf_id1, conf_id2);
        if !self.conferences.contains_key(conf_id1) {
            error!("Not a valid conference id: {}", conf_id1);
            return Err(SessionError::conference_not_found(conf_id1.as_str()));
        }
        if !self.conferences.contains_key(conf_id2) {
            error!("Not a valid conference id: {}", conf_id2);
            return Err(SessionError::conference_not_found(conf_id2.as_str()));
        }

        for p in self.participant_list(conf_id1) {
            // The source conference may already have collapsed behind us;
            // the leg still gets moved over
            if let Err(e) = self.detach_participant(&p) {
                warn!("Could not detach {}: {}", p, e);
            }
            if let Err(e) = self.add_participant(&p, conf_id2) {
                warn!("Could not move {} into {}: {}", p, conf_id2, e);
            }
        }
        Ok(())
    }

    /// Flip the conference's recording flag; returns the new flag
    pub fn toggle_conference_recording(&self, conf_id: &ConferenceId) -> Result<bool> {
        let recording = {
            let mut conf = self.conferences.get_mut(conf_id).ok_or_else(|| {
                error!("Conference {} not found", conf_id);
                SessionError::conference_not_found(conf_id.as_str())
            })?;
            let recording = !conf.state().is_recording();
            let state = conf.state().with_recording(recording);
            conf.set_state(state);
            recording
        };
        self.emit_changed(conf_id);
        Ok(recording)
    }
}
