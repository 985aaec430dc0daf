//! Conference bridging: types, per-conference state and the manager that
//! mutates the audio routing graph.

pub mod types;
pub mod conference;
pub mod events;
pub mod manager;

pub use types::{ConferenceId, ConferenceState};
pub use conference::Conference;
pub use events::{ConferenceEvent, ConferenceEventHandler};
pub use manager::ConferenceManager;
