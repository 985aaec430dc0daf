//! Call-side types consumed from the signaling layer.

pub mod types;

pub use types::{CallController, CallState};
