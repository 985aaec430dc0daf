//! # Media core library for the voipd project
//!
//! `media-core` provides the real-time audio routing and mixing plumbing of
//! the daemon: a pool of per-entity ring buffers that lets independent
//! producers (microphone, RTP decoders, tone generators) and consumers
//! (RTP encoders, speakers, conference legs) exchange live PCM through a
//! dynamically mutated graph of bindings.
//!
//! This crate provides:
//!
//! - [`AudioFormat`] / [`AudioFrame`] value types for PCM exchange
//! - [`RingBuffer`]: bounded circular frame store with independent readers
//! - [`RingBufferPool`]: the process-wide buffer registry and binding graph,
//!   with N-way additive mixing on the read path
//!
//! ## Quick start
//!
//! ```rust
//! use voipd_media_core::prelude::*;
//!
//! let pool = RingBufferPool::new(AudioFormat::telephony());
//!
//! // A call's RTP receiver owns its buffer; the pool only keeps a weak ref.
//! let rb = pool.create_ring_buffer("call-1");
//!
//! // Full-duplex: the call and the hardware path hear each other.
//! pool.bind_ring_buffers("call-1", RingBufferPool::DEFAULT_ID);
//!
//! rb.put(AudioFrame::new(vec![12], pool.internal_audio_format(), false)).unwrap();
//! let frame = pool.get_data(RingBufferPool::DEFAULT_ID);
//! assert_eq!(frame.unwrap().samples, vec![12]);
//! ```

// Error handling
pub mod error;

// Audio routing core
pub mod audio;

// Re-export common types
pub use error::{Error, Result};
pub use audio::format::{AudioFormat, SampleFormat, SampleRate};
pub use audio::frame::AudioFrame;
pub use audio::ring_buffer::RingBuffer;
pub use audio::pool::RingBufferPool;

/// Media sample type (raw linear PCM)
pub type Sample = i16;

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::{
        AudioFormat,
        AudioFrame,
        Error,
        Result,
        RingBuffer,
        RingBufferPool,
        Sample,
        SampleFormat,
        SampleRate,
    };
}
