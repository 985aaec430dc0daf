//! Bounded circular store of audio frames for one named entity.
//!
//! A ring buffer has exactly one writer (the entity's producer: microphone
//! capture, an RTP decoder, a tone generator) and any number of independent
//! readers, each with its own consumption offset. The writer never blocks:
//! when the ring is full the oldest frame is dropped and lagging readers are
//! pushed forward.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::audio::format::AudioFormat;
use crate::audio::frame::AudioFrame;
use crate::error::{Error, Result};

/// Default ring capacity, in frames. At 20ms a frame this is 2s of audio.
pub const DEFAULT_CAPACITY: usize = 100;

struct RingState {
    /// Last `capacity` frames; the front sits at absolute index
    /// `head - slots.len()`.
    slots: VecDeque<Arc<AudioFrame>>,
    /// Absolute index of the next write
    head: u64,
    /// Maximum number of stored frames
    capacity: usize,
    /// Format newly produced frames are expected in
    format: AudioFormat,
    /// Reader id -> absolute index of the next frame that reader consumes
    offsets: HashMap<String, u64>,
}

impl RingState {
    /// Absolute index of the oldest frame still stored
    fn tail(&self) -> u64 {
        self.head - self.slots.len() as u64
    }

    /// Reader offset clamped into the still-stored window
    fn reader_pos(&self, reader: &str) -> Option<u64> {
        self.offsets.get(reader).map(|o| (*o).max(self.tail()))
    }
}

/// Bounded multi-reader ring buffer of [`AudioFrame`]s.
pub struct RingBuffer {
    /// Entity id this buffer belongs to (a call id, a conference id, or the
    /// pool's hardware sentinel)
    pub id: String,
    state: Mutex<RingState>,
    data_available: Condvar,
}

impl RingBuffer {
    /// Create a buffer with the default capacity
    pub fn new(id: impl Into<String>, format: AudioFormat) -> Self {
        Self::with_capacity(id, format, DEFAULT_CAPACITY)
    }

    /// Create a buffer holding at most `capacity` frames
    pub fn with_capacity(id: impl Into<String>, format: AudioFormat, capacity: usize) -> Self {
        Self {
            id: id.into(),
            state: Mutex::new(RingState {
                slots: VecDeque::with_capacity(capacity),
                head: 0,
                capacity: capacity.max(1),
                format,
                offsets: HashMap::new(),
            }),
            data_available: Condvar::new(),
        }
    }

    /// Register a read offset for `reader`, starting at the current write
    /// position. No-op if the reader already exists.
    pub fn create_read_offset(&self, reader: &str) {
        let mut state = self.state.lock();
        let head = state.head;
        state.offsets.entry(reader.to_string()).or_insert(head);
    }

    /// Drop `reader`'s offset; its backlog is released with it
    pub fn remove_read_offset(&self, reader: &str) {
        self.state.lock().offsets.remove(reader);
    }

    /// Whether `reader` currently has an offset on this buffer
    pub fn has_read_offset(&self, reader: &str) -> bool {
        self.state.lock().offsets.contains_key(reader)
    }

    /// Number of registered readers
    pub fn readers(&self) -> usize {
        self.state.lock().offsets.len()
    }

    /// Format frames are expected in
    pub fn format(&self) -> AudioFormat {
        self.state.lock().format
    }

    /// Retag the buffer's format. Callers flush first so no frame crosses a
    /// format change.
    pub fn set_format(&self, format: AudioFormat) {
        self.state.lock().format = format;
    }

    /// Append a frame, waking blocked readers. Returns the number of samples
    /// written. Never blocks; when the ring is full the oldest frame is
    /// dropped and lagging readers are bumped past it.
    ///
    /// Frames must be in the buffer's normalized format; a mismatched frame
    /// is rejected rather than mixed against a different clock.
    pub fn put(&self, frame: AudioFrame) -> Result<usize> {
        let written = frame.len();
        let mut state = self.state.lock();

        if frame.format != state.format {
            return Err(Error::FormatMismatch {
                expected: state.format,
                actual: frame.format,
            });
        }

        state.slots.push_back(Arc::new(frame));
        state.head += 1;
        if state.slots.len() > state.capacity {
            state.slots.pop_front();
            let tail = state.tail();
            for offset in state.offsets.values_mut() {
                if *offset < tail {
                    *offset = tail;
                }
            }
        }
        drop(state);

        self.data_available.notify_all();
        Ok(written)
    }

    /// Consume one frame for `reader`. Returns `None` when the reader is
    /// unknown or has nothing pending. The returned `Arc` is the producer's
    /// frame, untouched.
    pub fn get(&self, reader: &str) -> Option<Arc<AudioFrame>> {
        let mut state = self.state.lock();
        let pos = match state.reader_pos(reader) {
            Some(pos) => pos,
            None => {
                debug!("Ring buffer '{}' has no read offset for '{}'", self.id, reader);
                return None;
            }
        };
        if pos >= state.head {
            return None;
        }

        let idx = (pos - state.tail()) as usize;
        let frame = state.slots[idx].clone();
        state.offsets.insert(reader.to_string(), pos + 1);
        Some(frame)
    }

    /// Samples pending for `reader`
    pub fn available_for_get(&self, reader: &str) -> usize {
        let state = self.state.lock();
        let pos = match state.reader_pos(reader) {
            Some(pos) => pos,
            None => return 0,
        };
        let idx = (pos - state.tail()) as usize;
        state.slots.iter().skip(idx).map(|f| f.len()).sum()
    }

    /// Skip ahead at least `n_samples` for `reader`, frame-granular.
    /// Returns the number of samples actually discarded.
    pub fn discard(&self, n_samples: usize, reader: &str) -> usize {
        let mut state = self.state.lock();
        let mut pos = match state.reader_pos(reader) {
            Some(pos) => pos,
            None => return 0,
        };

        let mut discarded = 0;
        while discarded < n_samples && pos < state.head {
            let idx = (pos - state.tail()) as usize;
            discarded += state.slots[idx].len();
            pos += 1;
        }
        state.offsets.insert(reader.to_string(), pos);
        discarded
    }

    /// Drop `reader`'s backlog: its offset jumps to the write position
    pub fn flush(&self, reader: &str) {
        let mut state = self.state.lock();
        if state.offsets.contains_key(reader) {
            let head = state.head;
            state.offsets.insert(reader.to_string(), head);
        }
    }

    /// Drop every reader's backlog and the stored frames
    pub fn flush_all(&self) {
        let mut state = self.state.lock();
        state.slots.clear();
        let head = state.head;
        for offset in state.offsets.values_mut() {
            *offset = head;
        }
    }

    /// Block until at least `min_samples` are pending for `reader` or the
    /// deadline passes. Returns the number of samples available on success.
    /// The writer side never takes part in this wait.
    pub fn wait_for_data(&self, reader: &str, min_samples: usize, deadline: Instant) -> Result<usize> {
        let mut state = self.state.lock();
        loop {
            let available: usize = match state.reader_pos(reader) {
                Some(pos) => {
                    let idx = (pos - state.tail()) as usize;
                    state.slots.iter().skip(idx).map(|f| f.len()).sum()
                }
                None => {
                    return Err(Error::UnknownReader(reader.to_string(), self.id.clone()));
                }
            };
            if available >= min_samples {
                return Ok(available);
            }
            if self.data_available.wait_until(&mut state, deadline).timed_out() {
                return Err(Error::Timeout(self.id.clone()));
            }
        }
    }
}
