//! Process-scoped registry of ring buffers plus the binding graph.
//!
//! The pool owns two things: a weak-reference cache of every live
//! [`RingBuffer`] (the pool never extends a buffer's lifetime past its real
//! owners) and the *read bindings* map describing which entity may read
//! which buffer. Full-duplex binds are symmetric edges, half-duplex binds
//! one-directional; the read path mixes every bound source that currently
//! has data.
//!
//! One non-reentrant mutex guards the cache and the graph. Public entry
//! points lock it exactly once and delegate to `*_locked` helpers; the
//! sample-copy/mix arithmetic itself runs with the lock released, against a
//! snapshot of the bound sources.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::audio::format::{AudioFormat, SampleRate};
use crate::audio::frame::AudioFrame;
use crate::audio::ring_buffer::RingBuffer;
use crate::error::{Error, Result};

/// Source-buffer set one reader is bound to, keyed by buffer id
type ReadBindings = HashMap<String, Arc<RingBuffer>>;

struct PoolState {
    /// id -> weak cache of live buffers
    buffers: HashMap<String, Weak<RingBuffer>>,
    /// reader id -> the buffers that reader consumes
    bindings: HashMap<String, ReadBindings>,
    /// Format all buffers are normalized to
    format: AudioFormat,
}

/// Registry of per-entity ring buffers and the dynamic binding graph
/// between them.
pub struct RingBufferPool {
    state: Mutex<PoolState>,
    /// Strong reference to the hardware-path buffer; every other buffer is
    /// kept alive by its call/session owner only.
    default_ring_buffer: Arc<RingBuffer>,
}

impl RingBufferPool {
    /// Reserved id for the local hardware path (microphone/speaker)
    pub const DEFAULT_ID: &'static str = "audiolayer_id";

    /// Create a pool normalized to `format`, with the hardware-path buffer
    /// already registered.
    pub fn new(format: AudioFormat) -> Self {
        let default_ring_buffer = Arc::new(RingBuffer::new(Self::DEFAULT_ID, format));
        let mut buffers = HashMap::new();
        buffers.insert(
            Self::DEFAULT_ID.to_string(),
            Arc::downgrade(&default_ring_buffer),
        );

        Self {
            state: Mutex::new(PoolState {
                buffers,
                bindings: HashMap::new(),
                format,
            }),
            default_ring_buffer,
        }
    }

    /// The hardware-path buffer
    pub fn default_ring_buffer(&self) -> &Arc<RingBuffer> {
        &self.default_ring_buffer
    }

    /// Format all buffers are currently normalized to
    pub fn internal_audio_format(&self) -> AudioFormat {
        self.state.lock().format
    }

    /// Change the pool's internal format. Every live buffer is flushed
    /// first (no data crosses a format change) and retagged.
    pub fn set_internal_audio_format(&self, format: AudioFormat) {
        let mut state = self.state.lock();
        if format == state.format {
            return;
        }
        debug!("Internal audio format {} -> {}", state.format, format);
        Self::flush_all_buffers_locked(&mut state);
        for weak in state.buffers.values() {
            if let Some(rb) = weak.upgrade() {
                rb.set_format(format);
            }
        }
        state.format = format;
    }

    /// Change only the internal sample rate
    pub fn set_internal_sample_rate(&self, sample_rate: SampleRate) {
        let format = {
            let state = self.state.lock();
            AudioFormat {
                sample_rate,
                ..state.format
            }
        };
        self.set_internal_audio_format(format);
    }

    /// Return the live buffer for `id`, creating and registering one in the
    /// pool's internal format if needed. Idempotent.
    pub fn create_ring_buffer(&self, id: &str) -> Arc<RingBuffer> {
        let mut state = self.state.lock();
        if let Ok(rb) = Self::get_ring_buffer_locked(&mut state, id) {
            debug!("Ring buffer already exists for id '{}'", id);
            return rb;
        }

        let rb = Arc::new(RingBuffer::new(id, state.format));
        state.buffers.insert(id.to_string(), Arc::downgrade(&rb));
        debug!("Ring buffer created with id '{}'", id);
        rb
    }

    /// Look up the live buffer for `id`, purging the cache entry if its
    /// weak reference has expired.
    pub fn get_ring_buffer(&self, id: &str) -> Option<Arc<RingBuffer>> {
        Self::get_ring_buffer_locked(&mut self.state.lock(), id).ok()
    }

    fn get_ring_buffer_locked(state: &mut PoolState, id: &str) -> Result<Arc<RingBuffer>> {
        match state.buffers.get(id) {
            Some(weak) => match weak.upgrade() {
                Some(rb) => Ok(rb),
                None => {
                    state.buffers.remove(id);
                    Err(Error::BufferNotFound(id.to_string()))
                }
            },
            None => Err(Error::BufferNotFound(id.to_string())),
        }
    }

    /// Make `reader` a reader of `rbuf`
    fn add_reader_locked(state: &mut PoolState, rbuf: &Arc<RingBuffer>, reader: &str) {
        if reader != Self::DEFAULT_ID && rbuf.id == reader {
            warn!("Ring buffer '{}' binding a read offset on itself", reader);
        }

        rbuf.create_read_offset(reader);
        state
            .bindings
            .entry(reader.to_string())
            .or_default()
            .insert(rbuf.id.clone(), rbuf.clone());
        debug!("Bind rbuf '{}' to reader '{}'", rbuf.id, reader);
    }

    fn remove_reader_locked(state: &mut PoolState, rbuf: &Arc<RingBuffer>, reader: &str) {
        if let Some(bindings) = state.bindings.get_mut(reader) {
            bindings.remove(&rbuf.id);
            if bindings.is_empty() {
                state.bindings.remove(reader);
            }
        }
        rbuf.remove_read_offset(reader);
    }

    /// Symmetric edge: `id1` becomes a reader of `id2`'s buffer and vice
    /// versa. Idempotent. If either id has no live buffer, logs and leaves
    /// the graph untouched.
    pub fn bind_ring_buffers(&self, id1: &str, id2: &str) {
        let mut state = self.state.lock();

        let rb1 = match Self::get_ring_buffer_locked(&mut state, id1) {
            Ok(rb) => rb,
            Err(e) => {
                error!("Bind failed: {}", e);
                return;
            }
        };
        let rb2 = match Self::get_ring_buffer_locked(&mut state, id2) {
            Ok(rb) => rb,
            Err(e) => {
                error!("Bind failed: {}", e);
                return;
            }
        };

        Self::add_reader_locked(&mut state, &rb1, id2);
        Self::add_reader_locked(&mut state, &rb2, id1);
    }

    /// Remove the symmetric edge between `id1` and `id2`
    pub fn unbind_ring_buffers(&self, id1: &str, id2: &str) {
        let mut state = self.state.lock();

        let rb1 = match Self::get_ring_buffer_locked(&mut state, id1) {
            Ok(rb) => rb,
            Err(e) => {
                error!("Unbind failed: {}", e);
                return;
            }
        };
        let rb2 = match Self::get_ring_buffer_locked(&mut state, id2) {
            Ok(rb) => rb,
            Err(e) => {
                error!("Unbind failed: {}", e);
                return;
            }
        };

        Self::remove_reader_locked(&mut state, &rb1, id2);
        Self::remove_reader_locked(&mut state, &rb2, id1);
    }

    /// One-directional edge: `reader_id` may read `source_id`, the source
    /// never reads back. Used by passive listeners (e.g. the hardware path
    /// observing a conference) so their own output is never re-injected.
    /// No-op if the source has no live buffer.
    pub fn bind_half_duplex_out(&self, reader_id: &str, source_id: &str) {
        let mut state = self.state.lock();
        if let Ok(rb) = Self::get_ring_buffer_locked(&mut state, source_id) {
            Self::add_reader_locked(&mut state, &rb, reader_id);
        }
    }

    /// Remove the one-directional edge `reader_id` -> `source_id`
    pub fn unbind_half_duplex_out(&self, reader_id: &str, source_id: &str) {
        let mut state = self.state.lock();
        if let Ok(rb) = Self::get_ring_buffer_locked(&mut state, source_id) {
            Self::remove_reader_locked(&mut state, &rb, reader_id);
        }
    }

    /// Remove every edge where `id` is the reader
    pub fn unbind_all_half_duplex_out(&self, id: &str) {
        let mut state = self.state.lock();
        Self::unbind_all_half_duplex_out_locked(&mut state, id);
    }

    fn unbind_all_half_duplex_out_locked(state: &mut PoolState, id: &str) {
        if let Some(bindings) = state.bindings.remove(id) {
            for rbuf in bindings.values() {
                rbuf.remove_read_offset(id);
            }
        }
    }

    /// Remove every edge where `id`'s buffer is the source
    pub fn unbind_all_half_duplex_in(&self, id: &str) {
        let mut state = self.state.lock();
        Self::unbind_all_half_duplex_in_locked(&mut state, id);
    }

    fn unbind_all_half_duplex_in_locked(state: &mut PoolState, id: &str) {
        let mut emptied = Vec::new();
        for (reader, bindings) in state.bindings.iter_mut() {
            if let Some(rbuf) = bindings.remove(id) {
                rbuf.remove_read_offset(reader);
                if bindings.is_empty() {
                    emptied.push(reader.clone());
                }
            }
        }
        for reader in emptied {
            state.bindings.remove(&reader);
        }
    }

    /// Remove every edge touching `id`, in both directions. Used on hangup
    /// and conference teardown.
    pub fn unbind_all(&self, id: &str) {
        let mut state = self.state.lock();
        Self::unbind_all_half_duplex_out_locked(&mut state, id);
        Self::unbind_all_half_duplex_in_locked(&mut state, id);
    }

    /// Snapshot of the buffers `reader` is currently bound to, by id.
    /// Diagnostic counterpart of the graph; sorted for stable output.
    pub fn bound_sources(&self, reader: &str) -> Vec<String> {
        let state = self.state.lock();
        let mut ids: Vec<String> = state
            .bindings
            .get(reader)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Snapshot the bound sources for `reader` together with the internal
    /// format, releasing the lock before any sample work.
    fn sources_for(&self, reader: &str) -> (Vec<Arc<RingBuffer>>, AudioFormat) {
        let state = self.state.lock();
        let sources = state
            .bindings
            .get(reader)
            .map(|b| b.values().cloned().collect())
            .unwrap_or_default();
        (sources, state.format)
    }

    /// The mixing primitive: consume one frame from every bound source that
    /// currently has data.
    ///
    /// - Exactly one bound source: its frame is passed through unmodified
    ///   (zero-copy, bit-exact PCM).
    /// - Several sources: a new frame is allocated in the internal format;
    ///   each contributing frame is saturating-added in and its voice flag
    ///   OR-ed. Sources with nothing pending are skipped, never waited on.
    /// - No source has data (or `reader` has no bindings): `None`.
    pub fn get_data(&self, reader: &str) -> Option<Arc<AudioFrame>> {
        let (sources, format) = self.sources_for(reader);

        if sources.is_empty() {
            return None;
        }

        // No mixing
        if sources.len() == 1 {
            return sources[0].get(reader);
        }

        let mut mixed: Option<AudioFrame> = None;
        for rbuf in &sources {
            if let Some(frame) = rbuf.get(reader) {
                match mixed.as_mut() {
                    Some(acc) => acc.mix(&frame),
                    None => {
                        let mut acc = (*frame).clone();
                        acc.format = format;
                        mixed = Some(acc);
                    }
                }
            }
        }

        mixed.map(Arc::new)
    }

    /// Like [`get_data`](Self::get_data), but gated on joint availability:
    /// returns `None` unless every currently-active source can contribute,
    /// so a mixed read never runs past what the sources jointly guarantee.
    pub fn get_available_data(&self, reader: &str) -> Option<Arc<AudioFrame>> {
        if self.available_for_get(reader) == 0 {
            return None;
        }
        self.get_data(reader)
    }

    /// Samples a mixed read for `reader` is currently guaranteed: the
    /// minimum over each bound source's availability, excluding sources
    /// that report zero. Returns 0 when no bound source has data.
    pub fn available_for_get(&self, reader: &str) -> usize {
        let state = self.state.lock();
        let bindings = match state.bindings.get(reader) {
            Some(b) => b,
            None => return 0,
        };

        // No mixing
        if bindings.len() == 1 {
            return bindings
                .values()
                .next()
                .map(|rbuf| rbuf.available_for_get(reader))
                .unwrap_or(0);
        }

        bindings
            .values()
            .map(|rbuf| rbuf.available_for_get(reader))
            .filter(|n| *n > 0)
            .min()
            .unwrap_or(0)
    }

    /// Skip ahead `n_samples` on every bound source for `reader`
    pub fn discard(&self, n_samples: usize, reader: &str) -> usize {
        let state = self.state.lock();
        let bindings = match state.bindings.get(reader) {
            Some(b) => b,
            None => return 0,
        };
        for rbuf in bindings.values() {
            rbuf.discard(n_samples, reader);
        }
        n_samples
    }

    /// Drop `reader`'s backlog on every bound source. Used on hold/resume
    /// so stale audio is never replayed.
    pub fn flush(&self, reader: &str) {
        let state = self.state.lock();
        if let Some(bindings) = state.bindings.get(reader) {
            for rbuf in bindings.values() {
                rbuf.flush(reader);
            }
        }
    }

    /// Flush every live buffer, purging dead cache entries on the way
    pub fn flush_all_buffers(&self) {
        Self::flush_all_buffers_locked(&mut self.state.lock());
    }

    fn flush_all_buffers_locked(state: &mut PoolState) {
        state.buffers.retain(|_, weak| match weak.upgrade() {
            Some(rb) => {
                rb.flush_all();
                true
            }
            None => false,
        });
    }

    /// Block until every bound source can deliver `min_samples` to `reader`
    /// or `max_wait` elapses. The one designed blocking point of the pool,
    /// used by senders to pace packetization. The binding snapshot is taken
    /// once; the pool lock is not held while waiting.
    pub fn wait_for_data_available(
        &self,
        reader: &str,
        min_samples: usize,
        max_wait: Duration,
    ) -> bool {
        let deadline = Instant::now() + max_wait;
        let (sources, _) = self.sources_for(reader);

        if sources.is_empty() {
            return false;
        }
        for rbuf in &sources {
            if let Err(e) = rbuf.wait_for_data(reader, min_samples, deadline) {
                debug!("Wait on '{}' for '{}' gave up: {}", rbuf.id, reader, e);
                return false;
            }
        }
        true
    }
}

impl Drop for RingBufferPool {
    fn drop(&mut self) {
        let state = self.state.lock();
        for (id, weak) in &state.buffers {
            if id != Self::DEFAULT_ID && weak.upgrade().is_some() {
                warn!("Leaking ring buffer '{}'", id);
            }
        }
    }
}
