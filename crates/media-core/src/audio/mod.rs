//! Audio routing core: formats, frames, ring buffers and the binding pool.

pub mod format;
pub mod frame;
pub mod ring_buffer;
pub mod pool;
