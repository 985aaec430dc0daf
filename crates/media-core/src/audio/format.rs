//! Audio format value types.
//!
//! The pool keeps one *internal format* all ring buffers are normalized to;
//! every frame that crosses the pool boundary carries its format so the
//! mixing step never has to guess.

use std::fmt;

use serde::{Deserialize, Serialize};

/// PCM sample rate in Hz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleRate {
    /// 8kHz (narrowband telephony)
    Rate8000 = 8000,
    /// 16kHz (wideband)
    Rate16000 = 16000,
    /// 32kHz
    Rate32000 = 32000,
    /// 44.1kHz (CD quality)
    Rate44100 = 44100,
    /// 48kHz
    Rate48000 = 48000,
}

impl SampleRate {
    /// Get the sample rate in Hz
    pub fn as_hz(&self) -> u32 {
        *self as u32
    }

    /// Create from a raw Hz value, defaulting to 8kHz if not recognized
    pub fn from_hz(hz: u32) -> Self {
        match hz {
            8000 => Self::Rate8000,
            16000 => Self::Rate16000,
            32000 => Self::Rate32000,
            44100 => Self::Rate44100,
            48000 => Self::Rate48000,
            _ => Self::Rate8000,
        }
    }
}

impl Default for SampleRate {
    fn default() -> Self {
        Self::Rate8000
    }
}

/// Sample representation of a PCM stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleFormat {
    /// Signed 16-bit linear PCM (the mixing format)
    S16,
    /// 32-bit float PCM
    F32,
}

impl SampleFormat {
    /// Bytes occupied by one sample
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            Self::S16 => 2,
            Self::F32 => 4,
        }
    }
}

impl Default for SampleFormat {
    fn default() -> Self {
        Self::S16
    }
}

/// Audio format (sample rate, channel count, sample representation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate
    pub sample_rate: SampleRate,
    /// Number of channels (1 for mono, 2 for stereo)
    pub channels: u8,
    /// Sample representation
    pub sample_format: SampleFormat,
}

impl AudioFormat {
    /// Create a new audio format
    pub fn new(sample_rate: SampleRate, channels: u8, sample_format: SampleFormat) -> Self {
        Self {
            sample_rate,
            channels,
            sample_format,
        }
    }

    /// Mono 16-bit format with the given sample rate
    pub fn mono_16bit(sample_rate: SampleRate) -> Self {
        Self::new(sample_rate, 1, SampleFormat::S16)
    }

    /// Standard narrowband telephony format (mono, 16-bit, 8kHz)
    pub fn telephony() -> Self {
        Self::mono_16bit(SampleRate::Rate8000)
    }

    /// Samples per second across all channels
    pub fn samples_per_sec(&self) -> u32 {
        self.sample_rate.as_hz() * self.channels as u32
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::telephony()
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz/{}ch/{:?}",
            self.sample_rate.as_hz(),
            self.channels,
            self.sample_format
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_rate_round_trip() {
        assert_eq!(SampleRate::from_hz(16000).as_hz(), 16000);
        // Unrecognized rates fall back to narrowband
        assert_eq!(SampleRate::from_hz(11025), SampleRate::Rate8000);
    }

    #[test]
    fn format_equality() {
        assert_eq!(AudioFormat::telephony(), AudioFormat::mono_16bit(SampleRate::Rate8000));
        assert_ne!(AudioFormat::telephony(), AudioFormat::mono_16bit(SampleRate::Rate48000));
    }
}
