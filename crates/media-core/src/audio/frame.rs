//! Immutable PCM frames exchanged through the pool.

use crate::audio::format::AudioFormat;
use crate::Sample;

/// A chunk of PCM samples in a given [`AudioFormat`] plus a voice-activity
/// flag.
///
/// Frames are produced once and then shared read-only between producer and
/// consumers; the pool never mutates a frame in place, a mixed read
/// allocates a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Interleaved PCM samples
    pub samples: Vec<Sample>,
    /// Format the samples are in
    pub format: AudioFormat,
    /// Whether voice activity was detected in this frame
    pub has_voice: bool,
}

impl AudioFrame {
    /// Create a new frame
    pub fn new(samples: Vec<Sample>, format: AudioFormat, has_voice: bool) -> Self {
        Self {
            samples,
            format,
            has_voice,
        }
    }

    /// A silent frame of `len` samples
    pub fn silence(len: usize, format: AudioFormat) -> Self {
        Self::new(vec![0; len], format, false)
    }

    /// Number of samples in the frame
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check whether the frame carries no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration of the frame in milliseconds
    pub fn duration_ms(&self) -> u32 {
        let per_sec = self.format.samples_per_sec();
        if per_sec == 0 {
            return 0;
        }
        (self.len() as u32 * 1000) / per_sec
    }

    /// Additively mix another frame into this one.
    ///
    /// Samples are combined with saturating addition, so an N-way overload
    /// clips at full scale instead of wrapping around. The voice flag is
    /// OR-ed. If the other frame is longer, this frame grows to cover it.
    pub fn mix(&mut self, other: &AudioFrame) {
        if other.len() > self.len() {
            self.samples.resize(other.len(), 0);
        }
        for (dst, src) in self.samples.iter_mut().zip(other.samples.iter()) {
            *dst = dst.saturating_add(*src);
        }
        self.has_voice |= other.has_voice;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mix_is_additive() {
        let fmt = AudioFormat::telephony();
        let mut a = AudioFrame::new(vec![100, -50], fmt, false);
        let b = AudioFrame::new(vec![25, 25], fmt, true);
        a.mix(&b);
        assert_eq!(a.samples, vec![125, -25]);
        assert!(a.has_voice);
    }

    #[test]
    fn mix_saturates_at_full_scale() {
        let fmt = AudioFormat::telephony();
        let mut a = AudioFrame::new(vec![i16::MAX, i16::MIN], fmt, false);
        let b = AudioFrame::new(vec![1000, -1000], fmt, false);
        a.mix(&b);
        assert_eq!(a.samples, vec![i16::MAX, i16::MIN]);
    }

    #[test]
    fn mix_grows_to_longest_source() {
        let fmt = AudioFormat::telephony();
        let mut a = AudioFrame::new(vec![5], fmt, false);
        let b = AudioFrame::new(vec![1, 2, 3], fmt, false);
        a.mix(&b);
        assert_eq!(a.samples, vec![6, 2, 3]);
    }
}
