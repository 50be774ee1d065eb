use serde::{Deserialize, Serialize};

/// Decoded audio held in memory as interleaved 32-bit float PCM
///
/// Stereo is stored `[L, R, L, R, ...]`, mono `[M, M, ...]`, every
/// sample in the range [-1.0, 1.0].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioData {
    pub samples: Vec<f32>,

    /// Sample rate in Hz (e.g., 44100, 48000)
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channels: u16,
}

impl AudioData {
    /// Total duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        if self.channels == 0 || self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Number of frames (one sample per channel)
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }
}

/// Metadata about an audio file without loading all samples
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioInfo {
    /// Total duration in seconds (0 when the container does not say)
    pub duration_seconds: f64,

    pub sample_rate: u32,

    pub channels: u16,

    /// Codec name as reported by symphonia
    pub format: String,

    pub bit_depth: Option<u16>,
}

/// Validated clip boundaries in seconds, `start` inclusive and `end` exclusive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimParams {
    pub start_seconds: f64,
    pub end_seconds: f64,
}

impl TrimParams {
    /// Create new trim parameters with validation
    pub fn new(start_seconds: f64, end_seconds: f64) -> crate::error::Result<Self> {
        use crate::error::AudioError;

        if !start_seconds.is_finite() || !end_seconds.is_finite() {
            return Err(AudioError::InvalidTrimParams(format!(
                "Times must be finite: {} to {}",
                start_seconds, end_seconds
            )));
        }

        if start_seconds < 0.0 {
            return Err(AudioError::InvalidTrimParams(format!(
                "Start time cannot be negative: {}",
                start_seconds
            )));
        }

        if end_seconds <= start_seconds {
            return Err(AudioError::InvalidTrimParams(format!(
                "End time ({}) must be greater than start time ({})",
                end_seconds, start_seconds
            )));
        }

        Ok(Self {
            start_seconds,
            end_seconds,
        })
    }

    pub fn trim_duration(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }

    /// Frame range `[start, end)` at the given sample rate
    pub fn frame_range(&self, sample_rate: u32) -> (u64, u64) {
        let rate = sample_rate as f64;
        (
            (self.start_seconds * rate).round() as u64,
            (self.end_seconds * rate).round() as u64,
        )
    }
}

/// Min/max amplitude per display segment, for drawing a waveform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformPeaks {
    pub min_peaks: Vec<f32>,
    pub max_peaks: Vec<f32>,
    pub num_peaks: usize,
    pub duration_seconds: f64,
    pub channels: u16,
    pub sample_rate: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_and_frames() {
        let audio = AudioData {
            samples: vec![0.0; 88200],
            sample_rate: 44100,
            channels: 2,
        };
        assert_eq!(audio.frame_count(), 44100);
        assert_eq!(audio.duration_seconds(), 1.0);
    }

    #[test]
    fn test_invalid_trim_params() {
        assert!(TrimParams::new(10.0, 5.0).is_err());
        assert!(TrimParams::new(5.0, 5.0).is_err());
        assert!(TrimParams::new(-1.0, 5.0).is_err());
        assert!(TrimParams::new(0.0, f64::NAN).is_err());
    }

    #[test]
    fn test_frame_range() {
        let params = TrimParams::new(2.0, 5.0).unwrap();
        assert_eq!(params.frame_range(8000), (16000, 40000));
        assert_eq!(params.trim_duration(), 3.0);
    }
}
