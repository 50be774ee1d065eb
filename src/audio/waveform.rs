// src/audio/waveform.rs

use std::path::Path;

use crate::audio::decoder::decode_audio_file;
use crate::audio::types::{AudioData, WaveformPeaks};
use crate::config::DEFAULT_NUM_PEAKS;
use crate::error::{AudioError, Result};

/// Reduce decoded audio to `num_peaks` min/max pairs for display
///
/// Every frame is assigned to exactly one segment; the min/max is taken
/// across all channels of the frames in that segment. Segments that
/// receive no frames (more peaks than frames) stay at 0.
pub fn compute_peaks(audio: &AudioData, num_peaks: usize) -> Result<WaveformPeaks> {
    if num_peaks == 0 {
        return Err(AudioError::InvalidTrimParams(
            "num_peaks must be greater than 0".to_string(),
        ));
    }

    let mut min_peaks = vec![f32::MAX; num_peaks];
    let mut max_peaks = vec![f32::MIN; num_peaks];

    let channels = audio.channels.max(1) as usize;
    let total_frames = audio.frame_count();
    let frames_per_peak = total_frames as f64 / num_peaks as f64;

    for (frame_idx, frame) in audio.samples.chunks_exact(channels).enumerate() {
        let peak_idx = ((frame_idx as f64 / frames_per_peak) as usize).min(num_peaks - 1);

        for &sample in frame {
            min_peaks[peak_idx] = min_peaks[peak_idx].min(sample);
            max_peaks[peak_idx] = max_peaks[peak_idx].max(sample);
        }
    }

    for (min, max) in min_peaks.iter_mut().zip(max_peaks.iter_mut()) {
        if *min == f32::MAX {
            *min = 0.0;
        }
        if *max == f32::MIN {
            *max = 0.0;
        }
    }

    Ok(WaveformPeaks {
        min_peaks,
        max_peaks,
        num_peaks,
        duration_seconds: audio.duration_seconds(),
        channels: audio.channels,
        sample_rate: audio.sample_rate,
    })
}

/// Decode a file and extract its waveform peaks (default: 2000 segments)
///
/// # Example
/// ```no_run
/// use wavetrim_lib::audio::extract_waveform_peaks;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let peaks = extract_waveform_peaks("long_interview.mp3", Some(2000))?;
/// println!("Peaks: {}, Duration: {:.1}s", peaks.num_peaks, peaks.duration_seconds);
/// # Ok(())
/// # }
/// ```
pub fn extract_waveform_peaks<P: AsRef<Path>>(
    path: P,
    num_peaks: Option<usize>,
) -> Result<WaveformPeaks> {
    let num_peaks = num_peaks.unwrap_or(DEFAULT_NUM_PEAKS);
    if num_peaks == 0 {
        return Err(AudioError::InvalidTrimParams(
            "num_peaks must be greater than 0".to_string(),
        ));
    }
    let audio = decode_audio_file(path)?;
    compute_peaks(&audio, num_peaks)
}
