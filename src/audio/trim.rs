// src/audio/trim.rs

use hound::{SampleFormat, WavReader, WavWriter};
use std::io::{BufWriter, Read, Seek, Write};
use std::path::Path;
use symphonia::core::formats::{SeekMode, SeekTo};
use symphonia::core::units::Time;

use crate::audio::decoder::{append_interleaved, timestamp_to_frame, OpenedTrack};
use crate::audio::encoder::float_wav_spec;
use crate::audio::types::{AudioData, TrimParams};
use crate::error::{AudioError, Result};

fn out_of_bounds(params: &TrimParams, frames: u64, sample_rate: u32) -> AudioError {
    AudioError::TrimRangeOutOfBounds {
        start: params.start_seconds,
        end: params.end_seconds,
        duration: frames as f64 / sample_rate.max(1) as f64,
    }
}

/// Trim audio data to `[start, end)`
///
/// An end past the last frame stops at the last frame. Only a start at
/// or past the end of the audio is an error.
///
/// # Example
/// ```
/// use wavetrim_lib::audio::{AudioData, TrimParams, trim_audio};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// // 10 seconds of stereo at 44.1kHz
/// let original_audio = AudioData {
///     samples: vec![0.5; 882000],
///     sample_rate: 44100,
///     channels: 2,
/// };
///
/// let params = TrimParams::new(5.0, 10.0)?;
/// let trimmed = trim_audio(&original_audio, &params)?;
///
/// assert_eq!(trimmed.duration_seconds(), 5.0);
/// assert_eq!(trimmed.channels, 2);
/// # Ok(())
/// # }
/// ```
pub fn trim_audio(audio: &AudioData, params: &TrimParams) -> Result<AudioData> {
    let total_frames = audio.frame_count() as u64;
    let (start_frame, end_frame) = clamped_frame_range(params, audio.sample_rate, total_frames)?;

    // Frame indices times channel count keeps the slice frame-aligned
    let channels = audio.channels as usize;
    let start = start_frame as usize * channels;
    let end = end_frame as usize * channels;

    Ok(AudioData {
        samples: audio.samples[start..end].to_vec(),
        sample_rate: audio.sample_rate,
        channels: audio.channels,
    })
}

/// Frame range of `params`, with the end cut back to `total_frames`
fn clamped_frame_range(params: &TrimParams, sample_rate: u32, total_frames: u64) -> Result<(u64, u64)> {
    let (start_frame, end_frame) = params.frame_range(sample_rate);
    let end_frame = end_frame.min(total_frames);
    if start_frame >= end_frame {
        return Err(out_of_bounds(params, total_frames, sample_rate));
    }
    Ok((start_frame, end_frame))
}

fn is_wav_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

fn copy_samples<S, R, W>(
    reader: &mut WavReader<R>,
    writer: &mut WavWriter<W>,
    count: usize,
) -> Result<()>
where
    S: hound::Sample,
    R: Read,
    W: Write + Seek,
{
    for sample in reader.samples::<S>().take(count) {
        let sample = sample
            .map_err(|e| AudioError::DecodeFailed(format!("Failed to read samples: {}", e)))?;
        writer
            .write_sample(sample)
            .map_err(|e| AudioError::EncodeFailed(format!("Failed to write sample: {}", e)))?;
    }
    Ok(())
}

/// Copy a frame range between WAV files without decoding
///
/// The output keeps the input's sample format.
fn trim_wav_direct(input_path: &Path, output_path: &Path, params: &TrimParams) -> Result<()> {
    let mut reader = WavReader::open(input_path)
        .map_err(|e| AudioError::DecodeFailed(format!("Failed to open WAV: {}", e)))?;

    let spec = reader.spec();
    let total_frames = reader.duration() as u64;
    let (start_frame, end_frame) = clamped_frame_range(params, spec.sample_rate, total_frames)?;

    reader
        .seek(start_frame as u32)
        .map_err(|e| AudioError::DecodeFailed(format!("Seek failed: {}", e)))?;

    let mut writer = WavWriter::create(output_path, spec)
        .map_err(|e| AudioError::EncodeFailed(format!("Failed to create WAV: {}", e)))?;

    let count = ((end_frame - start_frame) * spec.channels as u64) as usize;
    match spec.sample_format {
        SampleFormat::Float => copy_samples::<f32, _, _>(&mut reader, &mut writer, count)?,
        SampleFormat::Int => copy_samples::<i32, _, _>(&mut reader, &mut writer, count)?,
    }

    writer
        .finalize()
        .map_err(|e| AudioError::EncodeFailed(format!("Failed to finalize WAV: {}", e)))?;

    Ok(())
}

/// Decode only the requested range of a compressed file into a float WAV
///
/// Seeks close to the start first; packets that straddle a boundary are
/// cut at frame precision using their timestamps.
fn trim_compressed_streaming(
    input_path: &Path,
    output_path: &Path,
    params: &TrimParams,
) -> Result<()> {
    let mut track = OpenedTrack::open_path(input_path)?;
    let sample_rate = track.sample_rate()?;
    let (start_frame, end_frame) = params.frame_range(sample_rate);
    let track_id = track.track_id;
    let time_base = track.params.time_base;

    let seek = SeekTo::Time {
        time: Time::from(params.start_seconds),
        track_id: Some(track_id),
    };
    if let Err(e) = track.format.seek(SeekMode::Accurate, seek) {
        // Unseekable streams are read from the top and skipped forward
        tracing::debug!("Seek failed, decoding from the start: {}", e);
    }
    track.decoder.reset();

    let mut writer: Option<WavWriter<BufWriter<std::fs::File>>> = None;
    let mut chunk = Vec::new();
    let mut stream_end = 0u64;

    // Packet timestamps are in the track's time base, not always frames
    while let Some((ts, decoded)) = track.next_buffer()? {
        let first = timestamp_to_frame(ts, time_base, sample_rate);
        if first >= end_frame {
            break;
        }

        chunk.clear();
        let channels = append_interleaved(decoded, &mut chunk) as u64;
        let frames = chunk.len() as u64 / channels.max(1);
        stream_end = first + frames;

        let from = start_frame.max(first);
        let to = end_frame.min(stream_end);
        if from >= to {
            continue;
        }

        if writer.is_none() {
            let spec = float_wav_spec(sample_rate, channels as u16);
            writer = Some(
                WavWriter::create(output_path, spec)
                    .map_err(|e| AudioError::EncodeFailed(format!("Failed to create WAV: {}", e)))?,
            );
        }
        if let Some(writer) = writer.as_mut() {
            let lo = ((from - first) * channels) as usize;
            let hi = ((to - first) * channels) as usize;
            for &sample in &chunk[lo..hi] {
                writer
                    .write_sample(sample)
                    .map_err(|e| AudioError::EncodeFailed(format!("Write failed: {}", e)))?;
            }
        }
    }

    // A stream that ends before `end_frame` just makes a shorter clip;
    // one that ends before `start_frame` makes none
    let Some(writer) = writer else {
        return Err(out_of_bounds(params, stream_end, sample_rate));
    };
    writer
        .finalize()
        .map_err(|e| AudioError::EncodeFailed(format!("Failed to finalize: {}", e)))?;

    Ok(())
}

/// Trim an audio file into a WAV file using the cheapest method available
///
/// - WAV input: samples are copied without decoding
/// - anything else: decoded with seeking, written as 32-bit float WAV
///
/// # Example
/// ```no_run
/// use wavetrim_lib::audio::{trim_audio_file, TrimParams};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let params = TrimParams::new(5.0, 10.0)?;
/// trim_audio_file("input.mp3", "output.wav", &params)?;
/// # Ok(())
/// # }
/// ```
pub fn trim_audio_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input_path: P,
    output_path: Q,
    params: &TrimParams,
) -> Result<()> {
    let input_path = input_path.as_ref();
    let output_path = output_path.as_ref();
    if is_wav_file(input_path) {
        trim_wav_direct(input_path, output_path, params)
    } else {
        trim_compressed_streaming(input_path, output_path, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::encoder::{encode_mp3, encode_wav};

    /// Each frame carries its own index so cuts can be checked exactly
    fn indexed_audio(frames: usize, sample_rate: u32, channels: u16) -> AudioData {
        let samples = (0..frames)
            .flat_map(|f| std::iter::repeat(f as f32 / frames as f32).take(channels as usize))
            .collect();
        AudioData {
            samples,
            sample_rate,
            channels,
        }
    }

    #[test]
    fn test_trim_middle_section() {
        let audio = indexed_audio(10 * 8000, 8000, 2);
        let params = TrimParams::new(3.0, 7.0).unwrap();
        let trimmed = trim_audio(&audio, &params).unwrap();

        assert_eq!(trimmed.duration_seconds(), 4.0);
        assert_eq!(trimmed.samples[0], audio.samples[3 * 8000 * 2]);
    }

    #[test]
    fn test_trim_whole_file() {
        let audio = indexed_audio(8000, 8000, 1);
        let params = TrimParams::new(0.0, 1.0).unwrap();
        assert_eq!(trim_audio(&audio, &params).unwrap(), audio);
    }

    #[test]
    fn test_trim_end_past_audio_stops_at_last_frame() {
        let audio = indexed_audio(10 * 8000, 8000, 2);
        let params = TrimParams::new(5.0, 15.0).unwrap();
        let trimmed = trim_audio(&audio, &params).unwrap();

        assert_eq!(trimmed.duration_seconds(), 5.0);
        assert_eq!(trimmed.samples.last(), audio.samples.last());
    }

    #[test]
    fn test_trim_start_past_audio_is_out_of_bounds() {
        let audio = indexed_audio(10 * 8000, 8000, 2);
        let params = TrimParams::new(10.0, 15.0).unwrap();

        match trim_audio(&audio, &params) {
            Err(AudioError::TrimRangeOutOfBounds { duration, .. }) => assert_eq!(duration, 10.0),
            other => panic!("Expected TrimRangeOutOfBounds, got {:?}", other),
        }
    }

    #[test]
    fn test_trim_wav_file_copies_exact_frames() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let output = dir.path().join("out.wav");
        let audio = indexed_audio(10 * 8000, 8000, 2);
        encode_wav(&audio, &input).unwrap();

        let params = TrimParams::new(2.0, 5.0).unwrap();
        trim_audio_file(&input, &output, &params).unwrap();

        let mut reader = WavReader::open(&output).unwrap();
        assert_eq!(reader.duration(), 3 * 8000);
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples[0], audio.samples[2 * 8000 * 2]);
        assert_eq!(samples.last(), audio.samples.get(5 * 8000 * 2 - 1));
    }

    #[test]
    fn test_trim_int_wav_keeps_format() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in16.wav");
        let output = dir.path().join("out16.wav");

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 1000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&input, spec).unwrap();
        for i in 0..2000i32 {
            writer.write_sample(i as i16).unwrap();
        }
        writer.finalize().unwrap();

        let params = TrimParams::new(0.5, 1.0).unwrap();
        trim_audio_file(&input, &output, &params).unwrap();

        let mut reader = WavReader::open(&output).unwrap();
        assert_eq!(reader.spec(), spec);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 500);
        assert_eq!(samples[0], 500);
    }

    #[test]
    fn test_trim_wav_file_end_past_audio_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("short.wav");
        let output = dir.path().join("x.wav");
        encode_wav(&indexed_audio(8000, 8000, 1), &input).unwrap();

        let params = TrimParams::new(0.0, 15.0).unwrap();
        trim_audio_file(&input, &output, &params).unwrap();
        assert_eq!(WavReader::open(&output).unwrap().duration(), 8000);

        let params = TrimParams::new(2.0, 15.0).unwrap();
        let result = trim_audio_file(&input, dir.path().join("y.wav"), &params);
        assert!(matches!(result, Err(AudioError::TrimRangeOutOfBounds { .. })));
    }

    #[test]
    fn test_streaming_path_on_extensionless_input() {
        // No .wav extension forces the decode path; the container is sniffed
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("audio.bin");
        let output = dir.path().join("out.wav");
        let audio = indexed_audio(4 * 8000, 8000, 1);
        encode_wav(&audio, &input).unwrap();

        let params = TrimParams::new(1.0, 3.0).unwrap();
        trim_audio_file(&input, &output, &params).unwrap();

        let mut reader = WavReader::open(&output).unwrap();
        assert_eq!(reader.duration(), 2 * 8000);
        let first = reader.samples::<f32>().next().unwrap().unwrap();
        assert_eq!(first, audio.samples[8000]);
    }

    #[test]
    fn test_streaming_end_past_audio_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("audio.bin");
        let output = dir.path().join("out.wav");
        encode_wav(&indexed_audio(2 * 8000, 8000, 1), &input).unwrap();

        let params = TrimParams::new(1.0, 15.0).unwrap();
        trim_audio_file(&input, &output, &params).unwrap();
        assert_eq!(WavReader::open(&output).unwrap().duration(), 8000);

        let params = TrimParams::new(3.0, 15.0).unwrap();
        let result = trim_audio_file(&input, dir.path().join("none.wav"), &params);
        assert!(matches!(result, Err(AudioError::TrimRangeOutOfBounds { .. })));
    }

    #[test]
    fn test_streaming_mp3_cuts_by_time_not_packet_count() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("tone.mp3");
        let output = dir.path().join("out.wav");
        let samples = (0..3 * 44100)
            .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / 44100.0).sin() * 0.5)
            .collect();
        let audio = AudioData {
            samples,
            sample_rate: 44100,
            channels: 1,
        };
        std::fs::write(&input, encode_mp3(&audio).unwrap()).unwrap();

        let params = TrimParams::new(1.0, 2.0).unwrap();
        trim_audio_file(&input, &output, &params).unwrap();

        let reader = WavReader::open(&output).unwrap();
        assert_eq!(reader.spec().sample_rate, 44100);
        assert_eq!(reader.duration(), 44100);
    }
}
