// src/audio/encoder.rs

use hound::{SampleFormat, WavSpec, WavWriter};
use mp3lame_encoder::{Bitrate, Builder, FlushNoGap, InterleavedPcm, MonoPcm};
use std::io::{Cursor, Seek, Write};
use std::path::Path;

use crate::audio::types::AudioData;
use crate::error::{AudioError, Result};

/// 32-bit float WAV layout for the given stream parameters
pub(crate) fn float_wav_spec(sample_rate: u32, channels: u16) -> WavSpec {
    WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    }
}

fn write_samples<W: Write + Seek>(audio: &AudioData, writer: W) -> Result<()> {
    let mut writer = WavWriter::new(writer, float_wav_spec(audio.sample_rate, audio.channels))?;
    for &sample in &audio.samples {
        writer.write_sample(sample)?;
    }
    // Writes the final chunk sizes into the header
    writer.finalize()?;
    Ok(())
}

/// Encode PCM audio data to a 32-bit float WAV file
///
/// # Example
/// ```
/// use wavetrim_lib::audio::{AudioData, encode_wav};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let audio = AudioData {
///     samples: vec![0.0, 0.5, -0.5, 1.0, -1.0],
///     sample_rate: 44100,
///     channels: 1,
/// };
/// # let output_path = std::env::temp_dir().join("wavetrim_doc_output.wav");
/// encode_wav(&audio, &output_path)?;
/// # std::fs::remove_file(&output_path).ok();
/// # Ok(())
/// # }
/// ```
pub fn encode_wav<P: AsRef<Path>>(audio: &AudioData, output_path: P) -> Result<()> {
    let file = std::io::BufWriter::new(std::fs::File::create(output_path)?);
    write_samples(audio, file)
}

/// Encode PCM audio data to WAV bytes held in memory
pub fn encode_wav_bytes(audio: &AudioData) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    write_samples(audio, Cursor::new(&mut bytes))?;
    Ok(bytes)
}

fn mp3_error<E: std::fmt::Debug>(what: &str, e: E) -> AudioError {
    AudioError::EncodeFailed(format!("{}: {:?}", what, e))
}

/// Constant bitrate that LAME accepts at `sample_rate`
fn mp3_bitrate(sample_rate: u32) -> Bitrate {
    match sample_rate {
        0..=15_999 => Bitrate::Kbps32,
        16_000..=31_999 => Bitrate::Kbps64,
        _ => Bitrate::Kbps128,
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

/// Encode PCM audio data to MP3 bytes
///
/// MP3 carries at most two channels; anything past the second is dropped.
pub fn encode_mp3(audio: &AudioData) -> Result<Vec<u8>> {
    let in_channels = audio.channels.max(1) as usize;
    let out_channels = in_channels.min(2);

    let mut builder = Builder::new()
        .ok_or_else(|| AudioError::EncodeFailed("Could not create LAME encoder".into()))?;
    builder
        .set_num_channels(out_channels as u8)
        .map_err(|e| mp3_error("Invalid channel count", e))?;
    builder
        .set_sample_rate(audio.sample_rate)
        .map_err(|e| mp3_error("Invalid sample rate", e))?;
    builder
        .set_brate(mp3_bitrate(audio.sample_rate))
        .map_err(|e| mp3_error("Invalid bitrate", e))?;
    let mut encoder = builder.build().map_err(|e| mp3_error("LAME init failed", e))?;

    let pcm: Vec<i16> = audio
        .samples
        .chunks(in_channels)
        .flat_map(|frame| frame.iter().take(out_channels).map(|&s| to_i16(s)))
        .collect();
    let frames = pcm.len() / out_channels;

    let mut bytes = Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(frames));
    if out_channels == 1 {
        encoder.encode_to_vec(MonoPcm(&pcm), &mut bytes)
    } else {
        encoder.encode_to_vec(InterleavedPcm(&pcm), &mut bytes)
    }
    .map_err(|e| mp3_error("MP3 encode failed", e))?;
    encoder
        .flush_to_vec::<FlushNoGap>(&mut bytes)
        .map_err(|e| mp3_error("MP3 flush failed", e))?;

    Ok(bytes)
}
