// src/audio/decoder.rs

use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use symphonia::core::audio::{AudioBufferRef, SampleBuffer};
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::TimeBase;

use crate::audio::types::{AudioData, AudioInfo};
use crate::error::{AudioError, Result};

/// An opened container with its first audio track and a decoder for it
pub(crate) struct OpenedTrack {
    pub format: Box<dyn FormatReader>,
    pub decoder: Box<dyn Decoder>,
    pub track_id: u32,
    pub params: CodecParameters,
}

impl OpenedTrack {
    /// Open `source`, using `extension` as a format hint when present
    pub fn open(source: Box<dyn MediaSource>, extension: Option<&str>) -> Result<Self> {
        let mss = MediaSourceStream::new(source, Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = extension {
            hint.with_extension(extension);
        }

        let opened = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| AudioError::DecodeFailed(format!("Unrecognized format: {}", e)))?;

        let format = opened.format;

        // Skip video/subtitle tracks
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AudioError::DecodeFailed("No audio track found in file".to_string()))?;

        let track_id = track.id;
        let params = track.codec_params.clone();

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| AudioError::DecodeFailed(format!("Failed to create decoder: {}", e)))?;

        Ok(Self {
            format,
            decoder,
            track_id,
            params,
        })
    }

    pub fn open_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| AudioError::FileOpen {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::open(Box::new(file), extension_of(path))
    }

    pub fn sample_rate(&self) -> Result<u32> {
        self.params
            .sample_rate
            .ok_or_else(|| AudioError::DecodeFailed("Sample rate not found".to_string()))
    }

    /// Decode the next packet of our track, `None` at end of stream
    ///
    /// Returns the packet's timestamp, in the track's time base, with the
    /// decoded audio.
    /// Corrupt packets are skipped, as players do.
    pub fn next_buffer(&mut self) -> Result<Option<(u64, AudioBufferRef<'_>)>> {
        let ts = loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => return Ok(None),
                Err(e) => {
                    tracing::warn!("Stopping early at unreadable packet: {}", e);
                    return Ok(None);
                }
            };

            // Skip packets from other tracks (e.g., video, album art)
            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(_) => break packet.ts(),
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::warn!("Skipping undecodable packet: {}", e);
                    continue;
                }
                Err(e) => return Err(AudioError::DecodeFailed(format!("Decode error: {}", e))),
            }
        };

        // Re-borrow the decoder's internal buffer now the packet decoded cleanly
        Ok(Some((ts, self.decoder.last_decoded())))
    }
}

/// Convert a packet timestamp in `time_base` units to a frame index
///
/// Without a time base the timestamp is taken to count frames already.
pub(crate) fn timestamp_to_frame(ts: u64, time_base: Option<TimeBase>, sample_rate: u32) -> u64 {
    match time_base {
        Some(time_base) => {
            let time = time_base.calc_time(ts);
            ((time.seconds as f64 + time.frac) * sample_rate as f64).round() as u64
        }
        None => ts,
    }
}

/// File extension as a format hint
pub(crate) fn extension_of(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

/// Append a decoded buffer to `output` as interleaved f32, returning its channel count
pub(crate) fn append_interleaved(buffer: AudioBufferRef<'_>, output: &mut Vec<f32>) -> u16 {
    let spec = *buffer.spec();
    let mut sample_buf = SampleBuffer::<f32>::new(buffer.capacity() as u64, spec);
    sample_buf.copy_interleaved_ref(buffer);
    output.extend_from_slice(sample_buf.samples());
    spec.channels.count() as u16
}

/// Decodes an audio file to PCM samples in memory
///
/// Supports: MP3, FLAC, WAV, OGG Vorbis, AAC, and more via symphonia
///
/// # Example
/// ```no_run
/// use wavetrim_lib::audio::decode_audio_file;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let audio = decode_audio_file("interview.mp3")?;
/// println!("Loaded {} seconds of audio", audio.duration_seconds());
/// # Ok(())
/// # }
/// ```
pub fn decode_audio_file<P: AsRef<Path>>(path: P) -> Result<AudioData> {
    decode_track(OpenedTrack::open_path(path.as_ref())?)
}

/// Decodes an in-memory file (the bytes behind an object URL)
///
/// `extension` is only a hint; the container is sniffed either way.
pub fn decode_audio_bytes(bytes: Arc<[u8]>, extension: Option<&str>) -> Result<AudioData> {
    decode_track(OpenedTrack::open(Box::new(Cursor::new(bytes)), extension)?)
}

fn decode_track(mut track: OpenedTrack) -> Result<AudioData> {
    let sample_rate = track.sample_rate()?;

    // Some MP3s only reveal their layout once a packet is decoded
    let mut channels = track.params.channels.map(|c| c.count() as u16);
    let mut samples = Vec::new();

    while let Some((_, decoded)) = track.next_buffer()? {
        let decoded_channels = append_interleaved(decoded, &mut samples);
        channels.get_or_insert(decoded_channels);
    }

    let channels = channels
        .ok_or_else(|| AudioError::DecodeFailed("Could not determine channel count".to_string()))?;

    if samples.is_empty() {
        return Err(AudioError::DecodeFailed("No audio samples decoded".to_string()));
    }

    tracing::debug!(
        sample_rate,
        channels,
        samples = samples.len(),
        "Decoded audio"
    );

    Ok(AudioData {
        samples,
        sample_rate,
        channels,
    })
}

/// Get audio file metadata without decoding all samples
///
/// # Example
/// ```no_run
/// use wavetrim_lib::audio::get_audio_info;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let info = get_audio_info("interview.mp3")?;
/// println!("Duration: {:.2} minutes", info.duration_seconds / 60.0);
/// # Ok(())
/// # }
/// ```
pub fn get_audio_info<P: AsRef<Path>>(path: P) -> Result<AudioInfo> {
    let track = OpenedTrack::open_path(path.as_ref())?;
    let params = &track.params;

    let duration_seconds = match (params.n_frames, params.sample_rate) {
        (Some(n_frames), Some(sr)) if sr > 0 => n_frames as f64 / sr as f64,
        _ => 0.0,
    };

    let format = symphonia::default::get_codecs()
        .get_codec(params.codec)
        .map(|d| d.short_name.to_uppercase())
        .unwrap_or_else(|| format!("{:?}", params.codec));

    Ok(AudioInfo {
        duration_seconds,
        sample_rate: params.sample_rate.unwrap_or(0),
        channels: params.channels.map(|c| c.count() as u16).unwrap_or(0),
        format,
        bit_depth: params.bits_per_sample.map(|b| b as u16),
    })
}
