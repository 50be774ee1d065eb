// src/audio/mod.rs

pub mod decoder;
pub mod encoder;
pub mod playback;
pub mod trim;
pub mod types;
pub mod waveform;

// Re-export commonly used items
pub use decoder::{decode_audio_bytes, decode_audio_file, get_audio_info};
pub use encoder::{encode_mp3, encode_wav, encode_wav_bytes};
#[cfg(feature = "audio-output")]
pub use playback::AudioPlayer;
pub use playback::{SilentTransport, Transport};
pub use trim::{trim_audio, trim_audio_file};
pub use types::{AudioData, AudioInfo, TrimParams, WaveformPeaks};
pub use waveform::{compute_peaks, extract_waveform_peaks};
