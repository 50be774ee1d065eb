//! Media engine: cuts a time range out of an encoded file
//!
//! The engine works like a sandboxed transcoder. It owns a scratch
//! directory (its "filesystem"), the caller hands it whole file bytes,
//! and it hands back the bytes of the clip. Input and output only live
//! in the scratch directory for the duration of one call.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tempfile::TempDir;

use crate::audio::decoder::decode_audio_file;
use crate::audio::encoder::encode_mp3;
use crate::audio::trim::{trim_audio, trim_audio_file};
use crate::audio::types::TrimParams;
use crate::config::Config;
use crate::error::{AudioError, Result};

const LOG_TARGET: &str = "wavetrim::engine";

enum Scratch {
    Temp(TempDir),
    Dir(PathBuf),
}

impl Scratch {
    fn path(&self) -> &Path {
        match self {
            Scratch::Temp(dir) => dir.path(),
            Scratch::Dir(path) => path,
        }
    }
}

fn is_mp3(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("mp3"))
        .unwrap_or(false)
}

/// Write the clip in the format the output name asks for
///
/// `.mp3` is encoded with LAME; any other name gets a WAV.
fn write_clip(input: &Path, output: &Path, params: &TrimParams) -> Result<()> {
    if !is_mp3(output) {
        return trim_audio_file(input, output, params);
    }
    let audio = decode_audio_file(input)?;
    let clip = trim_audio(&audio, params)?;
    std::fs::write(output, encode_mp3(&clip)?)?;
    Ok(())
}

pub struct MediaEngine {
    scratch_dir: Option<PathBuf>,
    output_file_name: String,
    scratch: OnceLock<Scratch>,
}

impl MediaEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            scratch_dir: config.scratch_dir.clone(),
            output_file_name: config.output_file_name.clone(),
            scratch: OnceLock::new(),
        }
    }

    /// Set up the scratch directory. Calling it again is a no-op.
    pub fn initialize(&self) -> Result<()> {
        if self.is_ready() {
            return Ok(());
        }

        let scratch = match &self.scratch_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|e| {
                    AudioError::EngineUnavailable(format!("{}: {}", dir.display(), e))
                })?;
                Scratch::Dir(dir.clone())
            }
            None => Scratch::Temp(
                tempfile::Builder::new()
                    .prefix("wavetrim-engine-")
                    .tempdir()
                    .map_err(|e| AudioError::EngineUnavailable(e.to_string()))?,
            ),
        };

        // Prove we can write before claiming to be ready
        let check = scratch.path().join(".write-check");
        std::fs::write(&check, b"ok")
            .and_then(|_| std::fs::remove_file(&check))
            .map_err(|e| {
                AudioError::EngineUnavailable(format!(
                    "scratch directory {} is not writable: {}",
                    scratch.path().display(),
                    e
                ))
            })?;

        if self.scratch.set(scratch).is_ok() {
            tracing::info!(target: LOG_TARGET, "Media engine is ready");
        }
        Ok(())
    }

    /// Run [`initialize`](Self::initialize) on the blocking pool
    pub async fn initialize_async(self: &Arc<Self>) -> Result<()> {
        let engine = Arc::clone(self);
        tokio::task::spawn_blocking(move || engine.initialize())
            .await
            .map_err(|e| AudioError::EngineUnavailable(format!("Task join error: {}", e)))?
    }

    pub fn is_ready(&self) -> bool {
        self.scratch.get().is_some()
    }

    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch.get().map(Scratch::path)
    }

    pub fn output_file_name(&self) -> &str {
        &self.output_file_name
    }

    fn input_file_name(&self, extension: Option<&str>) -> String {
        let name = match extension {
            Some(ext) => format!("audio.{}", ext),
            None => "audio".to_string(),
        };
        if name == self.output_file_name {
            format!("source-{}", name)
        } else {
            name
        }
    }

    /// Cut `[start_seconds, end_seconds)` out of `bytes`
    ///
    /// `extension` is the source file's extension, used as a format hint.
    /// Both scratch files are removed once the clip has been read back.
    pub fn transcode_range(
        &self,
        bytes: &[u8],
        extension: Option<&str>,
        start_seconds: f64,
        end_seconds: f64,
    ) -> Result<Vec<u8>> {
        let scratch = self
            .scratch
            .get()
            .ok_or_else(|| AudioError::TranscodeFailed("media engine is not loaded".to_string()))?;

        let params = TrimParams::new(start_seconds, end_seconds)
            .map_err(|e| AudioError::TranscodeFailed(e.to_string()))?;

        let input = scratch.path().join(self.input_file_name(extension));
        let output = scratch.path().join(&self.output_file_name);

        tracing::debug!(target: LOG_TARGET, "write {} ({} bytes)", input.display(), bytes.len());
        std::fs::write(&input, bytes).map_err(|e| AudioError::TranscodeFailed(e.to_string()))?;

        tracing::debug!(
            target: LOG_TARGET,
            "-i {} -ss {} -to {} {}",
            input.display(),
            start_seconds,
            end_seconds,
            output.display()
        );
        write_clip(&input, &output, &params).map_err(|e| {
            tracing::debug!(target: LOG_TARGET, "trim failed: {}", e);
            AudioError::TranscodeFailed(e.to_string())
        })?;

        let clip = std::fs::read(&output).map_err(|e| AudioError::TranscodeFailed(e.to_string()))?;
        tracing::debug!(target: LOG_TARGET, "read {} ({} bytes)", output.display(), clip.len());

        for path in [&input, &output] {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::warn!(target: LOG_TARGET, "Could not remove {}: {}", path.display(), e);
            }
        }

        Ok(clip)
    }

    /// Run [`transcode_range`](Self::transcode_range) on the blocking pool
    pub async fn transcode_range_async(
        self: &Arc<Self>,
        bytes: Arc<[u8]>,
        extension: Option<String>,
        start_seconds: f64,
        end_seconds: f64,
    ) -> Result<Vec<u8>> {
        let engine = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            engine.transcode_range(&bytes, extension.as_deref(), start_seconds, end_seconds)
        })
        .await
        .map_err(|e| AudioError::TranscodeFailed(format!("Task join error: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decoder::decode_audio_bytes;
    use crate::audio::encoder::encode_wav_bytes;
    use crate::audio::types::AudioData;
    use hound::WavReader;
    use std::io::Cursor;

    fn ten_seconds() -> Vec<u8> {
        let samples = (0..10 * 1000).map(|i| i as f32 / 10_000.0).collect();
        encode_wav_bytes(&AudioData {
            samples,
            sample_rate: 1000,
            channels: 1,
        })
        .unwrap()
    }

    /// Engine writing WAV clips, so cuts can be checked frame by frame
    fn ready_engine() -> MediaEngine {
        let config = Config {
            output_file_name: "output.wav".to_string(),
            ..Config::default()
        };
        let engine = MediaEngine::new(&config);
        engine.initialize().unwrap();
        engine
    }

    #[test]
    fn test_transcode_before_initialize_fails() {
        let engine = MediaEngine::new(&Config::default());
        assert!(!engine.is_ready());
        let result = engine.transcode_range(&ten_seconds(), Some("wav"), 2.0, 5.0);
        assert!(matches!(result, Err(AudioError::TranscodeFailed(_))));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let engine = ready_engine();
        let dir = engine.scratch_dir().unwrap().to_path_buf();
        engine.initialize().unwrap();
        assert_eq!(engine.scratch_dir().unwrap(), dir);
    }

    #[test]
    fn test_unwritable_scratch_dir_is_unavailable() {
        let blocker = tempfile::NamedTempFile::new().unwrap();
        let config = Config {
            // A regular file cannot become a directory
            scratch_dir: Some(blocker.path().join("nested")),
            ..Config::default()
        };
        let engine = MediaEngine::new(&config);
        assert!(matches!(engine.initialize(), Err(AudioError::EngineUnavailable(_))));
        assert!(!engine.is_ready());
    }

    #[test]
    fn test_transcode_range_cuts_exact_frames_and_cleans_up() {
        let engine = ready_engine();
        let clip = engine.transcode_range(&ten_seconds(), Some("wav"), 2.0, 5.0).unwrap();

        let mut reader = WavReader::new(Cursor::new(clip)).unwrap();
        assert_eq!(reader.duration(), 3000);
        let first: f32 = reader.samples::<f32>().next().unwrap().unwrap();
        assert_eq!(first, 2000.0 / 10_000.0);

        let leftovers = std::fs::read_dir(engine.scratch_dir().unwrap()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_transcode_without_extension_sniffs_container() {
        let engine = ready_engine();
        let clip = engine.transcode_range(&ten_seconds(), None, 0.0, 1.0).unwrap();
        let reader = WavReader::new(Cursor::new(clip)).unwrap();
        assert_eq!(reader.duration(), 1000);
    }

    #[test]
    fn test_range_past_end_stops_at_end() {
        let engine = ready_engine();
        let clip = engine.transcode_range(&ten_seconds(), Some("wav"), 0.0, 15.0).unwrap();
        let reader = WavReader::new(Cursor::new(clip)).unwrap();
        assert_eq!(reader.duration(), 10_000);
    }

    #[test]
    fn test_range_starting_past_end_fails() {
        let engine = ready_engine();
        let result = engine.transcode_range(&ten_seconds(), Some("wav"), 12.0, 15.0);
        assert!(matches!(result, Err(AudioError::TranscodeFailed(_))));
    }

    #[test]
    fn test_default_output_is_mp3() {
        let engine = MediaEngine::new(&Config::default());
        engine.initialize().unwrap();
        assert_eq!(engine.output_file_name(), "output.mp3");

        let samples = (0..3 * 44100).map(|i| (i as f32 / 20.0).sin() * 0.5).collect();
        let wav = encode_wav_bytes(&AudioData {
            samples,
            sample_rate: 44100,
            channels: 1,
        })
        .unwrap();
        let clip = engine.transcode_range(&wav, Some("wav"), 1.0, 2.0).unwrap();
        assert_ne!(&clip[0..4], b"RIFF");

        let decoded = decode_audio_bytes(clip.into(), Some("mp3")).unwrap();
        assert_eq!(decoded.sample_rate, 44100);
        assert!((decoded.duration_seconds() - 1.0).abs() < 0.25);

        let leftovers = std::fs::read_dir(engine.scratch_dir().unwrap()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_corrupt_input_fails() {
        let engine = ready_engine();
        let result = engine.transcode_range(&[1, 2, 3, 4], Some("mp3"), 0.0, 1.0);
        assert!(matches!(result, Err(AudioError::TranscodeFailed(_))));
    }

    #[test]
    fn test_input_never_collides_with_output() {
        let config = Config {
            output_file_name: "audio.wav".to_string(),
            ..Config::default()
        };
        let engine = MediaEngine::new(&config);
        assert_eq!(engine.input_file_name(Some("wav")), "source-audio.wav");
        assert_eq!(engine.input_file_name(Some("mp3")), "audio.mp3");
    }

    #[tokio::test]
    async fn test_async_wrappers() {
        let config = Config {
            output_file_name: "output.wav".to_string(),
            ..Config::default()
        };
        let engine = Arc::new(MediaEngine::new(&config));
        engine.initialize_async().await.unwrap();
        let bytes: Arc<[u8]> = ten_seconds().into();
        let clip = engine
            .transcode_range_async(bytes, Some("wav".to_string()), 2.0, 5.0)
            .await
            .unwrap();
        assert!(!clip.is_empty());
    }
}
