//! Editor configuration
//!
//! Every field has a default, so an empty (or missing) `wavetrim.toml`
//! yields a working editor.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AudioError, Result};

/// Span of the region created when a waveform becomes ready
pub const DEFAULT_REGION_SECONDS: f64 = 15.0;

/// Number of min/max pairs computed for the waveform display
pub const DEFAULT_NUM_PEAKS: usize = 2000;

/// Name given to every exported clip
pub const DEFAULT_OUTPUT_FILE_NAME: &str = "output.mp3";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Length of the default region in seconds. Not clamped to the file duration.
    pub default_region_seconds: f64,

    pub num_peaks: usize,

    /// File name of the exported clip
    pub output_file_name: String,

    /// Where exported clips are written (current directory when unset)
    pub download_dir: Option<PathBuf>,

    /// Engine scratch directory (a fresh temporary directory when unset)
    pub scratch_dir: Option<PathBuf>,

    /// Interval of the audio-process tick in the desktop shell
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_region_seconds: DEFAULT_REGION_SECONDS,
            num_peaks: DEFAULT_NUM_PEAKS,
            output_file_name: DEFAULT_OUTPUT_FILE_NAME.to_string(),
            download_dir: None,
            scratch_dir: None,
            poll_interval_ms: 50,
        }
    }
}

impl Config {
    /// Parse a TOML configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| AudioError::FileOpen {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| AudioError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, falling back to defaults when it is absent or broken
    pub fn load_or_default(path: Option<&Path>) -> Self {
        match path {
            Some(path) => match Self::load(path) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Loaded configuration");
                    config
                }
                Err(e) => {
                    tracing::warn!("Using default configuration: {}", e);
                    Self::default()
                }
            },
            None => Self::default(),
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.default_region_seconds > 0.0) {
            return Err(AudioError::Config(format!(
                "default_region_seconds must be positive, got {}",
                self.default_region_seconds
            )));
        }
        if self.num_peaks == 0 {
            return Err(AudioError::Config("num_peaks must be greater than 0".to_string()));
        }
        if self.output_file_name.is_empty()
            || self.output_file_name.contains(['/', '\\'])
        {
            return Err(AudioError::Config(format!(
                "output_file_name must be a bare file name, got '{}'",
                self.output_file_name
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn download_dir(&self) -> PathBuf {
        self.download_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.output_file_name, "output.mp3");
        assert_eq!(config.default_region_seconds, 15.0);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_toml(
            "num_peaks = 500\noutput_file_name = \"clip.wav\"\npoll_interval_ms = 20\n",
        )
        .unwrap();
        assert_eq!(config.num_peaks, 500);
        assert_eq!(config.output_file_name, "clip.wav");
        assert_eq!(config.poll_interval(), Duration::from_millis(20));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Config::from_toml("num_peaks = 0").is_err());
        assert!(Config::from_toml("default_region_seconds = -1.0").is_err());
        assert!(Config::from_toml("output_file_name = \"../x.mp3\"").is_err());
        assert!(Config::from_toml("unknown_key = 1").is_err());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = Config::load_or_default(Some(Path::new("/nonexistent/wavetrim.toml")));
        assert_eq!(config, Config::default());
    }
}
