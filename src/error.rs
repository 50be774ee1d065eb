use thiserror::Error;

/// Every failure the editor, the surface and the media engine can report
#[derive(Debug, Error)]
pub enum AudioError {
    /// Failed to open or read the audio file from disk
    #[error("Failed to open audio file '{path}': {source}")]
    FileOpen {
        path: String,
        source: std::io::Error,
    },

    /// The file is not something we treat as audio
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Error occurred while decoding the audio data
    #[error("Audio decoding failed: {0}")]
    DecodeFailed(String),

    /// Error occurred while encoding to WAV
    #[error("WAV encoding failed: {0}")]
    EncodeFailed(String),

    /// Invalid trim parameters (e.g., start > end, negative values)
    #[error("Invalid trim parameters: {0}")]
    InvalidTrimParams(String),

    /// Trim range is outside the audio file's duration
    #[error("Trim range ({start}s to {end}s) exceeds audio duration ({duration}s)")]
    TrimRangeOutOfBounds {
        start: f64,
        end: f64,
        duration: f64,
    },

    /// The media engine's scratch space could not be set up
    #[error("Media engine unavailable: {0}")]
    EngineUnavailable(String),

    /// A transcode was requested before `initialize()` completed
    #[error("Media engine is not loaded")]
    EngineNotReady,

    /// The engine ran but could not produce the requested clip
    #[error("Transcode failed: {0}")]
    TranscodeFailed(String),

    /// The object URL was revoked or never issued
    #[error("Object URL '{0}' is not live")]
    UrlRevoked(String),

    /// An action needs a chosen file and there is none
    #[error("No audio file selected")]
    NoFileSelected,

    /// Transport or region call before the surface reported ready
    #[error("Waveform surface is not ready")]
    SurfaceNotReady,

    /// Region bounds that cannot be honoured
    #[error("Invalid region '{id}': {reason}")]
    InvalidRegion { id: String, reason: String },

    /// The output device could not be opened or driven
    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    /// Configuration file could not be parsed
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from hound WAV encoder
    #[error("Hound WAV error: {0}")]
    Hound(#[from] hound::Error),
}

/// Convenient Result type that uses our AudioError
pub type Result<T> = std::result::Result<T, AudioError>;
