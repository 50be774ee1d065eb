pub mod audio;
pub mod config;
pub mod editor;
pub mod engine;
pub mod error;
pub mod export;
pub mod region;
pub mod session;
pub mod source;
pub mod surface;
pub mod view;

#[cfg(feature = "desktop")]
mod app;

// Re-export for convenience
pub use audio::*;
pub use config::Config;
pub use editor::Editor;
pub use engine::MediaEngine;
pub use error::{AudioError, Result};
pub use export::{DirectorySink, DownloadSink, ExportArtifact};
pub use region::{Bounds, Region, RegionKind};
pub use session::{format_time, Phase, Session, TimeLabels, TrimJob};
pub use source::{ObjectUrl, ObjectUrlStore, SourceFile};
pub use surface::{SurfaceEvent, WaveformSurface};
pub use view::{EditorView, Intent, ViewModel};

#[cfg(feature = "desktop")]
pub use app::run;
