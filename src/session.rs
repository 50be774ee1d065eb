//! Session state for one loaded file, and the loop/trim logic
//!
//! The session is the only owner of the chosen file, the region set and
//! the playback flag. Surface events are fed to [`Session::handle_event`]
//! together with the surface, so handlers always see current state.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::audio::playback::Transport;
use crate::config::Config;
use crate::engine::MediaEngine;
use crate::error::{AudioError, Result};
use crate::export::{deliver_artifact, DownloadSink, ExportArtifact};
use crate::region::{Region, RegionKind};
use crate::source::{is_audio_file, ObjectUrlStore, SourceFile};
use crate::surface::{Subscription, SurfaceEvent, WaveformSurface};

/// Whole seconds as `m:ss`
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NoFile,
    FileChosen,
    SurfaceMounting,
    SurfaceReady,
    Exporting,
}

/// Formatted start/end/duration of the active region
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeLabels {
    pub start: String,
    pub end: String,
    pub duration: String,
}

impl TimeLabels {
    fn of(region: &Region) -> Self {
        Self {
            start: format_time(region.start()),
            end: format_time(region.end()),
            duration: format_time(region.bounds.length()),
        }
    }
}

impl Default for TimeLabels {
    fn default() -> Self {
        Self {
            start: format_time(0.0),
            end: format_time(0.0),
            duration: format_time(0.0),
        }
    }
}

/// Everything a trim needs, captured so the session can be released while it runs
#[derive(Debug, Clone)]
pub struct TrimJob {
    pub bytes: Arc<[u8]>,
    pub extension: Option<String>,
    pub start: f64,
    pub end: f64,
    pub output_file_name: String,
}

impl TrimJob {
    pub async fn run(self, engine: &Arc<MediaEngine>) -> Result<ExportArtifact> {
        tracing::info!(start = self.start, end = self.end, "Trimming selection");
        let bytes = engine
            .transcode_range_async(self.bytes, self.extension, self.start, self.end)
            .await?;
        Ok(ExportArtifact {
            file_name: self.output_file_name,
            bytes,
        })
    }
}

pub struct Session {
    default_region_seconds: f64,
    source: Option<SourceFile>,
    regions: Vec<Region>,
    active: Region,
    is_playing: bool,
    labels: TimeLabels,
    phase: Phase,
    audio_process: Option<Subscription>,
}

impl Session {
    pub fn new(config: &Config) -> Self {
        let default = Region::system_default(config.default_region_seconds);
        Self {
            default_region_seconds: config.default_region_seconds,
            source: None,
            regions: vec![default.clone()],
            active: default,
            is_playing: false,
            labels: TimeLabels::default(),
            phase: Phase::NoFile,
            audio_process: None,
        }
    }

    pub fn source(&self) -> Option<&SourceFile> {
        self.source.as_ref()
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// The region that drives looping and trimming
    pub fn active_region(&self) -> &Region {
        &self.active
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn labels(&self) -> &TimeLabels {
        &self.labels
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Take a newly chosen file
    ///
    /// Revokes the previous file's URL and resets the regions to the
    /// default before anything is mounted.
    pub fn choose_file(&mut self, name: &str, bytes: Arc<[u8]>, store: &ObjectUrlStore) -> Result<()> {
        if !is_audio_file(name) {
            return Err(AudioError::UnsupportedFormat(name.to_string()));
        }

        if let Some(previous) = self.source.take() {
            store.revoke(&previous.url);
        }

        let default = Region::system_default(self.default_region_seconds);
        self.regions = vec![default.clone()];
        self.active = default;
        self.labels = TimeLabels::default();
        self.is_playing = false;
        self.audio_process = None;

        let size = bytes.len();
        let url = store.create(bytes);
        tracing::info!(file = name, size, url = %url, "File chosen");
        self.source = Some(SourceFile {
            name: name.to_string(),
            url,
            size,
        });
        self.phase = Phase::FileChosen;
        Ok(())
    }

    /// Hand the chosen file to the surface with the default region
    pub fn mount_surface<T: Transport>(&mut self, surface: &mut WaveformSurface<T>) -> Result<()> {
        let source = self.source.as_ref().ok_or(AudioError::NoFileSelected)?;
        let initial = Region::system_default(self.default_region_seconds);
        surface.mount(&source.url, source.extension(), initial)?;
        self.phase = Phase::SurfaceMounting;
        Ok(())
    }

    pub fn handle_event<T: Transport>(&mut self, event: SurfaceEvent, surface: &mut WaveformSurface<T>) {
        match event {
            SurfaceEvent::Ready { duration } => self.on_ready(duration, surface),
            SurfaceEvent::RegionCreated(region) => self.on_region_created(region),
            SurfaceEvent::RegionUpdateEnd(region) => self.on_region_update_end(region, surface),
            SurfaceEvent::AudioProcess { time } => self.on_audio_process(time, surface),
            SurfaceEvent::LoadFailed(message) => {
                tracing::error!("Waveform failed to load: {}", message);
                self.phase = Phase::FileChosen;
            }
        }
    }

    fn on_ready<T: Transport>(&mut self, duration: f64, surface: &mut WaveformSurface<T>) {
        tracing::debug!(duration, "Surface ready");
        self.phase = Phase::SurfaceReady;
        // Autoplay once rendered
        surface.play();
        self.is_playing = true;
        self.audio_process = Some(surface.subscribe_audio_process());
    }

    fn on_region_created(&mut self, region: Region) {
        match region.kind {
            RegionKind::System => {
                match self.regions.iter_mut().find(|r| r.kind == RegionKind::System) {
                    Some(existing) => *existing = region,
                    None => self.regions.insert(0, region),
                }
            }
            RegionKind::UserDrawn => self.regions.push(region),
        }
    }

    fn on_region_update_end<T: Transport>(&mut self, region: Region, surface: &mut WaveformSurface<T>) {
        if let Some(tracked) = self.regions.iter_mut().find(|r| r.id == region.id) {
            *tracked = region.clone();
        }
        self.labels = TimeLabels::of(&region);
        tracing::debug!(
            start = %self.labels.start,
            end = %self.labels.end,
            duration = %self.labels.duration,
            "Region updated"
        );

        seek_seconds(surface, region.start());
        surface.play();
        self.is_playing = surface.is_playing();
        self.active = region;
        if self.phase != Phase::Exporting {
            self.phase = Phase::SurfaceReady;
        }
    }

    /// Stop at the end of the active region and rewind to its start
    ///
    /// A region reaching past the audio ends where the audio does.
    fn on_audio_process<T: Transport>(&mut self, time: f64, surface: &mut WaveformSurface<T>) {
        let duration = surface.duration();
        let end = if duration > 0.0 {
            self.active.end().min(duration)
        } else {
            self.active.end()
        };
        if time >= end {
            seek_seconds(surface, self.active.start());
            surface.pause();
            self.is_playing = false;
        }
    }

    /// Play/pause button
    pub fn toggle_playback<T: Transport>(&mut self, surface: &mut WaveformSurface<T>) {
        surface.toggle_play_pause();
        self.is_playing = surface.is_playing();
    }

    /// Check preconditions and capture the bytes and range to export
    ///
    /// Nothing is read and no state changes unless the engine is ready.
    pub fn prepare_trim(&mut self, engine: &MediaEngine, store: &ObjectUrlStore) -> Result<TrimJob> {
        if !engine.is_ready() {
            return Err(AudioError::EngineNotReady);
        }
        let source = self.source.as_ref().ok_or(AudioError::NoFileSelected)?;
        let bytes = store.fetch(&source.url)?;

        let job = TrimJob {
            bytes,
            extension: source.extension().map(str::to_owned),
            start: self.active.start(),
            end: self.active.end(),
            output_file_name: engine.output_file_name().to_string(),
        };
        self.phase = Phase::Exporting;
        Ok(job)
    }

    pub fn finish_export(&mut self) {
        if self.phase == Phase::Exporting {
            self.phase = Phase::SurfaceReady;
        }
    }

    /// Save a finished export through `sink` and leave the exporting phase
    ///
    /// Failures end the action and are only logged.
    pub fn complete_trim(
        &mut self,
        result: Result<ExportArtifact>,
        store: &ObjectUrlStore,
        sink: &dyn DownloadSink,
    ) -> Option<PathBuf> {
        let saved = result.and_then(|artifact| deliver_artifact(artifact, store, sink));
        self.finish_export();
        match saved {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::error!("Error during trimming: {}", e);
                None
            }
        }
    }

    /// Export the active region and save it through `sink`
    pub async fn trim(
        &mut self,
        engine: &Arc<MediaEngine>,
        store: &ObjectUrlStore,
        sink: &dyn DownloadSink,
    ) -> Option<PathBuf> {
        let job = match self.prepare_trim(engine, store) {
            Ok(job) => job,
            Err(e) => {
                tracing::error!("Error during trimming: {}", e);
                return None;
            }
        };
        let result = job.run(engine).await;
        self.complete_trim(result, store, sink)
    }
}

fn seek_seconds<T: Transport>(surface: &mut WaveformSurface<T>, seconds: f64) {
    let duration = surface.duration();
    if duration > 0.0 {
        surface.seek_to(seconds / duration);
    }
}
