//! The editor: session, waveform surface, engine and downloads wired together
//!
//! Front ends (the desktop shell, the CLI) only ever talk to an
//! [`Editor`]. They feed it [`Intent`]s, call [`Editor::pump`] on a timer
//! to deliver surface events, and render [`Editor::view`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::audio::playback::Transport;
use crate::config::Config;
use crate::engine::MediaEngine;
use crate::error::{AudioError, Result};
use crate::export::{DirectorySink, DownloadSink, ExportArtifact};
use crate::region::Region;
use crate::session::{Session, TrimJob};
use crate::source::ObjectUrlStore;
use crate::surface::WaveformSurface;
use crate::view::{EditorView, Intent, ViewModel, EDITOR_TITLE};

pub struct Editor<T: Transport> {
    config: Config,
    session: Session,
    surface: WaveformSurface<T>,
    store: ObjectUrlStore,
    engine: Arc<MediaEngine>,
    sink: Box<dyn DownloadSink>,
}

impl<T: Transport> Editor<T> {
    /// Build an editor that saves exports into the configured download directory
    ///
    /// The engine starts unloaded; call [`MediaEngine::initialize`] (or the
    /// async variant) on [`Editor::engine`] before trimming.
    pub fn new(config: Config, transport: T) -> Self {
        let sink = Box::new(DirectorySink::new(config.download_dir()));
        Self::with_sink(config, transport, sink)
    }

    pub fn with_sink(config: Config, transport: T, sink: Box<dyn DownloadSink>) -> Self {
        let store = ObjectUrlStore::new();
        Self {
            session: Session::new(&config),
            surface: WaveformSurface::new(transport, store.clone(), config.num_peaks),
            engine: Arc::new(MediaEngine::new(&config)),
            store,
            sink,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn surface(&self) -> &WaveformSurface<T> {
        &self.surface
    }

    pub fn store(&self) -> &ObjectUrlStore {
        &self.store
    }

    pub fn engine(&self) -> &Arc<MediaEngine> {
        &self.engine
    }

    /// Read a file from disk and load it
    pub fn choose_file_path(&mut self, path: &Path) -> Result<()> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| AudioError::UnsupportedFormat(path.display().to_string()))?;
        let bytes = std::fs::read(path).map_err(|e| AudioError::FileOpen {
            path: path.display().to_string(),
            source: e,
        })?;
        self.choose_file(&name, bytes.into())
    }

    /// Load `bytes` as the chosen file and start rendering it
    pub fn choose_file(&mut self, name: &str, bytes: Arc<[u8]>) -> Result<()> {
        self.session.choose_file(name, bytes, &self.store)?;
        self.session.mount_surface(&mut self.surface)
    }

    /// Deliver pending surface events to the session; returns how many there were
    pub fn pump(&mut self) -> usize {
        let events = self.surface.poll();
        let count = events.len();
        for event in events {
            self.session.handle_event(event, &mut self.surface);
        }
        count
    }

    /// Block until the waveform is rendered (or `timeout` passes), then pump
    pub fn wait_until_ready(&mut self, timeout: Duration) -> bool {
        self.surface.wait_for_mount(timeout);
        self.pump();
        self.surface.is_ready()
    }

    pub fn toggle_playback(&mut self) {
        self.session.toggle_playback(&mut self.surface);
    }

    pub fn draw_region(&mut self, start: f64, end: f64) -> Result<Region> {
        self.surface.add_region(start, end)
    }

    pub fn finish_region_drag(&mut self, id: &str, start: f64, end: f64) -> Result<Region> {
        self.surface.finish_region_drag(id, start, end)
    }

    /// First half of a trim: capture what to export
    ///
    /// Lets a caller run the job without holding the editor.
    pub fn begin_trim(&mut self) -> Result<TrimJob> {
        self.session.prepare_trim(&self.engine, &self.store)
    }

    /// Second half of a trim: save the result (or log the failure)
    pub fn complete_trim(&mut self, result: Result<ExportArtifact>) -> Option<PathBuf> {
        self.session
            .complete_trim(result, &self.store, self.sink.as_ref())
    }

    /// Export the active region
    pub async fn trim(&mut self) -> Option<PathBuf> {
        self.session
            .trim(&self.engine, &self.store, self.sink.as_ref())
            .await
    }

    pub async fn dispatch(&mut self, intent: Intent) -> Result<()> {
        tracing::debug!(?intent, "Dispatching");
        match intent {
            Intent::ChooseFile { path } => self.choose_file_path(&path)?,
            Intent::PlayPause => self.toggle_playback(),
            Intent::DrawRegion { start, end } => {
                self.draw_region(start, end)?;
            }
            Intent::FinishRegionDrag { id, start, end } => {
                self.finish_region_drag(&id, start, end)?;
            }
            Intent::Trim => {
                self.trim().await;
            }
        }
        Ok(())
    }

    pub fn view(&self, include_peaks: bool) -> ViewModel {
        let Some(source) = self.session.source() else {
            return ViewModel::upload_prompt();
        };
        ViewModel::Editor(EditorView {
            title: EDITOR_TITLE.to_string(),
            file_name: source.name.clone(),
            phase: self.session.phase(),
            ready: self.surface.is_ready(),
            is_playing: self.session.is_playing(),
            labels: self.session.labels().clone(),
            current_time: self.surface.current_time(),
            duration: self.surface.duration(),
            regions: self.session.regions().to_vec(),
            active_region: self.session.active_region().clone(),
            peaks: if include_peaks {
                self.surface.peaks().cloned()
            } else {
                None
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::encoder::encode_wav_bytes;
    use crate::audio::playback::ManualTransport;
    use crate::audio::types::AudioData;
    use crate::session::Phase;

    const WAIT: Duration = Duration::from_secs(10);

    fn write_wav(dir: &Path, name: &str, seconds: usize) -> PathBuf {
        let bytes = encode_wav_bytes(&AudioData {
            samples: vec![0.25; seconds * 2 * 800],
            sample_rate: 800,
            channels: 2,
        })
        .unwrap();
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn editor(dir: &Path) -> Editor<ManualTransport> {
        let config = Config {
            download_dir: Some(dir.join("downloads")),
            num_peaks: 64,
            output_file_name: "output.wav".to_string(),
            ..Config::default()
        };
        Editor::new(config, ManualTransport::default())
    }

    #[test]
    fn test_view_before_and_after_choosing() {
        let dir = tempfile::tempdir().unwrap();
        let mut editor = editor(dir.path());
        assert!(matches!(editor.view(false), ViewModel::UploadPrompt { .. }));

        let path = write_wav(dir.path(), "take.wav", 20);
        editor.choose_file_path(&path).unwrap();
        match editor.view(false) {
            ViewModel::Editor(view) => {
                assert_eq!(view.title, "Trim Audio");
                assert_eq!(view.file_name, "take.wav");
                assert!(!view.ready);
            }
            other => panic!("unexpected view {:?}", other),
        }

        assert!(editor.wait_until_ready(WAIT));
        let view = editor.view(true);
        assert!(view.controls_enabled());
        assert_eq!(view.play_button_label(), Some("Pause"));
        match view {
            ViewModel::Editor(view) => {
                assert_eq!(view.duration, 20.0);
                assert_eq!(view.peaks.unwrap().num_peaks, 64);
                assert_eq!(view.active_region, Region::system_default(15.0));
            }
            other => panic!("unexpected view {:?}", other),
        }
    }

    #[test]
    fn test_choose_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut editor = editor(dir.path());
        let result = editor.choose_file_path(&dir.path().join("missing.wav"));
        assert!(matches!(result, Err(AudioError::FileOpen { .. })));
        assert_eq!(editor.session().phase(), Phase::NoFile);
    }

    #[tokio::test]
    async fn test_dispatch_full_flow() {
        let dir = tempfile::tempdir().unwrap();
        let mut editor = editor(dir.path());
        editor.engine().initialize_async().await.unwrap();

        let path = write_wav(dir.path(), "take.wav", 10);
        editor.dispatch(Intent::ChooseFile { path }).await.unwrap();
        assert!(editor.wait_until_ready(WAIT));

        editor.dispatch(Intent::PlayPause).await.unwrap();
        assert!(!editor.session().is_playing());

        editor
            .dispatch(Intent::FinishRegionDrag {
                id: "region-1".to_string(),
                start: 1.0,
                end: 3.5,
            })
            .await
            .unwrap();
        editor.pump();
        assert!(editor.session().is_playing());
        assert_eq!(editor.session().labels().end, "0:03");

        editor.dispatch(Intent::Trim).await.unwrap();
        let output = dir.path().join("downloads").join("output.wav");
        let reader = hound::WavReader::open(&output).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.duration(), 2000);
    }

    #[tokio::test]
    async fn test_split_trim_matches_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let mut editor = editor(dir.path());
        editor.engine().initialize().unwrap();
        let path = write_wav(dir.path(), "take.wav", 20);
        editor.choose_file_path(&path).unwrap();
        assert!(editor.wait_until_ready(WAIT));

        let job = editor.begin_trim().unwrap();
        assert_eq!(editor.session().phase(), Phase::Exporting);
        let engine = Arc::clone(editor.engine());
        let result = job.run(&engine).await;
        let saved = editor.complete_trim(result).unwrap();

        assert_eq!(saved.file_name().unwrap(), "output.wav");
        assert_eq!(hound::WavReader::open(&saved).unwrap().duration(), 15 * 800);
        assert_eq!(editor.session().phase(), Phase::SurfaceReady);
    }

    #[tokio::test]
    async fn test_invalid_drag_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut editor = editor(dir.path());
        let path = write_wav(dir.path(), "take.wav", 5);
        editor.choose_file_path(&path).unwrap();
        assert!(editor.wait_until_ready(WAIT));

        let result = editor
            .dispatch(Intent::DrawRegion { start: 3.0, end: 1.0 })
            .await;
        assert!(matches!(result, Err(AudioError::InvalidRegion { .. })));
    }
}
