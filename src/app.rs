//! Tauri desktop shell
//!
//! The webview renders [`ViewModel`]s and calls the commands below. A
//! background loop pumps surface events every `poll_interval_ms` and
//! pushes a fresh view as `editor-changed`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tauri::{AppHandle, Emitter, Manager, State};
use tauri_plugin_dialog::DialogExt;
use tokio::sync::{oneshot, Mutex};

use crate::audio::{self, AudioInfo, AudioPlayer};
use crate::config::Config;
use crate::editor::Editor;
use crate::region::Region;
use crate::source::AUDIO_EXTENSIONS;
use crate::view::ViewModel;

const EDITOR_CHANGED: &str = "editor-changed";
const CONFIG_ENV: &str = "WAVETRIM_CONFIG";
const CONFIG_FILE: &str = "wavetrim.toml";

struct AppState {
    editor: Mutex<Editor<AudioPlayer>>,
}

fn config_path() -> Option<PathBuf> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => Some(PathBuf::from(path)),
        None => {
            let local = PathBuf::from(CONFIG_FILE);
            local.exists().then_some(local)
        }
    }
}

/// Current view; peaks are included unless asked otherwise
#[tauri::command]
async fn editor_view(
    state: State<'_, AppState>,
    include_peaks: Option<bool>,
) -> std::result::Result<ViewModel, String> {
    let editor = state.editor.lock().await;
    Ok(editor.view(include_peaks.unwrap_or(true)))
}

/// Load `path`, or ask for a file when no path is given
///
/// Cancelling the dialog leaves the editor untouched.
#[tauri::command]
async fn choose_file(
    app: AppHandle,
    state: State<'_, AppState>,
    path: Option<PathBuf>,
) -> std::result::Result<ViewModel, String> {
    let path = match path {
        Some(path) => Some(path),
        None => pick_audio_file(&app).await,
    };

    let mut editor = state.editor.lock().await;
    if let Some(path) = path {
        editor.choose_file_path(&path).map_err(|e| e.to_string())?;
    }
    Ok(editor.view(false))
}

async fn pick_audio_file(app: &AppHandle) -> Option<PathBuf> {
    let (tx, rx) = oneshot::channel();
    app.dialog()
        .file()
        .add_filter("Audio", AUDIO_EXTENSIONS)
        .pick_file(move |picked| {
            let _ = tx.send(picked);
        });
    rx.await.ok().flatten().and_then(|picked| picked.into_path().ok())
}

#[tauri::command]
async fn play_pause(state: State<'_, AppState>) -> std::result::Result<bool, String> {
    let mut editor = state.editor.lock().await;
    editor.toggle_playback();
    Ok(editor.session().is_playing())
}

#[tauri::command]
async fn draw_region(
    state: State<'_, AppState>,
    start: f64,
    end: f64,
) -> std::result::Result<Region, String> {
    let mut editor = state.editor.lock().await;
    editor.draw_region(start, end).map_err(|e| e.to_string())
}

#[tauri::command]
async fn finish_region_drag(
    state: State<'_, AppState>,
    id: String,
    start: f64,
    end: f64,
) -> std::result::Result<Region, String> {
    let mut editor = state.editor.lock().await;
    editor
        .finish_region_drag(&id, start, end)
        .map_err(|e| e.to_string())
}

/// Export the active region; resolves to where the clip was saved
///
/// The editor is released while the engine works so the waveform keeps
/// updating. Failures are logged, not returned.
#[tauri::command]
async fn trim_selection(state: State<'_, AppState>) -> std::result::Result<Option<String>, String> {
    let (job, engine) = {
        let mut editor = state.editor.lock().await;
        match editor.begin_trim() {
            Ok(job) => (job, Arc::clone(editor.engine())),
            Err(e) => {
                tracing::error!("Error during trimming: {}", e);
                return Ok(None);
            }
        }
    };

    let result = job.run(&engine).await;

    let mut editor = state.editor.lock().await;
    Ok(editor
        .complete_trim(result)
        .map(|path| path.display().to_string()))
}

/// Read a file's metadata without loading it
#[tauri::command]
async fn get_audio_info(file_path: String) -> std::result::Result<AudioInfo, String> {
    // Run blocking audio processing in a dedicated thread pool
    tokio::task::spawn_blocking(move || audio::get_audio_info(&file_path).map_err(|e| e.to_string()))
        .await
        .map_err(|e| format!("Task join error: {}", e))?
}

async fn poll_loop(app: AppHandle, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let state = app.state::<AppState>();
        let view = {
            let mut editor = state.editor.lock().await;
            let routed = editor.pump();
            // Keep the playhead moving while playing even without events
            if routed == 0 && !editor.session().is_playing() {
                continue;
            }
            editor.view(false)
        };
        if let Err(e) = app.emit(EDITOR_CHANGED, &view) {
            tracing::warn!("Could not emit {}: {}", EDITOR_CHANGED, e);
        }
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            let config = Config::load_or_default(config_path().as_deref());
            let interval = config.poll_interval();
            let editor = Editor::new(config, AudioPlayer::new());

            let engine = Arc::clone(editor.engine());
            tauri::async_runtime::spawn(async move {
                if let Err(e) = engine.initialize_async().await {
                    tracing::error!("Media engine failed to load: {}", e);
                }
            });

            app.manage(AppState {
                editor: Mutex::new(editor),
            });
            tauri::async_runtime::spawn(poll_loop(app.handle().clone(), interval));
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            editor_view,
            choose_file,
            play_pause,
            draw_region,
            finish_region_drag,
            trim_selection,
            get_audio_info
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
