//! What the editor shows, and what the user can do to it
//!
//! [`ViewModel`] is a plain snapshot serialised for the webview;
//! [`Intent`] is everything a control can send back.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::audio::types::WaveformPeaks;
use crate::region::Region;
use crate::session::{Phase, TimeLabels};
use crate::source::AUDIO_EXTENSIONS;

pub const UPLOAD_TITLE: &str = "Upload Audio";
pub const UPLOAD_MESSAGE: &str = "Select an audio file to upload and trim the audio as needed.";
pub const EDITOR_TITLE: &str = "Trim Audio";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum ViewModel {
    /// No file chosen yet
    UploadPrompt {
        title: String,
        message: String,
        accept: Vec<String>,
    },
    Editor(EditorView),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditorView {
    pub title: String,
    pub file_name: String,
    pub phase: Phase,
    /// Waveform rendered and playable
    pub ready: bool,
    pub is_playing: bool,
    pub labels: TimeLabels,
    pub current_time: f64,
    pub duration: f64,
    pub regions: Vec<Region>,
    pub active_region: Region,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peaks: Option<WaveformPeaks>,
}

impl ViewModel {
    pub fn upload_prompt() -> Self {
        ViewModel::UploadPrompt {
            title: UPLOAD_TITLE.to_string(),
            message: UPLOAD_MESSAGE.to_string(),
            accept: AUDIO_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
        }
    }

    /// Play/pause and trim are only offered once the waveform is ready
    pub fn controls_enabled(&self) -> bool {
        matches!(self, ViewModel::Editor(view) if view.ready)
    }

    /// Label of the play/pause button
    pub fn play_button_label(&self) -> Option<&'static str> {
        match self {
            ViewModel::Editor(view) if view.is_playing => Some("Pause"),
            ViewModel::Editor(_) => Some("Play"),
            ViewModel::UploadPrompt { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    ChooseFile { path: PathBuf },
    PlayPause,
    /// Drag out a new region on the waveform
    DrawRegion { start: f64, end: f64 },
    /// Let go of a region handle
    FinishRegionDrag { id: String, start: f64, end: f64 },
    Trim,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_upload_prompt_copy() {
        let view = ViewModel::upload_prompt();
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["screen"], "upload_prompt");
        assert_eq!(value["title"], "Upload Audio");
        assert_eq!(
            value["message"],
            "Select an audio file to upload and trim the audio as needed."
        );
        assert!(value["accept"].as_array().unwrap().contains(&json!("mp3")));
        assert!(!view.controls_enabled());
        assert_eq!(view.play_button_label(), None);
    }

    #[test]
    fn test_intents_from_json() {
        let intent: Intent = serde_json::from_value(json!({
            "intent": "finish_region_drag",
            "id": "region-1",
            "start": 1.5,
            "end": 4.0
        }))
        .unwrap();
        assert_eq!(
            intent,
            Intent::FinishRegionDrag {
                id: "region-1".to_string(),
                start: 1.5,
                end: 4.0
            }
        );

        let intent: Intent = serde_json::from_value(json!({ "intent": "play_pause" })).unwrap();
        assert_eq!(intent, Intent::PlayPause);

        assert!(serde_json::from_value::<Intent>(json!({ "intent": "explode" })).is_err());
    }
}
