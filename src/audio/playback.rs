// src/audio/playback.rs
//! Playback transports
//!
//! A [`Transport`] plays an in-memory [`AudioData`] and reports its
//! position. [`AudioPlayer`] drives the default output device through
//! cpal (feature `audio-output`); [`SilentTransport`] keeps the same
//! clock without producing sound, for headless use.

use std::sync::Arc;
use std::time::Instant;

use crate::audio::types::AudioData;
use crate::error::Result;

/// Play/pause/seek over one loaded piece of audio
pub trait Transport: Send {
    /// Replace whatever was loaded. Playback starts paused at 0.
    fn load(&mut self, audio: Arc<AudioData>) -> Result<()>;

    fn play(&mut self);

    fn pause(&mut self);

    fn is_playing(&self) -> bool;

    /// Jump to `seconds`, clamped to the loaded duration
    fn seek(&mut self, seconds: f64);

    fn current_time(&self) -> f64;

    fn duration(&self) -> f64;

    /// Unload and release the output
    fn stop(&mut self);
}

/// Wall-clock transport that produces no sound
#[derive(Debug, Default)]
pub struct SilentTransport {
    duration: f64,
    position: f64,
    playing_since: Option<Instant>,
}

impl SilentTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn raw_position(&self) -> f64 {
        let elapsed = self
            .playing_since
            .map(|since| since.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        (self.position + elapsed).min(self.duration)
    }

    /// A run past the end becomes a pause at the end
    fn settle(&mut self) {
        if self.playing_since.is_some() && self.raw_position() >= self.duration {
            self.position = self.duration;
            self.playing_since = None;
        }
    }
}

impl Transport for SilentTransport {
    fn load(&mut self, audio: Arc<AudioData>) -> Result<()> {
        self.duration = audio.duration_seconds();
        self.position = 0.0;
        self.playing_since = None;
        Ok(())
    }

    fn play(&mut self) {
        self.settle();
        if self.playing_since.is_none() && self.duration > 0.0 {
            // Playing again after the end starts over
            if self.position >= self.duration {
                self.position = 0.0;
            }
            self.playing_since = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        self.position = self.raw_position();
        self.playing_since = None;
    }

    fn is_playing(&self) -> bool {
        self.playing_since.is_some() && self.raw_position() < self.duration
    }

    fn seek(&mut self, seconds: f64) {
        self.settle();
        self.position = seconds.clamp(0.0, self.duration);
        if self.playing_since.is_some() {
            self.playing_since = Some(Instant::now());
        }
    }

    fn current_time(&self) -> f64 {
        self.raw_position()
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn stop(&mut self) {
        *self = Self::default();
    }
}

#[cfg(feature = "audio-output")]
pub use device::AudioPlayer;

#[cfg(feature = "audio-output")]
mod device {
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::StreamConfig;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::{mpsc, Arc, Mutex};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    use super::Transport;
    use crate::audio::types::AudioData;
    use crate::error::{AudioError, Result};

    /// Shared state between the player, its output thread and the cpal callback
    struct SharedPlaybackState {
        is_playing: AtomicBool,
        current_frame: AtomicU64,
        total_frames: AtomicU64,
        sample_rate: AtomicU64,
        should_stop: AtomicBool,
        seek_to_frame: AtomicU64,
        seek_pending: AtomicBool,
    }

    impl SharedPlaybackState {
        fn new() -> Self {
            Self {
                is_playing: AtomicBool::new(false),
                current_frame: AtomicU64::new(0),
                total_frames: AtomicU64::new(0),
                sample_rate: AtomicU64::new(44100),
                should_stop: AtomicBool::new(false),
                seek_to_frame: AtomicU64::new(0),
                seek_pending: AtomicBool::new(false),
            }
        }

        fn seconds(&self, frames: u64) -> f64 {
            let rate = self.sample_rate.load(Ordering::SeqCst);
            if rate > 0 {
                frames as f64 / rate as f64
            } else {
                0.0
            }
        }
    }

    /// Speaker output for the loaded audio
    ///
    /// The cpal stream lives entirely in a background thread, so the
    /// player itself is Send + Sync.
    pub struct AudioPlayer {
        state: Arc<SharedPlaybackState>,
        output_thread: Mutex<Option<JoinHandle<()>>>,
    }

    impl Default for AudioPlayer {
        fn default() -> Self {
            Self::new()
        }
    }

    impl AudioPlayer {
        pub fn new() -> Self {
            Self {
                state: Arc::new(SharedPlaybackState::new()),
                output_thread: Mutex::new(None),
            }
        }

        fn join_output_thread(&self) {
            let handle = match self.output_thread.lock() {
                Ok(mut guard) => guard.take(),
                Err(poisoned) => poisoned.into_inner().take(),
            };
            if let Some(handle) = handle {
                let _ = handle.join();
            }
        }
    }

    impl Transport for AudioPlayer {
        fn load(&mut self, audio: Arc<AudioData>) -> Result<()> {
            self.stop();

            let state = Arc::clone(&self.state);
            state.should_stop.store(false, Ordering::SeqCst);
            state.is_playing.store(false, Ordering::SeqCst);
            state.seek_pending.store(false, Ordering::SeqCst);
            state.current_frame.store(0, Ordering::SeqCst);
            state
                .total_frames
                .store(audio.frame_count() as u64, Ordering::SeqCst);
            state
                .sample_rate
                .store(audio.sample_rate as u64, Ordering::SeqCst);

            let (started_tx, started_rx) = mpsc::channel();
            let handle = thread::spawn(move || run_output(audio, state, started_tx));

            match self.output_thread.lock() {
                Ok(mut guard) => *guard = Some(handle),
                Err(poisoned) => *poisoned.into_inner() = Some(handle),
            }

            started_rx.recv().map_err(|_| {
                AudioError::PlaybackFailed("Output thread exited before starting".to_string())
            })?
        }

        fn play(&mut self) {
            self.state.is_playing.store(true, Ordering::SeqCst);
        }

        fn pause(&mut self) {
            self.state.is_playing.store(false, Ordering::SeqCst);
        }

        fn is_playing(&self) -> bool {
            self.state.is_playing.load(Ordering::SeqCst)
        }

        fn seek(&mut self, seconds: f64) {
            let rate = self.state.sample_rate.load(Ordering::SeqCst) as f64;
            let total = self.state.total_frames.load(Ordering::SeqCst);
            let frame = ((seconds.max(0.0) * rate) as u64).min(total);
            self.state.seek_to_frame.store(frame, Ordering::SeqCst);
            self.state.current_frame.store(frame, Ordering::SeqCst);
            self.state.seek_pending.store(true, Ordering::SeqCst);
        }

        fn current_time(&self) -> f64 {
            self.state
                .seconds(self.state.current_frame.load(Ordering::SeqCst))
        }

        fn duration(&self) -> f64 {
            self.state
                .seconds(self.state.total_frames.load(Ordering::SeqCst))
        }

        fn stop(&mut self) {
            self.state.should_stop.store(true, Ordering::SeqCst);
            self.state.is_playing.store(false, Ordering::SeqCst);
            self.join_output_thread();
            self.state.current_frame.store(0, Ordering::SeqCst);
        }
    }

    impl Drop for AudioPlayer {
        fn drop(&mut self) {
            self.stop();
        }
    }

    /// Own the cpal stream until told to stop
    fn run_output(
        audio: Arc<AudioData>,
        state: Arc<SharedPlaybackState>,
        started: mpsc::Sender<Result<()>>,
    ) {
        let stream = match build_stream(&audio, &state) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!("Playback error: {}", e);
                let _ = started.send(Err(e));
                return;
            }
        };
        let _ = started.send(Ok(()));

        while !state.should_stop.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(10));
        }

        drop(stream);
    }

    fn build_stream(audio: &Arc<AudioData>, state: &Arc<SharedPlaybackState>) -> Result<cpal::Stream> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::PlaybackFailed("No output device available".to_string()))?;

        let config = StreamConfig {
            channels: audio.channels,
            sample_rate: cpal::SampleRate(audio.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let samples = Arc::clone(audio);
        let state_cb = Arc::clone(state);
        let channels = audio.channels.max(1) as usize;
        let mut read_pos = 0usize;

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if state_cb.seek_pending.swap(false, Ordering::SeqCst) {
                        let frame = state_cb.seek_to_frame.load(Ordering::SeqCst) as usize;
                        read_pos = (frame * channels).min(samples.samples.len());
                    }

                    if !state_cb.is_playing.load(Ordering::SeqCst) {
                        data.fill(0.0);
                        return;
                    }

                    let available = samples.samples.len() - read_pos;
                    let n = available.min(data.len());
                    data[..n].copy_from_slice(&samples.samples[read_pos..read_pos + n]);
                    data[n..].fill(0.0);
                    read_pos += n;

                    state_cb
                        .current_frame
                        .store((read_pos / channels) as u64, Ordering::SeqCst);

                    // End of audio: stop and rewind, as a media element does
                    if read_pos >= samples.samples.len() {
                        state_cb.is_playing.store(false, Ordering::SeqCst);
                        read_pos = 0;
                        state_cb.current_frame.store(0, Ordering::SeqCst);
                    }
                },
                |err| {
                    tracing::error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::PlaybackFailed(format!("Failed to build stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| AudioError::PlaybackFailed(format!("Failed to start stream: {}", e)))?;

        Ok(stream)
    }
}

/// Deterministic transport for tests: time only moves when told to
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct ManualTransport {
    pub duration: f64,
    pub position: f64,
    pub playing: bool,
    pub seeks: Vec<f64>,
}

#[cfg(test)]
impl ManualTransport {
    /// Move the playhead; reaching the end stops playback there
    pub fn advance_to(&mut self, seconds: f64) {
        self.position = seconds.min(self.duration);
        if self.position >= self.duration {
            self.playing = false;
        }
    }
}

#[cfg(test)]
impl Transport for ManualTransport {
    fn load(&mut self, audio: Arc<AudioData>) -> Result<()> {
        self.duration = audio.duration_seconds();
        self.position = 0.0;
        self.playing = false;
        Ok(())
    }

    fn play(&mut self) {
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn seek(&mut self, seconds: f64) {
        self.position = seconds.clamp(0.0, self.duration);
        self.seeks.push(self.position);
    }

    fn current_time(&self) -> f64 {
        self.position
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn stop(&mut self) {
        self.playing = false;
        self.position = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_second() -> Arc<AudioData> {
        Arc::new(AudioData {
            samples: vec![0.0; 8000],
            sample_rate: 8000,
            channels: 1,
        })
    }

    #[test]
    fn test_silent_transport_starts_paused() {
        let mut transport = SilentTransport::new();
        transport.load(one_second()).unwrap();
        assert!(!transport.is_playing());
        assert_eq!(transport.current_time(), 0.0);
        assert_eq!(transport.duration(), 1.0);
    }

    #[test]
    fn test_silent_transport_seek_clamps() {
        let mut transport = SilentTransport::new();
        transport.load(one_second()).unwrap();
        transport.seek(5.0);
        assert_eq!(transport.current_time(), 1.0);
        transport.seek(-1.0);
        assert_eq!(transport.current_time(), 0.0);
    }

    #[test]
    fn test_silent_transport_pause_freezes_clock() {
        let mut transport = SilentTransport::new();
        transport.load(one_second()).unwrap();
        transport.seek(0.25);
        transport.play();
        assert!(transport.is_playing());
        transport.pause();
        let frozen = transport.current_time();
        assert!(frozen >= 0.25);
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(transport.current_time(), frozen);
    }

    #[test]
    fn test_silent_transport_stops_at_end() {
        let mut transport = SilentTransport::new();
        transport.load(one_second()).unwrap();
        transport.seek(0.99);
        transport.play();
        std::thread::sleep(std::time::Duration::from_millis(30));
        assert!(!transport.is_playing());
        assert_eq!(transport.current_time(), 1.0);
    }

    #[test]
    fn test_silent_transport_replays_after_the_end() {
        let mut transport = SilentTransport::new();
        transport.load(one_second()).unwrap();
        transport.seek(0.99);
        transport.play();
        std::thread::sleep(std::time::Duration::from_millis(30));

        transport.play();
        assert!(transport.is_playing());
        assert!(transport.current_time() < 0.5);
    }

    #[test]
    fn test_silent_transport_seek_after_the_end_stays_paused() {
        let mut transport = SilentTransport::new();
        transport.load(one_second()).unwrap();
        transport.seek(0.99);
        transport.play();
        std::thread::sleep(std::time::Duration::from_millis(30));

        transport.seek(0.5);
        assert!(!transport.is_playing());
        assert_eq!(transport.current_time(), 0.5);
    }
}
