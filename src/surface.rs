//! Waveform surface: renders a source, owns its regions and transport
//!
//! Mounting decodes in a background thread. Everything the surface has
//! to say comes out of [`WaveformSurface::poll`] as [`SurfaceEvent`]s, so
//! callers route events explicitly instead of registering closures.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::audio::decoder::decode_audio_bytes;
use crate::audio::playback::Transport;
use crate::audio::types::{AudioData, WaveformPeaks};
use crate::audio::waveform::compute_peaks;
use crate::error::{AudioError, Result};
use crate::region::{Bounds, Region, RegionKind};
use crate::source::{ObjectUrl, ObjectUrlStore};

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    /// Decoding finished; emitted once per mount
    Ready { duration: f64 },
    /// A region was added (the initial one or a user-drawn one)
    RegionCreated(Region),
    /// The user let go of a region handle
    RegionUpdateEnd(Region),
    /// Periodic position report while playing
    AudioProcess { time: f64 },
    /// Decoding failed; no `Ready` will follow for this mount
    LoadFailed(String),
}

/// Handle for the audio-process subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(u64);

struct Decoded {
    audio: Arc<AudioData>,
    peaks: WaveformPeaks,
}

enum MountState {
    Idle,
    Decoding {
        rx: Receiver<Result<Decoded>>,
        initial_region: Region,
    },
    Ready {
        peaks: WaveformPeaks,
    },
    Failed,
}

pub struct WaveformSurface<T: Transport> {
    transport: T,
    store: ObjectUrlStore,
    num_peaks: usize,
    state: MountState,
    regions: Vec<Region>,
    pending: VecDeque<SurfaceEvent>,
    audio_process: Option<Subscription>,
    // Playing as of the last poll
    was_playing: bool,
    next_subscription: u64,
    next_region: u64,
}

impl<T: Transport> WaveformSurface<T> {
    pub fn new(transport: T, store: ObjectUrlStore, num_peaks: usize) -> Self {
        Self {
            transport,
            store,
            num_peaks,
            state: MountState::Idle,
            regions: Vec::new(),
            pending: VecDeque::new(),
            audio_process: None,
            was_playing: false,
            next_subscription: 0,
            next_region: 1,
        }
    }

    /// Start rendering `url`; `initial_region` appears once ready
    ///
    /// Any previous mount is abandoned: its subscription is dropped, its
    /// regions are cleared and a decode still in flight is ignored.
    pub fn mount(
        &mut self,
        url: &ObjectUrl,
        extension: Option<&str>,
        initial_region: Region,
    ) -> Result<()> {
        let bytes = self.store.fetch(url)?;

        self.audio_process = None;
        self.was_playing = false;
        self.transport.stop();
        self.regions.clear();
        self.pending.clear();

        let (tx, rx) = mpsc::channel();
        let extension = extension.map(str::to_owned);
        let num_peaks = self.num_peaks;
        thread::spawn(move || {
            let decoded = decode_audio_bytes(bytes, extension.as_deref()).and_then(|audio| {
                let peaks = compute_peaks(&audio, num_peaks)?;
                Ok(Decoded {
                    audio: Arc::new(audio),
                    peaks,
                })
            });
            // The receiver is gone if a newer mount replaced this one
            let _ = tx.send(decoded);
        });

        tracing::debug!(url = %url, "Mounting waveform");
        self.state = MountState::Decoding { rx, initial_region };
        Ok(())
    }

    /// Block until the current mount finishes decoding, or `timeout` passes
    ///
    /// The outcome is reported through the next [`poll`](Self::poll).
    pub fn wait_for_mount(&mut self, timeout: Duration) {
        let outcome = match &self.state {
            MountState::Decoding { rx, .. } => rx.recv_timeout(timeout),
            _ => return,
        };
        match outcome {
            Ok(decoded) => self.complete_mount(decoded),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => self.fail_mount("decoder thread exited".to_string()),
        }
    }

    fn check_mount(&mut self) {
        let outcome = match &self.state {
            MountState::Decoding { rx, .. } => rx.try_recv(),
            _ => return,
        };
        match outcome {
            Ok(decoded) => self.complete_mount(decoded),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => self.fail_mount("decoder thread exited".to_string()),
        }
    }

    fn complete_mount(&mut self, decoded: Result<Decoded>) {
        let initial_region = match std::mem::replace(&mut self.state, MountState::Idle) {
            MountState::Decoding { initial_region, .. } => initial_region,
            other => {
                self.state = other;
                return;
            }
        };

        let decoded = match decoded {
            Ok(decoded) => decoded,
            Err(e) => return self.fail_mount(e.to_string()),
        };
        if let Err(e) = self.transport.load(decoded.audio) {
            return self.fail_mount(e.to_string());
        }

        let duration = self.transport.duration();
        tracing::info!(duration, "Waveform ready");

        self.state = MountState::Ready {
            peaks: decoded.peaks,
        };
        self.pending.push_back(SurfaceEvent::Ready { duration });
        self.regions.push(initial_region.clone());
        self.pending
            .push_back(SurfaceEvent::RegionCreated(initial_region));
    }

    fn fail_mount(&mut self, message: String) {
        tracing::error!("Could not render waveform: {}", message);
        self.state = MountState::Failed;
        self.pending.push_back(SurfaceEvent::LoadFailed(message));
    }

    /// Drain what happened since the last call
    ///
    /// While subscribed and playing, the last event is an
    /// `AudioProcess` carrying the current position. When playback runs
    /// off the end of the audio, one more `AudioProcess` reports the
    /// duration.
    pub fn poll(&mut self) -> Vec<SurfaceEvent> {
        self.check_mount();

        let mut events: Vec<SurfaceEvent> = self.pending.drain(..).collect();
        let playing = self.transport.is_playing();
        if self.audio_process.is_some() && self.is_ready() {
            if playing {
                events.push(SurfaceEvent::AudioProcess {
                    time: self.transport.current_time(),
                });
            } else if self.was_playing {
                events.push(SurfaceEvent::AudioProcess {
                    time: self.transport.duration(),
                });
            }
        }
        self.was_playing = playing;
        events
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, MountState::Ready { .. })
    }

    pub fn is_mounting(&self) -> bool {
        matches!(self.state, MountState::Decoding { .. })
    }

    pub fn peaks(&self) -> Option<&WaveformPeaks> {
        match &self.state {
            MountState::Ready { peaks } => Some(peaks),
            _ => None,
        }
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Add a user-drawn region
    pub fn add_region(&mut self, start: f64, end: f64) -> Result<Region> {
        if !self.is_ready() {
            return Err(AudioError::SurfaceNotReady);
        }
        self.next_region += 1;
        let id = format!("region-{}", self.next_region);
        let bounds = Bounds::new(start, end).ok_or_else(|| AudioError::InvalidRegion {
            id: id.clone(),
            reason: format!("{}s to {}s is not a forward range", start, end),
        })?;

        let region = Region {
            id,
            kind: RegionKind::UserDrawn,
            bounds,
        };
        self.regions.push(region.clone());
        self.pending
            .push_back(SurfaceEvent::RegionCreated(region.clone()));
        Ok(region)
    }

    /// Finish dragging/resizing region `id` to `[start, end]`
    ///
    /// Handles cannot leave the waveform: the start is clamped to 0 and
    /// the end to the duration.
    pub fn finish_region_drag(&mut self, id: &str, start: f64, end: f64) -> Result<Region> {
        if !self.is_ready() {
            return Err(AudioError::SurfaceNotReady);
        }
        let duration = self.transport.duration();
        let region = self
            .regions
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AudioError::InvalidRegion {
                id: id.to_string(),
                reason: "no such region".to_string(),
            })?;

        let start = start.max(0.0);
        let end = if duration > 0.0 { end.min(duration) } else { end };
        region.bounds = Bounds::new(start, end).ok_or_else(|| AudioError::InvalidRegion {
            id: id.to_string(),
            reason: format!("end ({}s) must be after start ({}s)", end, start),
        })?;

        let region = region.clone();
        self.pending
            .push_back(SurfaceEvent::RegionUpdateEnd(region.clone()));
        Ok(region)
    }

    /// Seek to `fraction` (0..=1) of the total duration
    pub fn seek_to(&mut self, fraction: f64) {
        if !fraction.is_finite() {
            tracing::warn!(fraction, "Ignoring seek to a non-finite position");
            return;
        }
        let duration = self.transport.duration();
        self.transport.seek(fraction.clamp(0.0, 1.0) * duration);
    }

    pub fn play(&mut self) {
        if self.is_ready() {
            self.transport.play();
        }
    }

    pub fn pause(&mut self) {
        self.transport.pause();
        self.was_playing = false;
    }

    pub fn toggle_play_pause(&mut self) {
        if self.transport.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    pub fn current_time(&self) -> f64 {
        self.transport.current_time()
    }

    pub fn duration(&self) -> f64 {
        if self.is_ready() {
            self.transport.duration()
        } else {
            0.0
        }
    }

    /// Subscribe to `AudioProcess`, replacing any earlier subscription
    pub fn subscribe_audio_process(&mut self) -> Subscription {
        self.next_subscription += 1;
        let subscription = Subscription(self.next_subscription);
        self.audio_process = Some(subscription);
        subscription
    }

    /// Remove `subscription` if it is still the active one
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        if self.audio_process == Some(subscription) {
            self.audio_process = None;
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    pub(crate) fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
