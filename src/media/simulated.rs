//! In-process media element with a hand-driven playhead.
//!
//! Clones share one element, the way two lookups of the same DOM node
//! return the same object. Tests and the demo binary advance it explicitly.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::core::state::{clamp_position, clamp_volume};
use crate::media::element::{MediaElement, MediaError, MediaEvent, MediaSource};

#[derive(Debug)]
struct Inner {
    source: MediaSource,
    current_time: f64,
    volume: f64,
    paused: bool,
    ready: bool,
    duration: Option<f64>,
    autoplay_blocked: bool,
    play_requests: usize,
    events: VecDeque<MediaEvent>,
}

#[derive(Debug, Clone)]
pub struct SimulatedMedia {
    inner: Arc<Mutex<Inner>>,
}

impl SimulatedMedia {
    /// A paused, not-yet-buffered element at full volume
    pub fn new(source: MediaSource, duration: Option<f64>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                source,
                current_time: 0.0,
                volume: 1.0,
                paused: true,
                ready: false,
                duration,
                autoplay_blocked: false,
                play_requests: 0,
                events: VecDeque::new(),
            })),
        }
    }

    pub fn source(&self) -> MediaSource {
        self.inner.lock().source.clone()
    }

    /// Mark the element buffered and emit `CanPlayThrough` once
    pub fn set_ready(&self) {
        let mut inner = self.inner.lock();
        if !inner.ready {
            inner.ready = true;
            inner.events.push_back(MediaEvent::CanPlayThrough);
        }
    }

    /// Refuse every `play()` until unblocked
    pub fn block_autoplay(&self, blocked: bool) {
        self.inner.lock().autoplay_blocked = blocked;
    }

    /// Number of `play()` calls the element has seen, refused ones included
    pub fn play_requests(&self) -> usize {
        self.inner.lock().play_requests
    }

    pub fn pending_events(&self) -> usize {
        self.inner.lock().events.len()
    }

    /// Move the playhead forward by `seconds` if playing, emitting a position tick
    pub fn advance(&self, seconds: f64) {
        let mut inner = self.inner.lock();
        if inner.paused {
            return;
        }

        inner.current_time += seconds.max(0.0);
        match inner.duration {
            Some(duration) if duration > 0.0 && inner.current_time >= duration => {
                if inner.source.looping {
                    inner.current_time %= duration;
                    inner.events.push_back(MediaEvent::TimeUpdate);
                } else {
                    inner.current_time = duration;
                    inner.paused = true;
                    inner.events.push_back(MediaEvent::TimeUpdate);
                    inner.events.push_back(MediaEvent::Pause);
                    inner.events.push_back(MediaEvent::Ended);
                }
            }
            _ => inner.events.push_back(MediaEvent::TimeUpdate),
        }
    }
}

impl MediaElement for SimulatedMedia {
    fn play(&mut self) -> Result<(), MediaError> {
        let mut inner = self.inner.lock();
        inner.play_requests += 1;
        if inner.autoplay_blocked {
            return Err(MediaError::NotAllowed(
                "play() requires a user gesture".to_string(),
            ));
        }
        if inner.paused {
            inner.paused = false;
            inner.events.push_back(MediaEvent::Play);
        }
        Ok(())
    }

    fn pause(&mut self) {
        let mut inner = self.inner.lock();
        if !inner.paused {
            inner.paused = true;
            inner.events.push_back(MediaEvent::Pause);
        }
    }

    fn is_paused(&self) -> bool {
        self.inner.lock().paused
    }

    fn current_time(&self) -> f64 {
        self.inner.lock().current_time
    }

    fn set_current_time(&mut self, seconds: f64) {
        let mut inner = self.inner.lock();
        let mut position = clamp_position(seconds);
        if let Some(duration) = inner.duration {
            position = position.min(duration);
        }
        inner.current_time = position;
    }

    fn volume(&self) -> f64 {
        self.inner.lock().volume
    }

    fn set_volume(&mut self, volume: f64) {
        let mut inner = self.inner.lock();
        let volume = clamp_volume(volume);
        if inner.volume != volume {
            inner.volume = volume;
            inner.events.push_back(MediaEvent::VolumeChange);
        }
    }

    fn duration(&self) -> Option<f64> {
        self.inner.lock().duration
    }

    fn can_play_through(&self) -> bool {
        self.inner.lock().ready
    }

    fn poll_event(&mut self) -> Option<MediaEvent> {
        self.inner.lock().events.pop_front()
    }
}
