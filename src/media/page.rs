//! Page host: where the controller finds (or creates) its elements.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::media::element::MediaSource;
use crate::media::simulated::SimulatedMedia;
use crate::media::MediaElement;

/// Visual play/pause indicator
pub trait ControlAffordance {
    fn set_playing(&mut self, playing: bool);
}

/// Hands out the page's media element and control affordance.
///
/// Acquisition is idempotent: asking twice for the same id returns the
/// element created the first time.
pub trait PageHost {
    type Media: MediaElement;
    type Control: ControlAffordance;

    fn acquire_media(&mut self, id: &str, source: &MediaSource) -> Self::Media;
    fn acquire_control(&mut self, id: &str) -> Self::Control;
}

/// Which speaker icon the button currently shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakerIcon {
    /// Shown while paused
    On,
    /// Shown while playing
    Off,
}

#[derive(Debug, Default)]
struct ButtonState {
    playing: bool,
    updates: usize,
}

/// Toggle button affordance. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ControlButton {
    state: Arc<Mutex<ButtonState>>,
}

impl ControlButton {
    pub fn shows_playing(&self) -> bool {
        self.state.lock().playing
    }

    pub fn icon(&self) -> SpeakerIcon {
        if self.shows_playing() {
            SpeakerIcon::Off
        } else {
            SpeakerIcon::On
        }
    }

    /// How many times the affordance has been redrawn
    pub fn updates(&self) -> usize {
        self.state.lock().updates
    }
}

impl ControlAffordance for ControlButton {
    fn set_playing(&mut self, playing: bool) {
        let mut state = self.state.lock();
        state.playing = playing;
        state.updates += 1;
    }
}

/// In-memory page: an element registry keyed by id
#[derive(Debug, Default)]
pub struct Document {
    media: HashMap<String, SimulatedMedia>,
    controls: HashMap<String, ControlButton>,
    track_duration: Option<f64>,
    created: usize,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Media elements created by this document report `seconds` as duration
    pub fn with_track_duration(seconds: f64) -> Self {
        Self {
            track_duration: Some(seconds),
            ..Self::default()
        }
    }

    pub fn media(&self, id: &str) -> Option<&SimulatedMedia> {
        self.media.get(id)
    }

    pub fn control(&self, id: &str) -> Option<&ControlButton> {
        self.controls.get(id)
    }

    /// Number of elements created so far (re-acquisitions don't count)
    pub fn created_elements(&self) -> usize {
        self.created
    }
}

impl PageHost for Document {
    type Media = SimulatedMedia;
    type Control = ControlButton;

    fn acquire_media(&mut self, id: &str, source: &MediaSource) -> SimulatedMedia {
        if let Some(existing) = self.media.get(id) {
            return existing.clone();
        }
        let element = SimulatedMedia::new(source.clone(), self.track_duration);
        self.media.insert(id.to_string(), element.clone());
        self.created += 1;
        element
    }

    fn acquire_control(&mut self, id: &str) -> ControlButton {
        if let Some(existing) = self.controls.get(id) {
            return existing.clone();
        }
        let button = ControlButton::default();
        self.controls.insert(id.to_string(), button.clone());
        self.created += 1;
        button
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SyncConfig;

    #[test]
    fn test_acquire_is_idempotent() {
        let mut doc = Document::new();
        let source = MediaSource::background_track(&SyncConfig::default());

        let mut first = doc.acquire_media("background-audio", &source);
        let second = doc.acquire_media("background-audio", &source);
        first.set_current_time(8.0);
        assert_eq!(second.current_time(), 8.0);

        doc.acquire_control("audio-control");
        doc.acquire_control("audio-control");
        assert_eq!(doc.created_elements(), 2);
    }

    #[test]
    fn test_button_icon_follows_state() {
        let mut button = ControlButton::default();
        assert_eq!(button.icon(), SpeakerIcon::On);
        button.set_playing(true);
        assert_eq!(button.icon(), SpeakerIcon::Off);
        assert_eq!(button.updates(), 1);
    }

    #[test]
    fn test_track_duration_applies_to_new_media() {
        let mut doc = Document::with_track_duration(180.0);
        let media = doc.acquire_media("a", &MediaSource::background_track(&SyncConfig::default()));
        assert_eq!(media.duration(), Some(180.0));
    }
}
