//! The media element contract consumed by the playback controller.

use crate::core::config::SyncConfig;

/// Error type for platform media operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MediaError {
    /// Playback refused, typically an autoplay policy without a user gesture
    #[error("Play request not allowed: {0}")]
    NotAllowed(String),
}

/// Lifecycle events emitted by a media element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    Play,
    Pause,
    Ended,
    /// Periodic position tick
    TimeUpdate,
    VolumeChange,
    /// Enough data is buffered to play to the end without stalling
    CanPlayThrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preload {
    None,
    Metadata,
    #[default]
    Auto,
}

/// How the background media resource is declared
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSource {
    pub url: String,
    pub mime_type: String,
    pub looping: bool,
    pub preload: Preload,
    pub cross_origin: Option<String>,
}

impl MediaSource {
    pub fn background_track(config: &SyncConfig) -> Self {
        Self {
            url: config.audio_url.clone(),
            mime_type: "audio/mpeg".to_string(),
            looping: true,
            preload: Preload::Auto,
            cross_origin: Some("anonymous".to_string()),
        }
    }
}

/// A playable media resource with transport controls and lifecycle events.
pub trait MediaElement {
    /// Ask the platform to start playback. May be refused.
    fn play(&mut self) -> Result<(), MediaError>;
    fn pause(&mut self);
    fn is_paused(&self) -> bool;

    /// Position in seconds
    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, seconds: f64);

    /// Volume in `[0, 1]`
    fn volume(&self) -> f64;
    fn set_volume(&mut self, volume: f64);

    /// Duration in seconds, once known
    fn duration(&self) -> Option<f64>;

    /// Whether the element has reached the "can play through" ready state
    fn can_play_through(&self) -> bool;

    /// Next queued lifecycle event, if any
    fn poll_event(&mut self) -> Option<MediaEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_track_declaration() {
        let source = MediaSource::background_track(&SyncConfig::default());
        assert!(source.looping);
        assert_eq!(source.preload, Preload::Auto);
        assert_eq!(source.cross_origin.as_deref(), Some("anonymous"));
        assert_eq!(source.mime_type, "audio/mpeg");
        assert!(source.url.ends_with(".mp3"));
    }
}
