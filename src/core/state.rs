//! Playback state value types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::time::EpochMillis;

/// Volume a fresh media element starts at
pub const DEFAULT_VOLUME: f64 = 0.7;

/// Clamp a volume into `[0, 1]`. NaN becomes silence.
#[inline]
pub fn clamp_volume(volume: f64) -> f64 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

/// Clamp a playback position to a finite, non-negative number of seconds.
#[inline]
pub fn clamp_position(seconds: f64) -> f64 {
    if seconds.is_finite() {
        seconds.max(0.0)
    } else {
        0.0
    }
}

/// Snapshot of one page's playback, stamped when captured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub is_playing: bool,
    /// Seconds
    pub current_time: f64,
    /// `[0, 1]`
    pub volume: f64,
    pub timestamp: EpochMillis,
}

impl PlaybackState {
    pub fn new(is_playing: bool, current_time: f64, volume: f64, timestamp: EpochMillis) -> Self {
        Self {
            is_playing,
            current_time: clamp_position(current_time),
            volume: clamp_volume(volume),
            timestamp,
        }
    }

    /// Idle state used on first start and after a staleness reset
    pub fn idle(default_volume: f64, timestamp: EpochMillis) -> Self {
        Self::new(false, 0.0, default_volume, timestamp)
    }

    pub fn mode(&self) -> PlaybackMode {
        if self.is_playing {
            PlaybackMode::Playing
        } else {
            PlaybackMode::Paused
        }
    }

    /// Milliseconds since this state was captured
    pub fn age(&self, now: EpochMillis) -> EpochMillis {
        crate::core::time::age(now, self.timestamp)
    }

    /// True while the state is younger than `window_ms`
    pub fn is_fresh(&self, now: EpochMillis, window_ms: EpochMillis) -> bool {
        self.age(now) < window_ms
    }

    /// Overlay the fields present in `patch`; absent fields stay as they are.
    pub fn merge(&mut self, patch: &StatePatch) {
        if let Some(is_playing) = patch.is_playing {
            self.is_playing = is_playing;
        }
        if let Some(current_time) = patch.current_time {
            self.current_time = clamp_position(current_time);
        }
        if let Some(volume) = patch.volume {
            self.volume = clamp_volume(volume);
        }
        if let Some(timestamp) = patch.timestamp {
            self.timestamp = timestamp;
        }
    }
}

/// Partial playback state carried by update and sync messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_playing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<EpochMillis>,
}

impl StatePatch {
    pub fn is_empty(&self) -> bool {
        self.is_playing.is_none()
            && self.current_time.is_none()
            && self.volume.is_none()
            && self.timestamp.is_none()
    }

    /// Copy with the volume and position clamped
    pub fn clamped(mut self) -> Self {
        self.current_time = self.current_time.map(clamp_position);
        self.volume = self.volume.map(clamp_volume);
        self
    }
}

impl From<PlaybackState> for StatePatch {
    fn from(state: PlaybackState) -> Self {
        Self {
            is_playing: Some(state.is_playing),
            current_time: Some(state.current_time),
            volume: Some(state.volume),
            timestamp: Some(state.timestamp),
        }
    }
}

/// Value of the discrete play/pause flag in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackMode {
    Playing,
    Paused,
}

impl PlaybackMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackMode::Playing => "playing",
            PlaybackMode::Paused => "paused",
        }
    }
}

impl fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown playback mode: {0:?}")]
pub struct UnknownMode(pub String);

impl FromStr for PlaybackMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "playing" => Ok(PlaybackMode::Playing),
            "paused" => Ok(PlaybackMode::Paused),
            other => Err(UnknownMode(other.to_string())),
        }
    }
}
