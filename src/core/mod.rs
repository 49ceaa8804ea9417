//! Core types shared by the controller, the worker and the store.
//!
//! All wall-clock values are epoch milliseconds (i64); playback positions are
//! seconds (f64), matching what media elements report.

pub mod config;
pub mod state;
pub mod time;

pub use config::{ConfigError, StoreKeys, SyncConfig};
pub use state::{clamp_position, clamp_volume, PlaybackMode, PlaybackState, StatePatch};
pub use time::{Clock, EpochMillis, ManualClock, StampSequence, SystemClock};
