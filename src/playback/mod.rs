//! Page-side playback: the controller plus the events and timers that drive it.

pub mod controller;
pub mod events;
pub mod timers;

pub use controller::PlaybackController;
pub use events::PageEvent;
pub use timers::{TimerAction, TimerHandle, TimerQueue};
