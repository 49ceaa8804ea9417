//! Background audio that keeps playing across page navigations and stays in
//! step between open tabs.
//!
//! Each page runs a [`PlaybackController`] over its media element. State is
//! persisted to a shared [`StateStore`] and relayed between pages by a
//! [`CoordinationWorker`] running on its own thread.

pub mod core;
pub mod media;
pub mod playback;
pub mod protocol;
pub mod store;
pub mod worker;

pub use crate::core::{PlaybackState, StatePatch, SyncConfig};
pub use crate::playback::{PageEvent, PlaybackController};
pub use crate::store::{JsonFileStore, MemoryStore, StateStore};
pub use crate::worker::{CoordinationWorker, WorkerHandle, WorkerRuntime};
