//! Background coordination worker.
//!
//! One worker serves every tab of an origin. It holds the canonical playback
//! state, relays updates between controllers, answers state queries and
//! caches the audio resource. It never plays audio itself.

pub mod cache;
pub mod coordinator;
pub mod runtime;

pub use cache::{
    CacheError, CacheStorage, FetchError, FetchOutcome, Network, ResourceCache, StaticNetwork,
};
pub use coordinator::CoordinationWorker;
pub use runtime::{WorkerConnection, WorkerError, WorkerHandle, WorkerRuntime};
