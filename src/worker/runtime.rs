//! Worker thread and the handles controllers talk to it through.
//!
//! Registration runs install and activate up front; only then is the worker
//! thread started. Every interaction afterwards crosses a crossbeam channel,
//! and messages from one sender are handled in send order.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::core::config::SyncConfig;
use crate::core::state::PlaybackState;
use crate::core::time::Clock;
use crate::protocol::{
    reply_port, ClientId, ControllerMessage, ReplyPort, ReplyReceiver, WorkerMessage,
};
use crate::worker::cache::{CacheError, CacheStorage, FetchOutcome, Network, ResourceCache};
use crate::worker::coordinator::CoordinationWorker;

/// Error type for worker registration and messaging
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Worker install failed: {0}")]
    Install(#[source] CacheError),
    #[error("Worker fetch failed: {0}")]
    Fetch(#[source] CacheError),
    #[error("Failed to start worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Worker is not running")]
    Disconnected,
}

enum Inbox {
    Connect {
        id: ClientId,
        outbound: Sender<WorkerMessage>,
    },
    Disconnect(ClientId),
    Message {
        from: ClientId,
        message: ControllerMessage,
        reply: Option<ReplyPort>,
    },
    Fetch {
        url: String,
        reply: oneshot::Sender<Result<FetchOutcome, CacheError>>,
    },
    Canonical(oneshot::Sender<PlaybackState>),
    Shutdown,
}

/// Registration entry point
pub struct WorkerRuntime;

impl WorkerRuntime {
    /// Install, activate, then start the worker thread.
    pub fn register(
        config: &SyncConfig,
        storage: CacheStorage,
        network: Arc<dyn Network>,
        clock: Arc<dyn Clock>,
    ) -> Result<WorkerHandle, WorkerError> {
        let cache = ResourceCache::new(config, storage, network);
        cache.install().map_err(WorkerError::Install)?;
        let purged = cache.activate();
        tracing::info!(purged = purged.len(), "audio worker activated");

        let worker = CoordinationWorker::new(
            config.default_volume,
            config.freshness_window_ms,
            clock.now_millis(),
        );
        let sweep_interval = Duration::from_millis(config.sweep_interval_ms.max(1));
        let (inbox_tx, inbox_rx) = channel::unbounded();

        let thread = thread::Builder::new()
            .name("audio-worker".to_string())
            .spawn(move || run(worker, cache, clock, inbox_rx, sweep_interval))?;

        Ok(WorkerHandle {
            inbox: inbox_tx,
            thread: Some(thread),
        })
    }
}

fn run(
    mut worker: CoordinationWorker,
    cache: ResourceCache,
    clock: Arc<dyn Clock>,
    inbox: Receiver<Inbox>,
    sweep_interval: Duration,
) {
    let ticker = channel::tick(sweep_interval);
    loop {
        crossbeam::select! {
            recv(inbox) -> msg => match msg {
                Ok(Inbox::Connect { id, outbound }) => worker.connect(id, outbound),
                Ok(Inbox::Disconnect(id)) => worker.disconnect(id),
                Ok(Inbox::Message { from, message, reply }) => {
                    worker.handle_message(from, message, reply, clock.now_millis());
                }
                Ok(Inbox::Fetch { url, reply }) => {
                    let _ = reply.send(cache.handle_fetch(&url));
                }
                Ok(Inbox::Canonical(reply)) => {
                    let _ = reply.send(*worker.canonical());
                }
                Ok(Inbox::Shutdown) | Err(_) => break,
            },
            recv(ticker) -> _ => {
                worker.sweep(clock.now_millis());
            }
        }
    }
    tracing::debug!("audio worker stopped");
}

/// Owner of the worker thread. Dropping it stops the worker.
pub struct WorkerHandle {
    inbox: Sender<Inbox>,
    thread: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Open a new controller endpoint
    pub fn connect(&self) -> Result<WorkerConnection, WorkerError> {
        let id = ClientId::new();
        let (outbound, inbound) = channel::unbounded();
        self.inbox
            .send(Inbox::Connect { id, outbound })
            .map_err(|_| WorkerError::Disconnected)?;
        Ok(WorkerConnection {
            id,
            inbox: self.inbox.clone(),
            inbound,
        })
    }

    /// Fetch through the worker's cache, blocking for the answer
    pub fn fetch(&self, url: &str) -> Result<FetchOutcome, WorkerError> {
        let (reply, rx) = oneshot::channel();
        self.inbox
            .send(Inbox::Fetch {
                url: url.to_string(),
                reply,
            })
            .map_err(|_| WorkerError::Disconnected)?;
        rx.blocking_recv()
            .map_err(|_| WorkerError::Disconnected)?
            .map_err(WorkerError::Fetch)
    }

    /// Read the canonical state without connecting, blocking for the answer
    pub fn canonical_state(&self) -> Result<PlaybackState, WorkerError> {
        let (reply, rx) = oneshot::channel();
        self.inbox
            .send(Inbox::Canonical(reply))
            .map_err(|_| WorkerError::Disconnected)?;
        rx.blocking_recv().map_err(|_| WorkerError::Disconnected)
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.inbox.send(Inbox::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One controller's link to the worker. Dropping it disconnects.
pub struct WorkerConnection {
    id: ClientId,
    inbox: Sender<Inbox>,
    inbound: Receiver<WorkerMessage>,
}

impl WorkerConnection {
    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn post(&self, message: ControllerMessage) -> Result<(), WorkerError> {
        self.send(message, None)
    }

    /// Send a state query; the answer arrives on the returned receiver only
    pub fn query(&self) -> Result<ReplyReceiver, WorkerError> {
        let (port, rx) = reply_port();
        self.send(ControllerMessage::GetAudioState, Some(port))?;
        Ok(rx)
    }

    fn send(
        &self,
        message: ControllerMessage,
        reply: Option<ReplyPort>,
    ) -> Result<(), WorkerError> {
        self.inbox
            .send(Inbox::Message {
                from: self.id,
                message,
                reply,
            })
            .map_err(|_| WorkerError::Disconnected)
    }

    /// Next pushed message, if one is waiting
    pub fn try_recv(&self) -> Option<WorkerMessage> {
        self.inbound.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<WorkerMessage> {
        match self.inbound.recv_timeout(timeout) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for WorkerConnection {
    fn drop(&mut self) {
        let _ = self.inbox.send(Inbox::Disconnect(self.id));
    }
}
