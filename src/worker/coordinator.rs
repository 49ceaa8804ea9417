//! Canonical state relay.
//!
//! The canonical snapshot is owned here and only changes through
//! [`CoordinationWorker::handle_update`] and [`CoordinationWorker::sweep`].

use crossbeam::channel::Sender;
use std::collections::BTreeMap;

use crate::core::state::{PlaybackState, StatePatch};
use crate::core::time::{EpochMillis, StampSequence};
use crate::protocol::{ClientId, ControllerMessage, ReplyPort, WorkerMessage};

pub struct CoordinationWorker {
    canonical: PlaybackState,
    /// Whether `canonical` came from a controller rather than the idle default
    received: bool,
    clients: BTreeMap<ClientId, Sender<WorkerMessage>>,
    stamps: StampSequence,
    default_volume: f64,
    freshness_window_ms: EpochMillis,
}

impl CoordinationWorker {
    /// Start idle at `default_volume`, stamped `now`
    pub fn new(default_volume: f64, freshness_window_ms: EpochMillis, now: EpochMillis) -> Self {
        let mut stamps = StampSequence::new();
        let canonical = PlaybackState::idle(default_volume, stamps.next(now));
        Self {
            canonical,
            received: false,
            clients: BTreeMap::new(),
            stamps,
            default_volume,
            freshness_window_ms,
        }
    }

    pub fn canonical(&self) -> &PlaybackState {
        &self.canonical
    }

    pub fn has_received(&self) -> bool {
        self.received
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn is_connected(&self, id: ClientId) -> bool {
        self.clients.contains_key(&id)
    }

    /// Register an endpoint that sync messages can be pushed to
    pub fn connect(&mut self, id: ClientId, outbound: Sender<WorkerMessage>) {
        tracing::debug!(client = %id, "controller connected");
        self.clients.insert(id, outbound);
    }

    pub fn disconnect(&mut self, id: ClientId) {
        if self.clients.remove(&id).is_some() {
            tracing::debug!(client = %id, "controller disconnected");
        }
    }

    /// Dispatch one controller message. Queries need a reply port.
    pub fn handle_message(
        &mut self,
        from: ClientId,
        message: ControllerMessage,
        reply: Option<ReplyPort>,
        now: EpochMillis,
    ) {
        match message {
            ControllerMessage::AudioStateUpdate(patch) => {
                self.handle_update(from, &patch, now);
            }
            ControllerMessage::GetAudioState => match reply {
                Some(port) => self.handle_query(port),
                None => tracing::warn!(client = %from, "state query without a reply port dropped"),
            },
        }
    }

    /// Merge an update, restamp it, and push it to every client except `from`.
    ///
    /// Returns how many clients the sync message reached.
    pub fn handle_update(&mut self, from: ClientId, patch: &StatePatch, now: EpochMillis) -> usize {
        self.canonical.merge(&patch.clamped());
        self.canonical.timestamp = self.stamps.next(now);
        self.received = true;

        let sync = WorkerMessage::sync(self.canonical);
        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, endpoint) in &self.clients {
            if *id == from {
                continue;
            }
            match endpoint.send(sync.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => closed.push(*id),
            }
        }
        for id in closed {
            tracing::debug!(client = %id, "pruning closed endpoint");
            self.clients.remove(&id);
        }

        tracing::debug!(
            client = %from,
            delivered,
            playing = self.canonical.is_playing,
            position = self.canonical.current_time,
            "relayed state update"
        );
        delivered
    }

    /// Answer a query privately on its reply port
    pub fn handle_query(&self, reply: ReplyPort) {
        if reply.send(self.received.then_some(self.canonical)).is_err() {
            tracing::debug!("query requester went away before the reply");
        }
    }

    /// Reset the canonical state if it has outlived the freshness window.
    ///
    /// Returns true when a reset happened.
    pub fn sweep(&mut self, now: EpochMillis) -> bool {
        if self.canonical.age(now) <= self.freshness_window_ms {
            return false;
        }
        tracing::info!(
            age_ms = self.canonical.age(now),
            "canonical state expired, resetting"
        );
        self.canonical = PlaybackState::idle(self.default_volume, self.stamps.next(now));
        self.received = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::reply_port;
    use crossbeam::channel::{unbounded, Receiver};

    const WINDOW: EpochMillis = 300_000;

    fn client(worker: &mut CoordinationWorker) -> (ClientId, Receiver<WorkerMessage>) {
        let id = ClientId::new();
        let (tx, rx) = unbounded();
        worker.connect(id, tx);
        (id, rx)
    }

    fn pause_at(seconds: f64) -> StatePatch {
        StatePatch {
            is_playing: Some(false),
            current_time: Some(seconds),
            volume: Some(0.5),
            timestamp: Some(1),
        }
    }

    #[test]
    fn test_initial_state_is_idle() {
        let worker = CoordinationWorker::new(0.7, WINDOW, 1_000);
        let state = worker.canonical();
        assert!(!state.is_playing);
        assert_eq!(state.current_time, 0.0);
        assert_eq!(state.volume, 0.7);
        assert_eq!(state.timestamp, 1_000);
    }

    #[test]
    fn test_update_skips_sender() {
        let mut worker = CoordinationWorker::new(0.7, WINDOW, 0);
        let (a, rx_a) = client(&mut worker);
        let (_b, rx_b) = client(&mut worker);
        let (_c, rx_c) = client(&mut worker);

        let delivered = worker.handle_update(a, &pause_at(10.0), 50);

        assert_eq!(delivered, 2);
        assert!(rx_a.try_recv().is_err());
        for rx in [rx_b, rx_c] {
            let WorkerMessage::AudioStateSync(patch) = rx.try_recv().unwrap();
            assert_eq!(patch.is_playing, Some(false));
            assert_eq!(patch.current_time, Some(10.0));
        }
    }

    #[test]
    fn test_update_is_restamped_by_worker() {
        let mut worker = CoordinationWorker::new(0.7, WINDOW, 0);
        let (a, _rx) = client(&mut worker);
        worker.handle_update(a, &pause_at(1.0), 5_000);
        assert_eq!(worker.canonical().timestamp, 5_000);
        worker.handle_update(a, &pause_at(2.0), 5_000);
        assert_eq!(worker.canonical().timestamp, 5_001);
    }

    #[test]
    fn test_partial_update_keeps_other_fields() {
        let mut worker = CoordinationWorker::new(0.7, WINDOW, 0);
        let (a, _rx) = client(&mut worker);
        worker.handle_update(a, &pause_at(30.0), 10);
        worker.handle_update(
            a,
            &StatePatch {
                volume: Some(-2.0),
                ..Default::default()
            },
            20,
        );
        let state = worker.canonical();
        assert_eq!(state.current_time, 30.0);
        assert_eq!(state.volume, 0.0);
    }

    #[test]
    fn test_closed_endpoints_are_pruned() {
        let mut worker = CoordinationWorker::new(0.7, WINDOW, 0);
        let (a, _rx_a) = client(&mut worker);
        let (b, rx_b) = client(&mut worker);
        drop(rx_b);

        assert_eq!(worker.handle_update(a, &pause_at(1.0), 1), 0);
        assert!(!worker.is_connected(b));
        assert_eq!(worker.client_count(), 1);
    }

    #[test]
    fn test_query_replies_privately() {
        let mut worker = CoordinationWorker::new(0.7, WINDOW, 0);
        let (a, rx_a) = client(&mut worker);
        let (b, rx_b) = client(&mut worker);
        worker.handle_update(a, &pause_at(12.0), 100);
        let _ = rx_b.try_recv();

        let (port, mut reply) = reply_port();
        worker.handle_message(b, ControllerMessage::GetAudioState, Some(port), 200);

        let state = reply.try_recv().unwrap().unwrap();
        assert_eq!(state.current_time, 12.0);
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_query_without_port_is_ignored() {
        let mut worker = CoordinationWorker::new(0.7, WINDOW, 0);
        let (a, _rx) = client(&mut worker);
        let before = *worker.canonical();
        worker.handle_message(a, ControllerMessage::GetAudioState, None, 10);
        assert_eq!(*worker.canonical(), before);
    }

    #[test]
    fn test_sweep_resets_stale_state() {
        let mut worker = CoordinationWorker::new(0.7, WINDOW, 0);
        let (a, _rx) = client(&mut worker);
        worker.handle_update(
            a,
            &StatePatch {
                is_playing: Some(true),
                current_time: Some(90.0),
                volume: Some(0.2),
                timestamp: None,
            },
            1_000,
        );

        assert!(!worker.sweep(1_000 + WINDOW));
        assert!(worker.canonical().is_playing);

        assert!(worker.sweep(1_001 + WINDOW));
        let state = worker.canonical();
        assert!(!state.is_playing);
        assert_eq!(state.current_time, 0.0);
        assert_eq!(state.volume, 0.7);
        assert_eq!(state.timestamp, 1_001 + WINDOW);
        assert!(!worker.has_received());
    }

    #[test]
    fn test_idle_placeholder_is_not_offered() {
        let mut worker = CoordinationWorker::new(0.7, WINDOW, 0);
        let (a, _rx) = client(&mut worker);

        let (port, mut reply) = reply_port();
        worker.handle_query(port);
        assert_eq!(reply.try_recv().unwrap(), None);

        worker.handle_update(a, &pause_at(4.0), 10);
        let (port, mut reply) = reply_port();
        worker.handle_query(port);
        assert_eq!(reply.try_recv().unwrap().map(|s| s.current_time), Some(4.0));
    }
}
