//! Per-page playback controller.
//!
//! Owns the page's media element and bridges user intent, media events, the
//! shared store and the coordination worker. It runs cooperatively: the page
//! loop feeds it [`PageEvent`]s and calls [`PlaybackController::pump`] to
//! deliver media events, worker messages and due timers.
//!
//! Nothing here is fatal. Store, media and worker failures are logged and
//! playback carries on locally.

use std::sync::Arc;
use tokio::sync::oneshot::error::TryRecvError;

use crate::core::config::{StoreKeys, SyncConfig};
use crate::core::state::{
    clamp_position, clamp_volume, PlaybackMode, PlaybackState, StatePatch,
};
use crate::core::time::{Clock, StampSequence};
use crate::media::{ControlAffordance, MediaElement, MediaEvent, MediaSource, PageHost};
use crate::playback::events::PageEvent;
use crate::playback::timers::{TimerAction, TimerHandle, TimerQueue};
use crate::protocol::{ClientId, ControllerMessage, ReplyReceiver, WorkerMessage};
use crate::store::{read_composite, read_discrete, write_position, write_snapshot, StateStore};
use crate::worker::{WorkerConnection, WorkerHandle};

pub struct PlaybackController<H: PageHost> {
    media: H::Media,
    control: H::Control,
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    keys: StoreKeys,
    worker: Option<WorkerConnection>,
    pending_query: Option<ReplyReceiver>,
    timers: TimerQueue,
    resume_timer: Option<TimerHandle>,
    restore_timer: Option<TimerHandle>,
    stamps: StampSequence,
    is_playing: bool,
    /// Set once the element has signalled it can play through
    is_initialized: bool,
    /// One-shot "play once ready" listener
    play_when_ready: bool,
    /// Last volume this controller applied; anything else came from outside
    applied_volume: f64,
}

impl<H: PageHost> PlaybackController<H> {
    /// Connect to the worker (if any), acquire the page's elements, ask the
    /// worker for its state and load what the store remembers.
    pub fn initialize(
        host: &mut H,
        store: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
        worker: Option<&WorkerHandle>,
    ) -> Self {
        let worker = match worker {
            Some(handle) => match handle.connect() {
                Ok(connection) => {
                    tracing::info!(client = %connection.id(), "connected to audio worker");
                    Some(connection)
                }
                Err(err) => {
                    tracing::warn!("audio worker unavailable, continuing without it: {err}");
                    None
                }
            },
            None => {
                tracing::info!("no audio worker, cross-tab sync limited to the store");
                None
            }
        };

        let source = MediaSource::background_track(&config);
        let mut media = host.acquire_media(&config.media_element_id, &source);
        let control = host.acquire_control(&config.control_id);

        let default_volume = clamp_volume(config.default_volume);
        media.set_volume(default_volume);
        let is_initialized = media.can_play_through();

        let mut controller = Self {
            media,
            control,
            store,
            clock,
            keys: config.store_keys(),
            config,
            worker,
            pending_query: None,
            timers: TimerQueue::new(),
            resume_timer: None,
            restore_timer: None,
            stamps: StampSequence::new(),
            is_playing: false,
            is_initialized,
            play_when_ready: false,
            applied_volume: default_volume,
        };

        controller.request_worker_state();
        controller.load_audio_state();
        controller
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// Whether the media element has signalled it can play through
    pub fn is_ready(&self) -> bool {
        self.is_initialized
    }

    pub fn current_time(&self) -> f64 {
        self.media.current_time()
    }

    pub fn volume(&self) -> f64 {
        self.media.volume()
    }

    pub fn duration(&self) -> Option<f64> {
        self.media.duration()
    }

    pub fn media(&self) -> &H::Media {
        &self.media
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.worker.as_ref().map(WorkerConnection::id)
    }

    pub fn has_worker(&self) -> bool {
        self.worker.is_some()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Current state, stamped now (without advancing this writer's sequence)
    pub fn snapshot(&self) -> PlaybackState {
        PlaybackState::new(
            self.is_playing,
            self.media.current_time(),
            self.media.volume(),
            self.clock.now_millis(),
        )
    }

    pub fn play(&mut self) {
        if !self.is_initialized {
            if !self.play_when_ready {
                tracing::debug!("media not ready, deferring play");
            }
            self.play_when_ready = true;
            return;
        }

        if let Err(err) = self.media.play() {
            tracing::warn!("audio play failed: {err}");
        }

        self.is_playing = true;
        self.control.set_playing(true);
        self.save_audio_state();
    }

    pub fn pause(&mut self) {
        let position = self.media.current_time();
        if let Err(err) = write_position(self.store.as_ref(), &self.keys, position) {
            tracing::warn!("failed to persist position on pause: {err}");
        }

        self.media.pause();
        self.is_playing = false;
        self.control.set_playing(false);
        self.save_audio_state();
    }

    pub fn toggle(&mut self) {
        if self.is_playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Set the volume, clamped to `[0, 1]`
    pub fn set_volume(&mut self, volume: f64) {
        self.apply_volume(volume);
        self.save_audio_state();
    }

    /// Jump to `seconds` (negative positions clamp to 0)
    pub fn seek_to(&mut self, seconds: f64) {
        self.media.set_current_time(clamp_position(seconds));
        self.save_audio_state();
    }

    /// Persist the current state and tell the worker about it
    pub fn save_audio_state(&mut self) {
        let state = self.capture();
        self.persist(&state);

        if let Some(worker) = &self.worker {
            if let Err(err) = worker.post(ControllerMessage::update(state)) {
                tracing::warn!("lost audio worker, continuing without it: {err}");
                self.worker = None;
                self.pending_query = None;
            }
        }
    }

    /// Re-apply the composite record if it is still fresh
    pub fn restore_audio_state(&mut self) {
        let state = match read_composite(self.store.as_ref(), &self.keys) {
            Ok(Some(state)) => state,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!("error restoring audio state: {err}");
                return;
            }
        };

        let now = self.clock.now_millis();
        if !state.is_fresh(now, self.config.freshness_window_ms) {
            tracing::debug!(age_ms = state.age(now), "saved audio state is stale, ignoring");
            return;
        }

        self.media.set_current_time(clamp_position(state.current_time));
        self.apply_volume(state.volume);

        if state.is_playing && !self.is_playing && self.is_initialized {
            self.play();
        }
    }

    /// Reconcile with state pushed by the worker.
    ///
    /// Position and volume are adopted as given; play/pause only flips when
    /// the remote flag disagrees with ours, so relayed updates don't bounce.
    pub fn sync_audio_state(&mut self, remote: &StatePatch) {
        if let Some(current_time) = remote.current_time {
            self.media.set_current_time(clamp_position(current_time));
        }
        if let Some(volume) = remote.volume {
            self.apply_volume(volume);
        }
        if let Some(is_playing) = remote.is_playing {
            if is_playing != self.is_playing {
                if is_playing {
                    self.play();
                } else {
                    self.pause();
                }
            }
        }
    }

    pub fn handle_media_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::Play => {
                self.is_playing = true;
                self.control.set_playing(true);
                self.save_audio_state();
            }
            MediaEvent::Pause | MediaEvent::Ended => {
                self.is_playing = false;
                self.control.set_playing(false);
                self.save_audio_state();
            }
            MediaEvent::TimeUpdate => {
                // Position ticks stay in the store; relaying them would make
                // every other tab seek several times a second.
                if self.is_playing {
                    let state = self.capture();
                    self.persist(&state);
                }
            }
            MediaEvent::VolumeChange => {
                let volume = self.media.volume();
                if volume != self.applied_volume {
                    self.applied_volume = volume;
                    self.save_audio_state();
                }
            }
            MediaEvent::CanPlayThrough => {
                self.is_initialized = true;
                self.restore_audio_state();
                // restore may already have resumed playback
                if std::mem::take(&mut self.play_when_ready) && !self.is_playing {
                    self.play();
                }
            }
        }
    }

    pub fn handle_page_event(&mut self, event: PageEvent) {
        match event {
            PageEvent::ControlClicked => self.toggle(),
            PageEvent::LinkClicked { .. } => {
                if event.is_outbound_navigation() {
                    self.save_audio_state();
                }
            }
            PageEvent::FormSubmitted | PageEvent::HistoryNavigated => self.save_audio_state(),
            PageEvent::VisibilityChanged { hidden: true } => self.save_audio_state(),
            PageEvent::VisibilityChanged { hidden: false } => {
                if let Some(previous) = self.restore_timer.take() {
                    self.timers.cancel(previous);
                }
                self.restore_timer = Some(self.timers.schedule(
                    self.clock.now_millis(),
                    self.config.restore_delay_ms,
                    TimerAction::RestoreState,
                ));
            }
            PageEvent::BeforeUnload | PageEvent::Blur => self.save_audio_state(),
            PageEvent::Focus => self.restore_audio_state(),
        }
    }

    /// Deliver everything that is waiting: media events, worker messages,
    /// the startup query reply and due timers. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let before = handled;

            while let Some(event) = self.media.poll_event() {
                self.handle_media_event(event);
                handled += 1;
            }
            handled += self.drain_worker();
            for action in self.timers.take_due(self.clock.now_millis()) {
                self.run_timer(action);
                handled += 1;
            }

            if handled == before {
                return handled;
            }
        }
    }

    /// Save, cancel pending timers and disconnect from the worker
    pub fn teardown(&mut self) {
        self.save_audio_state();
        let cancelled = [self.resume_timer.take(), self.restore_timer.take()]
            .into_iter()
            .flatten()
            .filter(|handle| self.timers.cancel(*handle))
            .count();
        self.play_when_ready = false;
        self.pending_query = None;
        if let Some(worker) = self.worker.take() {
            tracing::debug!(client = %worker.id(), cancelled, "controller torn down");
        }
    }

    fn capture(&mut self) -> PlaybackState {
        let stamp = self.stamps.next(self.clock.now_millis());
        PlaybackState::new(
            self.is_playing,
            self.media.current_time(),
            self.media.volume(),
            stamp,
        )
    }

    fn persist(&self, state: &PlaybackState) {
        if let Err(err) = write_snapshot(self.store.as_ref(), &self.keys, state) {
            tracing::warn!("failed to persist audio state: {err}");
        }
    }

    fn apply_volume(&mut self, volume: f64) {
        let volume = clamp_volume(volume);
        self.applied_volume = volume;
        self.media.set_volume(volume);
    }

    /// Apply the discrete keys; a saved "playing" mode resumes after a delay
    fn load_audio_state(&mut self) {
        let saved = match read_discrete(self.store.as_ref(), &self.keys) {
            Ok(saved) => saved,
            Err(err) => {
                tracing::warn!("error loading audio state: {err}");
                return;
            }
        };

        if let Some(volume) = saved.volume {
            self.apply_volume(volume);
        }
        if let Some(current_time) = saved.current_time {
            self.media.set_current_time(current_time);
        }
        if saved.mode == Some(PlaybackMode::Playing) {
            self.resume_timer = Some(self.timers.schedule(
                self.clock.now_millis(),
                self.config.resume_delay_ms,
                TimerAction::ResumePlayback,
            ));
        }
    }

    fn request_worker_state(&mut self) {
        let Some(worker) = &self.worker else {
            return;
        };
        match worker.query() {
            Ok(reply) => self.pending_query = Some(reply),
            Err(err) => {
                tracing::warn!("lost audio worker, continuing without it: {err}");
                self.worker = None;
            }
        }
    }

    fn drain_worker(&mut self) -> usize {
        let mut handled = 0;

        if let Some(reply) = self.pending_query.as_mut() {
            match reply.try_recv() {
                Ok(reply) => {
                    self.pending_query = None;
                    match reply {
                        Some(state) => self.adopt_worker_state(state),
                        None => tracing::debug!("worker has no state yet, keeping the store's"),
                    }
                    handled += 1;
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Closed) => self.pending_query = None,
            }
        }

        loop {
            let Some(message) = self.worker.as_ref().and_then(WorkerConnection::try_recv) else {
                return handled;
            };
            let WorkerMessage::AudioStateSync(patch) = message;
            self.sync_audio_state(&patch);
            handled += 1;
        }
    }

    /// Adopt the worker's answer to the startup query, but only when it is
    /// fresh and newer than what this origin's store already holds.
    fn adopt_worker_state(&mut self, state: PlaybackState) {
        let now = self.clock.now_millis();
        if !state.is_fresh(now, self.config.freshness_window_ms) {
            return;
        }
        let local = read_composite(self.store.as_ref(), &self.keys).ok().flatten();
        if local.is_some_and(|local| local.timestamp >= state.timestamp) {
            tracing::debug!("store is at least as recent as the worker, keeping it");
            return;
        }
        self.sync_audio_state(&state.into());
    }

    fn run_timer(&mut self, action: TimerAction) {
        match action {
            TimerAction::ResumePlayback => {
                self.resume_timer = None;
                self.play();
            }
            TimerAction::RestoreState => {
                self.restore_timer = None;
                self.restore_audio_state();
            }
        }
    }
}
