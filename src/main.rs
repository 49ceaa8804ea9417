//! Two-tab walkthrough: tab A plays and pauses, tab B follows through the
//! coordination worker without reloading.
//!
//! Usage: `tabsync-demo [config.json]`

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing_subscriber::EnvFilter;

use tabsync_audio::core::time::{format_position, Clock, ManualClock, SystemClock};
use tabsync_audio::media::{Document, MediaElement};
use tabsync_audio::worker::{CacheStorage, StaticNetwork};
use tabsync_audio::{MemoryStore, PageEvent, PlaybackController, SyncConfig, WorkerRuntime};

const TRACK_SECONDS: f64 = 240.0;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => SyncConfig::load(&path)?,
        None => SyncConfig::default(),
    };

    // Start from wall time, then step deterministically
    let clock = ManualClock::new(SystemClock.now_millis());
    let store = MemoryStore::new();
    let network = StaticNetwork::new().with_resource(&config.audio_url, vec![0u8; 1024]);
    let worker = WorkerRuntime::register(
        &config,
        CacheStorage::new(),
        Arc::new(network),
        Arc::new(clock.clone()),
    )?;
    tracing::info!(outcome = ?worker.fetch(&config.audio_url)?, "audio request served");

    let mut tab_a = Document::with_track_duration(TRACK_SECONDS);
    let mut tab_b = Document::with_track_duration(TRACK_SECONDS);
    let mut a = PlaybackController::initialize(
        &mut tab_a,
        Arc::new(store.clone()),
        Arc::new(clock.clone()),
        config.clone(),
        Some(&worker),
    );
    let mut b = PlaybackController::initialize(
        &mut tab_b,
        Arc::new(store.clone()),
        Arc::new(clock.clone()),
        config.clone(),
        Some(&worker),
    );

    for doc in [&tab_a, &tab_b] {
        if let Some(media) = doc.media(&config.media_element_id) {
            media.set_ready();
        }
    }
    a.pump();
    b.pump();

    a.handle_page_event(PageEvent::ControlClicked);
    wait_for(&mut b, |c| c.is_playing());
    // Let tab B's echo of the play reach tab A before A moves on
    worker.canonical_state()?;
    a.pump();
    tracing::info!(a = a.is_playing(), b = b.is_playing(), "tab A started playback");

    if let Some(media) = tab_a.media(&config.media_element_id) {
        media.advance(10.0);
    }
    a.pump();
    clock.advance(10_000);

    a.handle_page_event(PageEvent::ControlClicked);
    tracing::info!(at = %format_position(a.current_time()), "tab A paused");

    b.handle_page_event(PageEvent::Focus);
    if !wait_for(&mut b, |c| !c.is_playing()) {
        tracing::warn!("tab B did not follow the pause");
    }
    tracing::info!(
        playing = b.is_playing(),
        at = %format_position(b.current_time()),
        volume = b.volume(),
        paused = b.media().is_paused(),
        "tab B state"
    );

    a.teardown();
    b.teardown();
    worker.shutdown();
    Ok(())
}

/// Pump `controller` until `done` holds or a second passes
fn wait_for(
    controller: &mut PlaybackController<Document>,
    done: impl Fn(&PlaybackController<Document>) -> bool,
) -> bool {
    let deadline = Instant::now() + Duration::from_secs(1);
    loop {
        controller.pump();
        if done(controller) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}
