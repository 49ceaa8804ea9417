//! Named resource caches and the audio fetch path.
//!
//! Install pre-fetches the track, activate drops caches left behind by older
//! worker versions, and requests for the track are answered cache-first.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::core::config::SyncConfig;

/// Error type for network fetches
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Network unavailable")]
    Offline,
}

/// Error type for cache operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CacheError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),
}

/// Outbound network access
pub trait Network: Send + Sync + fmt::Debug {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Fixed set of resources served from memory, with an offline switch
#[derive(Debug, Clone, Default)]
pub struct StaticNetwork {
    resources: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    offline: Arc<AtomicBool>,
    requests: Arc<AtomicUsize>,
}

impl StaticNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.resources.write().insert(url.to_string(), body.into());
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Requests seen so far, failed ones included
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Network for StaticNetwork {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Offline);
        }
        self.resources
            .read()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }
}

/// Named caches of url → body. Clones share storage, which outlives any
/// single worker version.
#[derive(Debug, Clone, Default)]
pub struct CacheStorage {
    caches: Arc<RwLock<BTreeMap<String, BTreeMap<String, Vec<u8>>>>>,
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the named cache if missing
    pub fn open(&self, name: &str) {
        self.caches.write().entry(name.to_string()).or_default();
    }

    pub fn put(&self, name: &str, url: &str, body: Vec<u8>) {
        self.caches
            .write()
            .entry(name.to_string())
            .or_default()
            .insert(url.to_string(), body);
    }

    /// Look a url up across every cache, oldest name first
    pub fn match_url(&self, url: &str) -> Option<Vec<u8>> {
        self.caches
            .read()
            .values()
            .find_map(|cache| cache.get(url).cloned())
    }

    pub fn keys(&self) -> Vec<String> {
        self.caches.read().keys().cloned().collect()
    }

    pub fn delete(&self, name: &str) -> bool {
        self.caches.write().remove(name).is_some()
    }
}

/// How a fetch was answered
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Cached(Vec<u8>),
    Network(Vec<u8>),
    /// Not ours to intercept; the request goes out untouched
    Passthrough,
}

/// Install/activate/fetch handling for the audio resource
#[derive(Debug, Clone)]
pub struct ResourceCache {
    storage: CacheStorage,
    network: Arc<dyn Network>,
    cache_name: String,
    audio_cache_name: String,
    audio_url: String,
    audio_file_name: String,
}

impl ResourceCache {
    pub fn new(config: &SyncConfig, storage: CacheStorage, network: Arc<dyn Network>) -> Self {
        Self {
            storage,
            network,
            cache_name: config.cache_name.clone(),
            audio_cache_name: config.audio_cache_name.clone(),
            audio_url: config.audio_url.clone(),
            audio_file_name: config.audio_file_name().to_string(),
        }
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    /// Pre-fetch the audio track into the audio cache
    pub fn install(&self) -> Result<(), CacheError> {
        self.storage.open(&self.audio_cache_name);
        let body = self.network.fetch(&self.audio_url)?;
        tracing::info!(url = %self.audio_url, bytes = body.len(), "audio resource cached");
        self.storage.put(&self.audio_cache_name, &self.audio_url, body);
        Ok(())
    }

    /// Delete every cache not named by the current version. Returns the
    /// deleted names.
    pub fn activate(&self) -> Vec<String> {
        let stale: Vec<String> = self
            .storage
            .keys()
            .into_iter()
            .filter(|name| *name != self.cache_name && *name != self.audio_cache_name)
            .collect();
        for name in &stale {
            self.storage.delete(name);
            tracing::info!(cache = %name, "purged stale cache");
        }
        stale
    }

    /// Answer a request: cache first for the audio track, network otherwise
    /// (storing the body for next time). Other urls pass through.
    pub fn handle_fetch(&self, url: &str) -> Result<FetchOutcome, CacheError> {
        if !url.contains(&self.audio_file_name) {
            return Ok(FetchOutcome::Passthrough);
        }

        if let Some(body) = self
            .storage
            .match_url(url)
            .or_else(|| self.storage.match_url(&self.audio_url))
        {
            return Ok(FetchOutcome::Cached(body));
        }

        let body = self.network.fetch(url)?;
        self.storage.put(&self.audio_cache_name, &self.audio_url, body.clone());
        Ok(FetchOutcome::Network(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACK: &[u8] = b"ID3-track-bytes";

    fn setup() -> (SyncConfig, StaticNetwork, ResourceCache) {
        let config = SyncConfig::default();
        let network = StaticNetwork::new().with_resource(&config.audio_url, TRACK);
        let cache = ResourceCache::new(&config, CacheStorage::new(), Arc::new(network.clone()));
        (config, network, cache)
    }

    #[test]
    fn test_install_caches_audio() {
        let (config, _network, cache) = setup();
        cache.install().unwrap();
        assert_eq!(cache.storage().match_url(&config.audio_url).as_deref(), Some(TRACK));
        assert_eq!(cache.storage().keys(), vec![config.audio_cache_name.clone()]);
    }

    #[test]
    fn test_install_fails_offline() {
        let (_config, network, cache) = setup();
        network.set_offline(true);
        assert_eq!(cache.install(), Err(CacheError::Fetch(FetchError::Offline)));
    }

    #[test]
    fn test_activate_purges_old_versions() {
        let (config, _network, cache) = setup();
        cache.storage().open("fislab-audio-v0");
        cache.storage().open("fislab-audio-cache-v0");
        cache.storage().open(&config.cache_name);
        cache.install().unwrap();

        let mut purged = cache.activate();
        purged.sort();
        assert_eq!(purged, vec!["fislab-audio-cache-v0", "fislab-audio-v0"]);

        let mut kept = cache.storage().keys();
        kept.sort();
        assert_eq!(kept, vec![config.audio_cache_name, config.cache_name]);
    }

    #[test]
    fn test_fetch_prefers_cache() {
        let (config, network, cache) = setup();
        cache.install().unwrap();
        let before = network.requests();

        let outcome = cache
            .handle_fetch(&format!("https://example.org/{}", config.audio_url))
            .unwrap();
        assert_eq!(outcome, FetchOutcome::Cached(TRACK.to_vec()));
        assert_eq!(network.requests(), before);
    }

    #[test]
    fn test_fetch_falls_back_to_network_and_caches() {
        let (config, network, cache) = setup();

        assert_eq!(
            cache.handle_fetch(&config.audio_url).unwrap(),
            FetchOutcome::Network(TRACK.to_vec())
        );
        assert_eq!(
            cache.handle_fetch(&config.audio_url).unwrap(),
            FetchOutcome::Cached(TRACK.to_vec())
        );
        assert_eq!(network.requests(), 1);
    }

    #[test]
    fn test_other_urls_pass_through() {
        let (_config, network, cache) = setup();
        assert_eq!(cache.handle_fetch("style.css").unwrap(), FetchOutcome::Passthrough);
        assert_eq!(network.requests(), 0);
    }
}
