//! Reading and writing playback snapshots under the four store keys.
//!
//! A write touches the mode flag, the raw position, the raw volume and the
//! composite JSON record. Only the composite record carries a timestamp, so
//! restore paths read it alone; the discrete keys serve the initial load.

use crate::core::config::StoreKeys;
use crate::core::state::{clamp_position, clamp_volume, PlaybackMode, PlaybackState};
use crate::store::{StateStore, StoreError};

/// Discrete keys as found in the store. Unparsable values read as absent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DiscreteState {
    pub mode: Option<PlaybackMode>,
    pub current_time: Option<f64>,
    pub volume: Option<f64>,
}

/// Write all four keys for `state`
pub fn write_snapshot(
    store: &dyn StateStore,
    keys: &StoreKeys,
    state: &PlaybackState,
) -> Result<(), StoreError> {
    let composite = serde_json::to_string(state).map_err(StoreError::Encode)?;

    store.set(&keys.mode, state.mode().as_str())?;
    store.set(&keys.time, &state.current_time.to_string())?;
    store.set(&keys.volume, &state.volume.to_string())?;
    store.set(&keys.state, &composite)?;
    Ok(())
}

/// Write only the raw position key
pub fn write_position(
    store: &dyn StateStore,
    keys: &StoreKeys,
    seconds: f64,
) -> Result<(), StoreError> {
    store.set(&keys.time, &clamp_position(seconds).to_string())
}

/// Read the composite record, if any
pub fn read_composite(
    store: &dyn StateStore,
    keys: &StoreKeys,
) -> Result<Option<PlaybackState>, StoreError> {
    let Some(raw) = store.get(&keys.state)? else {
        return Ok(None);
    };

    let state: PlaybackState =
        serde_json::from_str(&raw).map_err(|source| StoreError::Malformed {
            key: keys.state.clone(),
            source,
        })?;
    Ok(Some(state))
}

/// Read the mode, position and volume keys
pub fn read_discrete(
    store: &dyn StateStore,
    keys: &StoreKeys,
) -> Result<DiscreteState, StoreError> {
    let mode = store.get(&keys.mode)?.and_then(|raw| match raw.parse() {
        Ok(mode) => Some(mode),
        Err(err) => {
            tracing::warn!(key = %keys.mode, "ignoring stored mode: {err}");
            None
        }
    });
    let current_time = parse_float(&keys.time, store.get(&keys.time)?).map(clamp_position);
    let volume = parse_float(&keys.volume, store.get(&keys.volume)?).map(clamp_volume);

    Ok(DiscreteState {
        mode,
        current_time,
        volume,
    })
}

fn parse_float(key: &str, raw: Option<String>) -> Option<f64> {
    let raw = raw?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        _ => {
            tracing::warn!(key, value = %raw, "ignoring unparsable stored number");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_write_snapshot_sets_all_keys() {
        let store = MemoryStore::new();
        let keys = StoreKeys::default();
        let state = PlaybackState::new(true, 42.5, 0.3, 1_000);

        write_snapshot(&store, &keys, &state).unwrap();

        assert_eq!(store.get("fislab-audio").unwrap().as_deref(), Some("playing"));
        assert_eq!(store.get("fislab-audio-time").unwrap().as_deref(), Some("42.5"));
        assert_eq!(store.get("fislab-audio-volume").unwrap().as_deref(), Some("0.3"));
        assert_eq!(read_composite(&store, &keys).unwrap(), Some(state));
    }

    #[test]
    fn test_read_composite_missing() {
        let store = MemoryStore::new();
        assert_eq!(read_composite(&store, &StoreKeys::default()).unwrap(), None);
    }

    #[test]
    fn test_read_composite_malformed() {
        let store = MemoryStore::from_pairs([("fislab-audio-state", "{\"isPlaying\": tru")]);
        let err = read_composite(&store, &StoreKeys::default()).unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));
    }

    #[test]
    fn test_read_composite_written_by_a_browser() {
        let store = MemoryStore::from_pairs([(
            "fislab-audio-state",
            r#"{"isPlaying":false,"currentTime":10.25,"volume":0.7,"timestamp":1700000000000}"#,
        )]);
        let state = read_composite(&store, &StoreKeys::default()).unwrap().unwrap();
        assert!(!state.is_playing);
        assert_eq!(state.current_time, 10.25);
        assert_eq!(state.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn test_read_discrete() {
        let store = MemoryStore::from_pairs([
            ("fislab-audio", "playing"),
            ("fislab-audio-time", "42.5"),
            ("fislab-audio-volume", "0.3"),
        ]);
        let discrete = read_discrete(&store, &StoreKeys::default()).unwrap();
        assert_eq!(
            discrete,
            DiscreteState {
                mode: Some(PlaybackMode::Playing),
                current_time: Some(42.5),
                volume: Some(0.3),
            }
        );
    }

    #[test]
    fn test_read_discrete_ignores_garbage() {
        let store = MemoryStore::from_pairs([
            ("fislab-audio", "maybe"),
            ("fislab-audio-time", "NaN"),
            ("fislab-audio-volume", ""),
        ]);
        let discrete = read_discrete(&store, &StoreKeys::default()).unwrap();
        assert_eq!(discrete, DiscreteState::default());
    }

    #[test]
    fn test_read_discrete_clamps_volume() {
        let store = MemoryStore::from_pairs([("fislab-audio-volume", "4")]);
        let discrete = read_discrete(&store, &StoreKeys::default()).unwrap();
        assert_eq!(discrete.volume, Some(1.0));
    }

    #[test]
    fn test_write_position_only() {
        let store = MemoryStore::new();
        write_position(&store, &StoreKeys::default(), 7.5).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("fislab-audio-time").unwrap().as_deref(), Some("7.5"));
    }
}
