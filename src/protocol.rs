//! Messages exchanged between page controllers and the coordination worker.
//!
//! The JSON shape is `{"type": "...", ...fields}` with camelCase field names,
//! so a message can cross any string-based boundary unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::core::state::{PlaybackState, StatePatch};

/// Identity of one connected controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell tabs apart in logs
        let id = self.0.simple().to_string();
        f.write_str(&id[..8])
    }
}

/// Controller → worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControllerMessage {
    /// Ask for the canonical state; answered on the reply port only
    #[serde(rename = "GET_AUDIO_STATE")]
    GetAudioState,
    #[serde(rename = "AUDIO_STATE_UPDATE")]
    AudioStateUpdate(StatePatch),
}

impl ControllerMessage {
    pub fn update(state: PlaybackState) -> Self {
        ControllerMessage::AudioStateUpdate(state.into())
    }
}

/// Worker → controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerMessage {
    #[serde(rename = "AUDIO_STATE_SYNC")]
    AudioStateSync(StatePatch),
}

impl WorkerMessage {
    pub fn sync(state: PlaybackState) -> Self {
        WorkerMessage::AudioStateSync(state.into())
    }
}

/// Private point-to-point channel carried alongside a query.
///
/// `None` means the worker has not received any state since it started or
/// last expired its snapshot; its idle placeholder is not worth adopting.
pub type ReplyPort = oneshot::Sender<Option<PlaybackState>>;

/// Receiving end of a [`ReplyPort`]
pub type ReplyReceiver = oneshot::Receiver<Option<PlaybackState>>;

/// Create a reply port pair for one query
pub fn reply_port() -> (ReplyPort, ReplyReceiver) {
    oneshot::channel()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_wire_format() {
        let encoded = serde_json::to_value(ControllerMessage::GetAudioState).unwrap();
        assert_eq!(encoded, json!({ "type": "GET_AUDIO_STATE" }));
    }

    #[test]
    fn test_update_wire_format() {
        let msg = ControllerMessage::update(PlaybackState::new(true, 3.5, 0.25, 99));
        let encoded = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            encoded,
            json!({
                "type": "AUDIO_STATE_UPDATE",
                "isPlaying": true,
                "currentTime": 3.5,
                "volume": 0.25,
                "timestamp": 99,
            })
        );
    }

    #[test]
    fn test_decode_sync_from_json() {
        let raw = r#"{"type":"AUDIO_STATE_SYNC","isPlaying":false,"currentTime":10.0}"#;
        let WorkerMessage::AudioStateSync(patch) = serde_json::from_str(raw).unwrap();
        assert_eq!(patch.is_playing, Some(false));
        assert_eq!(patch.current_time, Some(10.0));
        assert_eq!(patch.volume, None);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let raw = r#"{"type":"SOMETHING_ELSE"}"#;
        assert!(serde_json::from_str::<ControllerMessage>(raw).is_err());
    }

    #[test]
    fn test_reply_port_delivers_once() {
        let (port, mut rx) = reply_port();
        let state = PlaybackState::idle(0.7, 5);
        port.send(Some(state)).unwrap();
        assert_eq!(rx.try_recv().unwrap(), Some(state));
    }

    #[test]
    fn test_client_ids_are_distinct() {
        let a = ClientId::new();
        let b = ClientId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string().len(), 8);
    }
}
