use thiserror::Error;

/// Everything that can go wrong while translating a single request or message.
///
/// None of these stop the process once it is running; the caller logs and
/// drops. Only the initial broker connection in `main` is fatal.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("malformed address {path:?}: expected <room>/<command>")]
    MalformedAddress { path: String },

    #[error("no device configured for room {room:?}")]
    UnroutableRoom { room: String },

    #[error("failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("MQTT publish failed: {0}")]
    Publish(#[from] rumqttc::ClientError),

    #[error("MQTT connection failed: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    #[error("device request failed: {0}")]
    Device(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    DeviceStatus { status: u16, url: String },
}

impl BridgeError {
    /// Only a failed initial broker connection stops the bridge. Steady-state
    /// reconnects are handled inside the event loop and never surface here.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BridgeError::Connection(_))
    }
}
