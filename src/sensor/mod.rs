pub mod server;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::BridgeError;
use crate::mqtt::Publisher;
use crate::topic::{self, Category};

/// Sensor classes that post webhooks to the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Door,
    Motion,
}

#[derive(Serialize)]
struct DoorPayload {
    onoff: bool,
}

#[derive(Serialize)]
struct MotionPayload<'a> {
    command: &'a str,
}

impl SensorKind {
    pub fn category(self) -> Category {
        match self {
            SensorKind::Door => Category::Door,
            SensorKind::Motion => Category::Motion,
        }
    }

    /// URL path prefix the webhook arrives on, e.g. `/door/`.
    pub fn url_prefix(self) -> &'static str {
        match self {
            SensorKind::Door => "/door/",
            SensorKind::Motion => "/motion/",
        }
    }

    /// JSON body published for `command`.
    ///
    /// Door sensors report "off" when the door opens, and consumers expect
    /// `onoff: true` for an open door, so the flag is inverted here. Keep it
    /// that way until every consumer has switched over.
    pub fn payload(self, command: &str) -> Result<Vec<u8>, BridgeError> {
        let body = match self {
            SensorKind::Door => serde_json::to_vec(&DoorPayload {
                onoff: command == "off",
            })?,
            SensorKind::Motion => serde_json::to_vec(&MotionPayload { command })?,
        };
        Ok(body)
    }
}

/// One parsed webhook call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorEvent<'a> {
    pub kind: SensorKind,
    pub room: &'a str,
    pub command: &'a str,
}

impl<'a> SensorEvent<'a> {
    pub fn from_path(kind: SensorKind, path: &'a str) -> Result<Self, BridgeError> {
        let (room, command) = topic::parse_suffix(path, kind.url_prefix())?;
        Ok(Self {
            kind,
            room,
            command,
        })
    }

    pub fn topic(&self, prefix: &str) -> String {
        topic::state_topic(prefix, self.kind.category(), self.room)
    }

    /// Publish this event retained at QoS 0.
    ///
    /// Only a serialization failure is returned. A failed publish is logged
    /// and reported as `Ok(false)`; the webhook caller never learns about it.
    pub async fn publish<P: Publisher>(
        &self,
        publisher: &P,
        prefix: &str,
    ) -> Result<bool, BridgeError> {
        let payload = self.kind.payload(self.command)?;
        let topic = self.topic(prefix);
        match publisher.publish_retained(topic.clone(), payload).await {
            Ok(()) => {
                info!("published to MQTT: {}", topic);
                Ok(true)
            }
            Err(e) => {
                warn!("Failed to publish {}: {}", topic, e);
                Ok(false)
            }
        }
    }
}
