pub mod client;

use std::future::Future;

use rumqttc::{AsyncClient, QoS};

use crate::error::BridgeError;

/// An incoming publish, handed from the event loop to the relay dispatcher.
#[derive(Debug, Clone)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: String,
}

/// Publishes retained, at-most-once sensor state.
///
/// Implementations must be shareable across HTTP handler tasks and must not
/// wait on the broker: a publish that cannot be queued right away fails.
pub trait Publisher: Send + Sync + 'static {
    fn publish_retained(
        &self,
        topic: String,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), BridgeError>> + Send;
}

impl Publisher for AsyncClient {
    async fn publish_retained(&self, topic: String, payload: Vec<u8>) -> Result<(), BridgeError> {
        // The request queue only drains while the event loop is connected.
        self.try_publish(topic, QoS::AtMostOnce, true, payload)?;
        Ok(())
    }
}
