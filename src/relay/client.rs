use std::future::Future;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::BridgeError;
use crate::mqtt::MqttMessage;

use super::{RelayCommand, RoutingTable};

/// Issues the outbound GET that flips a relay.
pub trait DeviceClient: Send + Sync {
    /// Succeeds only on a 2xx response.
    fn get(&self, url: &str) -> impl Future<Output = Result<(), BridgeError>> + Send;
}

#[derive(Clone)]
pub struct HttpDeviceClient {
    client: reqwest::Client,
}

impl HttpDeviceClient {
    pub fn new(timeout: Duration) -> Result<Self, BridgeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl DeviceClient for HttpDeviceClient {
    async fn get(&self, url: &str) -> Result<(), BridgeError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        debug!("GET {} -> {}", url, status);
        if !status.is_success() {
            return Err(BridgeError::DeviceStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(())
    }
}

/// Turn one command message into at most one device request.
///
/// Returns the URL that was requested. Malformed topics and unmapped rooms
/// fail before any request is made.
pub async fn dispatch<C: DeviceClient>(
    client: &C,
    routes: &RoutingTable,
    topic_prefix: &str,
    msg: &MqttMessage,
) -> Result<String, BridgeError> {
    let cmd = RelayCommand::from_topic(&msg.topic, topic_prefix)?;
    let url = cmd.device_url(routes)?;
    info!("Relay {} -> {}", cmd.room, cmd.command);
    client.get(&url).await?;
    Ok(url)
}
