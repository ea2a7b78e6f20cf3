use std::fmt;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::MqttConfig;
use crate::error::BridgeError;
use crate::topic;

use super::MqttMessage;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Subscribed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Subscribed => write!(f, "subscribed"),
        }
    }
}

pub struct MqttClient {
    client: AsyncClient,
    eventloop: EventLoop,
    command_filter: String,
    state: ConnectionState,
}

impl MqttClient {
    pub fn new(config: &MqttConfig) -> Self {
        let mut mqttopts =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        mqttopts.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            mqttopts.set_credentials(user, pass);
        }

        let (client, eventloop) = AsyncClient::new(mqttopts, 100);

        Self {
            client,
            eventloop,
            command_filter: topic::command_filter(&config.topic_prefix),
            state: ConnectionState::Disconnected,
        }
    }

    /// Cloneable handle for publishing from other tasks.
    pub fn handle(&self) -> AsyncClient {
        self.client.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Drive the event loop until the broker accepts the first connection.
    ///
    /// Any error before the first ConnAck is returned; startup treats it as fatal.
    pub async fn connect(&mut self) -> Result<(), BridgeError> {
        self.transition(ConnectionState::Connecting);
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    self.on_connected();
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => {
                    self.transition(ConnectionState::Disconnected);
                    return Err(e.into());
                }
            }
        }
    }

    /// Run the MQTT event loop. Re-subscribes on every ConnAck and forwards
    /// incoming publishes through `command_tx`. rumqttc reconnects on the
    /// next poll after an error.
    pub async fn run(mut self, command_tx: mpsc::Sender<MqttMessage>) {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    self.on_connected();
                }
                Ok(Event::Incoming(Incoming::Publish(publish))) => {
                    let msg = MqttMessage {
                        topic: publish.topic.clone(),
                        payload: String::from_utf8_lossy(&publish.payload).to_string(),
                    };
                    info!("mqtt: {}: {:?}", msg.topic, msg.payload);
                    if command_tx.send(msg).await.is_err() {
                        warn!("Command channel closed");
                    }
                }
                Ok(Event::Incoming(Incoming::SubAck(ack))) => {
                    debug!("SubAck {:?}", ack.return_codes);
                }
                Ok(_) => {}
                Err(e) => {
                    error!("MQTT connection error: {}. Reconnecting...", e);
                    self.transition(ConnectionState::Disconnected);
                    tokio::time::sleep(RECONNECT_DELAY).await;
                    self.transition(ConnectionState::Connecting);
                }
            }
        }
    }

    /// Queues the command subscription without waiting; a full request queue
    /// is logged and retried on the next ConnAck.
    fn on_connected(&mut self) {
        info!("Connected to MQTT broker");
        info!("Subscribing to {}", self.command_filter);
        match self
            .client
            .try_subscribe(&self.command_filter, QoS::AtMostOnce)
        {
            Ok(()) => self.transition(ConnectionState::Subscribed),
            Err(e) => error!("Failed to subscribe to {}: {}", self.command_filter, e),
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            info!("MQTT {} -> {}", self.state, next);
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(port: u16) -> MqttConfig {
        MqttConfig {
            broker_host: "127.0.0.1".into(),
            broker_port: port,
            username: None,
            password: None,
            topic_prefix: "home/".into(),
            client_id: "test".into(),
            keep_alive_secs: 30,
        }
    }

    #[tokio::test]
    async fn starts_disconnected_with_command_filter() {
        let client = MqttClient::new(&config(1883));
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(client.command_filter, "home/cmd/relay/#");
    }

    #[tokio::test]
    async fn initial_connect_failure_is_reported() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut client = MqttClient::new(&config(port));
        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, BridgeError::Connection(_)));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn subscribe_does_not_wait_on_full_queue() {
        let mut client = MqttClient::new(&config(1883));
        let handle = client.handle();
        while handle
            .try_publish("home/door/x", QoS::AtMostOnce, true, "{}")
            .is_ok()
        {}

        client.on_connected();
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }
}
