use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::relay::RoutingTable;

#[derive(Debug, Clone)]
pub struct Config {
    pub http: HttpConfig,
    pub mqtt: MqttConfig,
    pub routes: RoutingTable,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub listen_addr: SocketAddr,
    /// Timeout for outbound GETs to relay devices.
    pub device_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Always empty or ending in `/`.
    pub topic_prefix: String,
    pub client_id: String,
    pub keep_alive_secs: u64,
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let listen = env_or_default("HTTP_LISTEN_ADDR", "0.0.0.0:8773".to_string());
        let listen_addr: SocketAddr = listen
            .parse()
            .map_err(|e| format!("HTTP_LISTEN_ADDR {listen:?} is not a socket address: {e}"))?;

        let routes = match env_optional("ROUTES_FILE") {
            Some(path) => load_routes(&path)?,
            None => RoutingTable::builtin(),
        };

        let mut client_id = env_or_default("MQTT_CLIENT_ID", "shelly-to-mqtt".to_string());
        if let Some(hostname) = env_optional("HOSTNAME") {
            client_id = format!("{client_id}@{hostname}");
        }

        let config = Self {
            http: HttpConfig {
                listen_addr,
                device_timeout: Duration::from_secs(env_or_default(
                    "DEVICE_REQUEST_TIMEOUT_SECS",
                    10,
                )),
            },
            mqtt: MqttConfig {
                broker_host: env_or_default("MQTT_BROKER_HOST", "dr.lan".to_string()),
                broker_port: env_or_default("MQTT_BROKER_PORT", 1883),
                username: env_optional("MQTT_USERNAME"),
                password: env_optional("MQTT_PASSWORD"),
                topic_prefix: normalize_prefix(&env_or_default(
                    "MQTT_TOPIC_PREFIX",
                    "shelly-to-mqtt/".to_string(),
                )),
                client_id,
                keep_alive_secs: env_or_default("MQTT_KEEP_ALIVE_SECS", 30),
            },
            routes,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.mqtt.broker_host.is_empty() {
            return Err("MQTT_BROKER_HOST must not be empty".into());
        }
        if self.mqtt.keep_alive_secs == 0 {
            return Err("MQTT_KEEP_ALIVE_SECS must be > 0".into());
        }
        if self.http.device_timeout.is_zero() {
            return Err("DEVICE_REQUEST_TIMEOUT_SECS must be > 0".into());
        }
        self.routes.validate()
    }
}

/// Topics are built by plain concatenation, so the prefix must end in `/`.
fn normalize_prefix(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    }
}

fn load_routes(path: &str) -> Result<RoutingTable, String> {
    let content =
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read {path}: {e}"))?;
    parse_routes(&content).map_err(|e| format!("Failed to parse {path}: {e}"))
}

/// Routes file shape: `{"bathroom": "http://10.0.0.68/relay/0?turn=", "kitchen": null}`.
fn parse_routes(content: &str) -> Result<RoutingTable, serde_json::Error> {
    let raw: HashMap<String, Option<String>> = serde_json::from_str(content)?;
    Ok(RoutingTable::new(raw))
}
