pub mod client;

use std::collections::HashMap;

use crate::error::BridgeError;
use crate::topic::{self, Category};

/// Where a relay command for a room ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayTarget {
    Ignored,
    /// Base URL; the command is appended verbatim, e.g. `http://10.0.0.68/relay/0?turn=`.
    Device(String),
}

/// Static room → device endpoint table. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: HashMap<String, Option<String>>,
}

impl RoutingTable {
    /// `None` marks a room that is known but deliberately not wired to a device.
    pub fn new(routes: HashMap<String, Option<String>>) -> Self {
        Self { routes }
    }

    pub fn builtin() -> Self {
        Self::default()
            .with_device("bathroom", "http://10.0.0.68/relay/0?turn=")
            .with_ignored("kitchen")
    }

    pub fn with_device(mut self, room: &str, base_url: &str) -> Self {
        self.routes
            .insert(room.to_string(), Some(base_url.to_string()));
        self
    }

    pub fn with_ignored(mut self, room: &str) -> Self {
        self.routes.insert(room.to_string(), None);
        self
    }

    pub fn route(&self, room: &str) -> RelayTarget {
        match self.routes.get(room) {
            Some(Some(base_url)) => RelayTarget::Device(base_url.clone()),
            _ => RelayTarget::Ignored,
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn validate(&self) -> Result<(), String> {
        for (room, base_url) in &self.routes {
            if room.is_empty() || room.contains('/') {
                return Err(format!("Invalid room name in routes: {room:?}"));
            }
            if let Some(url) = base_url {
                let host = url
                    .strip_prefix("http://")
                    .or_else(|| url.strip_prefix("https://"));
                if host.is_none_or(str::is_empty) {
                    return Err(format!("Room {room}: invalid device URL {url:?}"));
                }
            }
        }
        Ok(())
    }
}

/// A (room, command) pair taken from `{prefix}cmd/relay/{room}/{command}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayCommand {
    pub room: String,
    pub command: String,
}

impl RelayCommand {
    pub fn from_topic(topic_name: &str, prefix: &str) -> Result<Self, BridgeError> {
        let command_prefix = format!("{}{}/", prefix, Category::RelayCommand.as_str());
        let (room, command) = topic::parse_suffix(topic_name, &command_prefix)?;
        Ok(Self {
            room: room.to_string(),
            command: command.to_string(),
        })
    }

    /// Resolve the device URL to GET, or `UnroutableRoom` when the room is not wired.
    pub fn device_url(&self, routes: &RoutingTable) -> Result<String, BridgeError> {
        match routes.route(&self.room) {
            RelayTarget::Device(base_url) => Ok(format!("{}{}", base_url, self.command)),
            RelayTarget::Ignored => Err(BridgeError::UnroutableRoom {
                room: self.room.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_routes_bathroom_only() {
        let routes = RoutingTable::builtin();
        assert_eq!(
            routes.route("bathroom"),
            RelayTarget::Device("http://10.0.0.68/relay/0?turn=".into())
        );
        assert_eq!(routes.route("kitchen"), RelayTarget::Ignored);
        assert_eq!(routes.route("attic"), RelayTarget::Ignored);
        assert!(routes.validate().is_ok());
    }

    #[test]
    fn route_is_repeatable() {
        let routes = RoutingTable::builtin();
        assert_eq!(routes.route("bathroom"), routes.route("bathroom"));
        assert_eq!(routes.route("attic"), routes.route("attic"));
    }

    #[test]
    fn empty_table_ignores_everything() {
        let routes = RoutingTable::default();
        assert_eq!(routes.route("attic"), RelayTarget::Ignored);
        assert_eq!(routes.len(), 0);
    }

    #[test]
    fn parses_command_topic() {
        let cmd = RelayCommand::from_topic("home/cmd/relay/bathroom/on", "home/").unwrap();
        assert_eq!(cmd.room, "bathroom");
        assert_eq!(cmd.command, "on");
    }

    #[test]
    fn rejects_short_and_long_command_topics() {
        assert!(RelayCommand::from_topic("home/cmd/relay/bathroom", "home/").is_err());
        assert!(RelayCommand::from_topic("home/cmd/relay/bathroom/on/now", "home/").is_err());
        assert!(RelayCommand::from_topic("other/cmd/relay/bathroom/on", "home/").is_err());
    }

    #[test]
    fn appends_command_to_device_url() {
        let cmd = RelayCommand::from_topic("home/cmd/relay/bathroom/on", "home/").unwrap();
        assert_eq!(
            cmd.device_url(&RoutingTable::builtin()).unwrap(),
            "http://10.0.0.68/relay/0?turn=on"
        );
    }

    #[test]
    fn unmapped_room_is_unroutable() {
        let cmd = RelayCommand::from_topic("home/cmd/relay/kitchen/on", "home/").unwrap();
        let err = cmd.device_url(&RoutingTable::builtin()).unwrap_err();
        assert!(matches!(err, BridgeError::UnroutableRoom { room } if room == "kitchen"));
    }

    #[test]
    fn validate_rejects_bad_entries() {
        assert!(RoutingTable::default().with_device("a", "10.0.0.1/relay").validate().is_err());
        assert!(RoutingTable::default().with_device("a", "http://").validate().is_err());
        assert!(RoutingTable::default().with_ignored("a/b").validate().is_err());
    }
}
