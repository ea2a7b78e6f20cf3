use crate::error::BridgeError;

/// Topic namespace a message belongs to, below the configured prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Door,
    Motion,
    RelayCommand,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Door => "door",
            Category::Motion => "motion",
            Category::RelayCommand => "cmd/relay",
        }
    }
}

/// Build `{prefix}{category}/{room}`. The prefix already carries its trailing slash.
pub fn state_topic(prefix: &str, category: Category, room: &str) -> String {
    format!("{}{}/{}", prefix, category.as_str(), room)
}

/// Subscription pattern for relay commands: `{prefix}cmd/relay/#`.
pub fn command_filter(prefix: &str) -> String {
    format!("{}{}/#", prefix, Category::RelayCommand.as_str())
}

/// Strip `prefix` from `path` and split the rest into (room, command).
///
/// Exactly two non-empty segments are accepted; anything else is a
/// `MalformedAddress`. Segments are returned as-is, case and all.
pub fn parse_suffix<'a>(path: &'a str, prefix: &str) -> Result<(&'a str, &'a str), BridgeError> {
    let malformed = || BridgeError::MalformedAddress {
        path: path.to_string(),
    };
    let rest = path.strip_prefix(prefix).ok_or_else(malformed)?;
    let mut parts = rest.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(room), Some(command), None) if !room.is_empty() && !command.is_empty() => {
            Ok((room, command))
        }
        _ => Err(malformed()),
    }
}
