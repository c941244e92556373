use core::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Body the relay answers every accepted notification with
pub const ACK_BODY: &str = "Snail mail ACK";

/// Content type the sensor sends its notifications with
pub const REQUEST_CONTENT_TYPE: &str = "application/json";

/// Where the mailbox door is, as far as the sensor is concerned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoorState {
    #[default]
    Closed,
    Opened,
    Ajar,
}

impl DoorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoorState::Closed => "closed",
            DoorState::Opened => "opened",
            DoorState::Ajar => "ajar",
        }
    }
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message the sensor sends to the relay. The variant is carried as the
/// last path segment of the request URL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Notification {
    Open,
    Ajar,
    Closed,
}

impl Notification {
    pub fn path(&self) -> &'static str {
        match self {
            Notification::Open => "open",
            Notification::Ajar => "ajar",
            Notification::Closed => "closed",
        }
    }

    /// Text of the SMS the relay publishes for this notification
    pub fn sms_text(&self) -> &'static str {
        match self {
            Notification::Open => "Snail mail arrived",
            Notification::Ajar => "Mailbox door left ajar",
            Notification::Closed => "Mailbox door closed",
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnknownNotification;

impl fmt::Display for UnknownNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown mailbox notification")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for UnknownNotification {}

impl FromStr for Notification {
    type Err = UnknownNotification;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Notification::Open),
            "ajar" => Ok(Notification::Ajar),
            "closed" => Ok(Notification::Closed),
            _ => Err(UnknownNotification),
        }
    }
}

/// The acknowledgement body, JSON encoded the way the relay returns it
#[cfg(feature = "std")]
pub fn ack_body_json() -> String {
    serde_json::to_string(ACK_BODY).unwrap_or_else(|_| format!("\"{}\"", ACK_BODY))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_paths_parse_back() {
        for notification in [Notification::Open, Notification::Ajar, Notification::Closed] {
            assert_eq!(notification.path().parse::<Notification>(), Ok(notification));
        }
        assert_eq!("opened".parse::<Notification>(), Err(UnknownNotification));
        assert_eq!("".parse::<Notification>(), Err(UnknownNotification));
    }

    #[test]
    fn test_door_state_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&DoorState::Ajar).unwrap(), "\"ajar\"");
        assert_eq!(
            serde_json::from_str::<DoorState>("\"opened\"").unwrap(),
            DoorState::Opened
        );
        assert_eq!(DoorState::default(), DoorState::Closed);
    }

    #[test]
    fn test_ack_body_is_json_string() {
        assert_eq!(ack_body_json(), "\"Snail mail ACK\"");
    }
}
