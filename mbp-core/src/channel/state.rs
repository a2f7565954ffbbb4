//! Channel state and message types

use serde::{Deserialize, Serialize};

/// Event name the server uses for application notifications.
pub const RECEIVE_NOTIFICATION: &str = "ReceiveNotification";

/// Lifecycle state of the notification channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    /// No connection and no attempt in flight
    #[default]
    Idle,
    /// A connection attempt is in flight (or waiting to retry)
    Connecting,
    /// Connected and dispatching messages
    Connected,
    /// Tearing down the connection
    Stopping,
}

impl ChannelState {
    /// Whether a connection exists or is being established.
    pub fn is_active(self) -> bool {
        matches!(self, ChannelState::Connecting | ChannelState::Connected)
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ChannelState::Idle => "idle",
            ChannelState::Connecting => "connecting",
            ChannelState::Connected => "connected",
            ChannelState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// A message pushed by the server over the notification channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    /// Event name, e.g. `ReceiveNotification`
    pub event: String,
    /// Opaque payload, forwarded verbatim
    pub payload: String,
}

impl NotificationMessage {
    pub fn new(event: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            payload: payload.into(),
        }
    }

    /// A `ReceiveNotification` message carrying `payload`.
    pub fn notification(payload: impl Into<String>) -> Self {
        Self::new(RECEIVE_NOTIFICATION, payload)
    }

    pub fn is_notification(&self) -> bool {
        self.event == RECEIVE_NOTIFICATION
    }
}

/// Result of a `start` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new connection attempt was started
    Started,
    /// The channel was already connecting or connected; nothing was done
    AlreadyActive,
    /// The channel is being stopped; nothing was done
    Stopping,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_state_default_is_idle() {
        assert_eq!(ChannelState::default(), ChannelState::Idle);
    }

    #[test]
    fn only_connecting_and_connected_are_active() {
        assert!(!ChannelState::Idle.is_active());
        assert!(ChannelState::Connecting.is_active());
        assert!(ChannelState::Connected.is_active());
        assert!(!ChannelState::Stopping.is_active());
    }

    #[test]
    fn channel_state_serializes_snake_case() {
        let json = serde_json::to_string(&ChannelState::Connecting).unwrap();
        assert_eq!(json, "\"connecting\"");
    }

    #[test]
    fn notification_constructor_uses_fixed_event_name() {
        let msg = NotificationMessage::notification("{\"type\":1}");
        assert_eq!(msg.event, "ReceiveNotification");
        assert!(msg.is_notification());
        assert!(!NotificationMessage::new("Other", "").is_notification());
    }
}
