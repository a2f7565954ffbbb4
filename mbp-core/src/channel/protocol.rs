//! JSON hub protocol framing.
//!
//! Frames are JSON objects terminated by the ASCII record separator (0x1E).
//! A text WebSocket message may carry several frames. The client opens with
//! a handshake request; the server answers `{}` or `{"error": "..."}`.

use serde::Deserialize;
use serde_json::{Value, json};

use super::error::ChannelError;
use super::state::NotificationMessage;

/// Frame terminator.
pub const RECORD_SEPARATOR: char = '\u{1e}';

const INVOCATION: u8 = 1;
const PING: u8 = 6;
const CLOSE: u8 = 7;

/// A decoded hub frame
#[derive(Debug, Clone, PartialEq)]
pub enum HubFrame {
    /// Server invoked a client method
    Invocation {
        target: String,
        arguments: Vec<Value>,
    },
    /// Keep-alive
    Ping,
    /// Server is closing the connection
    Close { error: Option<String> },
    /// Any other message type; ignored by the client
    Other(u8),
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    arguments: Vec<Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HandshakeResponse {
    #[serde(default)]
    error: Option<String>,
}

/// The client's opening frame.
pub fn handshake_request() -> String {
    terminate(json!({"protocol": "json", "version": 1}))
}

/// Keep-alive frame.
pub fn ping_frame() -> String {
    terminate(json!({"type": PING}))
}

/// Client-initiated close frame.
pub fn close_frame() -> String {
    terminate(json!({"type": CLOSE}))
}

fn terminate(value: Value) -> String {
    let mut frame = value.to_string();
    frame.push(RECORD_SEPARATOR);
    frame
}

/// Split a text message into its frames, skipping empty segments.
pub fn split_frames(text: &str) -> impl Iterator<Item = &str> {
    text.split(RECORD_SEPARATOR)
        .map(str::trim)
        .filter(|frame| !frame.is_empty())
}

/// Check the server's handshake response frame.
pub fn parse_handshake_response(frame: &str) -> Result<(), ChannelError> {
    let response: HandshakeResponse = serde_json::from_str(frame)
        .map_err(|e| ChannelError::Protocol(format!("bad handshake response: {e}")))?;
    match response.error {
        Some(error) => Err(ChannelError::Handshake(error)),
        None => Ok(()),
    }
}

/// Decode one frame.
pub fn parse_frame(frame: &str) -> Result<HubFrame, ChannelError> {
    let raw: RawFrame =
        serde_json::from_str(frame).map_err(|e| ChannelError::Protocol(e.to_string()))?;

    Ok(match raw.kind {
        INVOCATION => HubFrame::Invocation {
            target: raw
                .target
                .ok_or_else(|| ChannelError::Protocol("invocation without target".to_string()))?,
            arguments: raw.arguments,
        },
        PING => HubFrame::Ping,
        CLOSE => HubFrame::Close { error: raw.error },
        other => HubFrame::Other(other),
    })
}

impl HubFrame {
    /// Convert an invocation into the message delivered to listeners.
    ///
    /// The first argument is the payload: strings pass through verbatim,
    /// other JSON values are forwarded in their serialized form.
    pub fn into_message(self) -> Option<NotificationMessage> {
        match self {
            HubFrame::Invocation { target, arguments } => {
                let payload = match arguments.into_iter().next() {
                    Some(Value::String(s)) => s,
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                Some(NotificationMessage::new(target, payload))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_request_is_terminated_json() {
        let frame = handshake_request();
        assert!(frame.ends_with(RECORD_SEPARATOR));
        let value: Value = serde_json::from_str(frame.trim_end_matches(RECORD_SEPARATOR)).unwrap();
        assert_eq!(value["protocol"], "json");
        assert_eq!(value["version"], 1);
    }

    #[test]
    fn split_frames_handles_batched_messages() {
        let text = "{}\u{1e}{\"type\":6}\u{1e}";
        let frames: Vec<_> = split_frames(text).collect();
        assert_eq!(frames, vec!["{}", "{\"type\":6}"]);
    }

    #[test]
    fn handshake_error_is_reported() {
        assert!(parse_handshake_response("{}").is_ok());
        let err = parse_handshake_response(r#"{"error":"Requested protocol 'json' is not available."}"#)
            .unwrap_err();
        assert!(matches!(err, ChannelError::Handshake(_)));
    }

    #[test]
    fn invocation_becomes_message_with_verbatim_payload() {
        let frame = parse_frame(
            r#"{"type":1,"target":"ReceiveNotification","arguments":["{\"id\":3}"]}"#,
        )
        .unwrap();
        let msg = frame.into_message().unwrap();
        assert_eq!(msg.event, "ReceiveNotification");
        assert_eq!(msg.payload, "{\"id\":3}");
    }

    #[test]
    fn non_string_argument_is_serialized() {
        let frame =
            parse_frame(r#"{"type":1,"target":"ReceiveNotification","arguments":[{"id":3}]}"#)
                .unwrap();
        assert_eq!(frame.into_message().unwrap().payload, r#"{"id":3}"#);
    }

    #[test]
    fn ping_and_close_frames() {
        assert_eq!(parse_frame(r#"{"type":6}"#).unwrap(), HubFrame::Ping);
        assert_eq!(
            parse_frame(r#"{"type":7,"error":"Server timeout elapsed"}"#).unwrap(),
            HubFrame::Close {
                error: Some("Server timeout elapsed".to_string())
            }
        );
        assert!(parse_frame(r#"{"type":6}"#).unwrap().into_message().is_none());
    }

    #[test]
    fn unknown_types_are_other() {
        assert_eq!(parse_frame(r#"{"type":3,"invocationId":"1"}"#).unwrap(), HubFrame::Other(3));
    }

    #[test]
    fn invocation_without_target_is_protocol_error() {
        assert!(matches!(
            parse_frame(r#"{"type":1,"arguments":[]}"#),
            Err(ChannelError::Protocol(_))
        ));
    }
}
