//! WebSocket hub connector

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use super::connector::{HubConnection, HubConnector, HubEndpoint};
use super::error::ChannelError;
use super::protocol::{self, HubFrame};
use super::state::NotificationMessage;
use crate::token::SessionToken;

/// Default interval between client keep-alive pings.
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(15);

/// Default time allowed for the handshake response.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects straight over WebSockets, skipping transport negotiation.
///
/// The bearer token goes in the `Authorization` header of the upgrade request.
#[derive(Debug, Clone)]
pub struct WsHubConnector {
    keepalive: Duration,
    handshake_timeout: Duration,
}

impl Default for WsHubConnector {
    fn default() -> Self {
        Self {
            keepalive: DEFAULT_KEEPALIVE,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

impl WsHubConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keepalive(mut self, keepalive: Duration) -> Self {
        self.keepalive = keepalive;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}

#[async_trait]
impl HubConnector for WsHubConnector {
    async fn connect(
        &self,
        endpoint: &HubEndpoint,
        token: Option<SessionToken>,
    ) -> Result<Box<dyn HubConnection>, ChannelError> {
        let url = endpoint.websocket_url()?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| ChannelError::InvalidEndpoint(e.to_string()))?;

        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&token.bearer())
                .map_err(|_| ChannelError::Connect("token is not a valid header value".into()))?;
            value.set_sensitive(true);
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        debug!(url = %url, "opening notification hub connection");
        let (stream, _response) = connect_async(request)
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;

        let mut connection = WsHubConnection::new(stream, self.keepalive);
        tokio::time::timeout(self.handshake_timeout, connection.handshake())
            .await
            .map_err(|_| ChannelError::Handshake("timed out waiting for response".into()))??;

        debug!(user_id = endpoint.user_id(), "notification hub handshake complete");
        Ok(Box::new(connection))
    }
}

struct WsHubConnection {
    stream: WsStream,
    pending: VecDeque<String>,
    keepalive: Interval,
    closed: bool,
}

impl WsHubConnection {
    fn new(stream: WsStream, keepalive: Duration) -> Self {
        let mut keepalive = tokio::time::interval_at(Instant::now() + keepalive, keepalive);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            stream,
            pending: VecDeque::new(),
            keepalive,
            closed: false,
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), ChannelError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))
    }

    /// Send the handshake and wait for its response.
    ///
    /// Frames that arrive in the same message as the response are kept for
    /// `recv`.
    async fn handshake(&mut self) -> Result<(), ChannelError> {
        self.send_text(protocol::handshake_request()).await?;

        loop {
            let message = match self.stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => return Err(ChannelError::Transport(e.to_string())),
                None => {
                    return Err(ChannelError::Handshake(
                        "connection closed during handshake".into(),
                    ));
                }
            };

            let Message::Text(text) = message else {
                continue;
            };
            let mut frames = protocol::split_frames(text.as_str());
            let Some(response) = frames.next() else {
                continue;
            };
            protocol::parse_handshake_response(response)?;
            self.pending.extend(frames.map(str::to_string));
            return Ok(());
        }
    }

    /// Handle one buffered frame. `Some` ends the current `recv`.
    fn take_frame(
        &mut self,
        frame: &str,
    ) -> Option<Result<Option<NotificationMessage>, ChannelError>> {
        let frame = match protocol::parse_frame(frame) {
            Ok(frame) => frame,
            Err(e) => return Some(Err(e)),
        };
        match frame {
            HubFrame::Invocation { .. } => frame.into_message().map(|msg| Ok(Some(msg))),
            HubFrame::Ping => None,
            HubFrame::Other(kind) => {
                trace!(kind, "ignoring hub frame");
                None
            }
            HubFrame::Close { error } => {
                self.closed = true;
                Some(match error {
                    Some(error) => Err(ChannelError::Closed(error)),
                    None => Ok(None),
                })
            }
        }
    }
}

#[async_trait]
impl HubConnection for WsHubConnection {
    async fn recv(&mut self) -> Result<Option<NotificationMessage>, ChannelError> {
        loop {
            if self.closed {
                return Ok(None);
            }

            if let Some(frame) = self.pending.pop_front() {
                if let Some(outcome) = self.take_frame(&frame) {
                    return outcome;
                }
                continue;
            }

            tokio::select! {
                _ = self.keepalive.tick() => {
                    self.send_text(protocol::ping_frame()).await?;
                }
                next = self.stream.next() => match next {
                    Some(Ok(Message::Text(text))) => {
                        self.pending
                            .extend(protocol::split_frames(text.as_str()).map(str::to_string));
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        self.closed = true;
                        return Ok(None);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(ChannelError::Transport(e.to_string())),
                },
            }
        }
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        // Best effort: the server may already be gone.
        let _ = self.send_text(protocol::close_frame()).await;
        self.stream
            .close(None)
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;

    #[test]
    fn default_keepalive_is_fifteen_seconds() {
        let connector = WsHubConnector::default();
        assert_eq!(connector.keepalive, Duration::from_secs(15));
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        let connector = WsHubConnector::new().with_handshake_timeout(Duration::from_secs(1));
        let endpoint = HubEndpoint::new(Url::parse("http://127.0.0.1:9").unwrap(), 1);
        let result = connector.connect(&endpoint, None).await;
        assert!(matches!(result, Err(ChannelError::Connect(_))));
    }
}
