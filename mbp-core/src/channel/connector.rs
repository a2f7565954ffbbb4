//! Connector seam between the channel state machine and the wire.
//!
//! [`NotificationChannel`](super::NotificationChannel) only ever talks to a
//! [`HubConnector`]; the WebSocket implementation lives in `ws.rs` and a
//! scriptable in-process one in `mock.rs`.

use async_trait::async_trait;
use url::Url;

use super::error::ChannelError;
use super::state::NotificationMessage;
use crate::token::SessionToken;

/// Hub path under the root host URL.
pub const HUB_PATH: &str = "notificationHub";

/// Where to connect for a given user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubEndpoint {
    root: Url,
    user_id: i64,
}

impl HubEndpoint {
    pub fn new(root: Url, user_id: i64) -> Self {
        Self { root, user_id }
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    /// `<root>/notificationHub?userId=<id>`
    pub fn url(&self) -> Url {
        let mut url = self.root.clone();
        if !url.path().ends_with('/') {
            let dir = format!("{}/", url.path());
            url.set_path(&dir);
        }
        let path = format!("{}{}", url.path(), HUB_PATH);
        url.set_path(&path);
        url.set_query(None);
        url.query_pairs_mut()
            .append_pair("userId", &self.user_id.to_string());
        url
    }

    /// Endpoint URL with `http`/`https` mapped to `ws`/`wss`.
    pub fn websocket_url(&self) -> Result<Url, ChannelError> {
        let mut url = self.url();
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(ChannelError::InvalidEndpoint(format!(
                    "unsupported scheme '{other}'"
                )));
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| ChannelError::InvalidEndpoint(url.to_string()))?;
        Ok(url)
    }
}

/// Opens connections to the notification hub.
#[async_trait]
pub trait HubConnector: Send + Sync {
    /// Connect and complete the protocol handshake.
    ///
    /// `token` is the bearer token resolved for this attempt, if any.
    async fn connect(
        &self,
        endpoint: &HubEndpoint,
        token: Option<SessionToken>,
    ) -> Result<Box<dyn HubConnection>, ChannelError>;
}

/// An established hub connection.
#[async_trait]
pub trait HubConnection: Send {
    /// Wait for the next application message.
    ///
    /// `Ok(None)` means the server closed the connection cleanly.
    async fn recv(&mut self) -> Result<Option<NotificationMessage>, ChannelError>;

    /// Close the connection.
    async fn close(&mut self) -> Result<(), ChannelError>;
}
