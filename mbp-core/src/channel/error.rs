//! Notification channel error types

use thiserror::Error;

/// Errors establishing or running the notification connection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The endpoint URL could not be built
    #[error("invalid notification endpoint: {0}")]
    InvalidEndpoint(String),

    /// The connection could not be established
    #[error("failed to connect: {0}")]
    Connect(String),

    /// The server rejected the protocol handshake
    #[error("handshake rejected: {0}")]
    Handshake(String),

    /// A frame could not be parsed
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server closed the connection with an error
    #[error("connection closed by server: {0}")]
    Closed(String),

    /// The underlying socket failed
    #[error("transport error: {0}")]
    Transport(String),
}
