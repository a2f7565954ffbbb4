//! Error types for mbp-core

use std::path::PathBuf;

use thiserror::Error;

use crate::channel::ChannelError;
use crate::transport::TransportError;

/// Top-level error type for session operations
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Errors decoding a session token into an identity
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Token carries no usable user id claim")]
    MissingUserId,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        TokenError::Malformed(err.to_string())
    }
}

/// Errors from durable token storage
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Token storage unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Keyring error: {0}")]
    Keyring(String),
}
