//! Error taxonomy for the Dropbox client.
//!
//! Every failure surfaces to the command layer unchanged; the only recovery
//! the library performs itself is the single 401-refresh-retry cycle in
//! [`crate::client::ApiClient`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Missing or unreadable credential file, or a required key is absent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The token endpoint rejected the refresh request.
    #[error("Token refresh rejected (status {status}): {body}")]
    Auth { status: u16, body: String },

    /// The provider returned a response with an unexpected shape.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Network-level failure (connection refused, timeout, DNS).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-401 HTTP error status from a domain call. Status and body are
    /// carried verbatim so callers can distinguish not-found from conflict.
    #[error("Dropbox API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
