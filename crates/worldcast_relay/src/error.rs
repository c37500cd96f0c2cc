//! # Relay Error Types

use std::io;

use thiserror::Error;

/// Errors that can occur while setting up the relay.
///
/// Failures on individual proxied connections are logged and never
/// surface here; one bad client must not take the relay down.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The local listener or announcement socket could not be bound.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Address that was requested.
        address: String,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The target was not a usable `host` / `port` pair.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// Socket error after setup.
    #[error("relay i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
