use snafu::prelude::*;
use tokio_tungstenite::tungstenite as websocket;

use crate::ws::{MessageStreamSinkError, ParseChannelURLError};

/// Error reported through [ConnectionEvent::Error](super::ConnectionEvent::Error)
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(connection_error), context(suffix(false)))]
pub enum ConnectionError {
    /// target url is not a valid channel url
    #[snafu(display("invalid channel url: {source}"))]
    InvalidURL {
        /// source error
        source: ParseChannelURLError,
    },

    /// websocket handshake failed
    #[snafu(display("connect to {url} failed: {source}"))]
    ConnectFailed {
        /// channel url
        url: String,
        /// source error
        source: websocket::Error,
    },

    /// websocket handshake did not finish in time
    #[snafu(display("connect to {url} timed out after {timeout:?}"))]
    HandshakeTimeout {
        /// channel url
        url: String,
        /// the limit
        timeout: std::time::Duration,
    },

    /// a frame could not be read or written, the connection stays open
    #[snafu(display("{source}"))]
    Frame {
        /// source error
        source: MessageStreamSinkError,
    },
}
