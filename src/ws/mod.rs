//! Push channel client: a self healing websocket connection carrying json messages.

mod client;
pub(crate) mod message;
mod url;

pub use client::{
    Connection, ConnectionError, ConnectionEvent, ConnectionOptions, ConnectionState, EventKind,
    Handler, HandlerId, ReconnectPolicy, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_HEARTBEAT_INTERVAL,
};
pub use message::{Message, MessageStreamSink, MessageStreamSinkError, Outgoing, ParseMessageError};
pub use url::{ChannelUrl, ParseChannelURLError};
