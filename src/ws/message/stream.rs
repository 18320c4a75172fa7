use std::{borrow::Cow, task::Poll};

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use snafu::prelude::*;
use tokio_tungstenite::tungstenite::{
    self as websocket,
    protocol::{frame::coding::CloseCode, CloseFrame},
};

use super::{Message, ParseMessageError};
use crate::ws::client::WebsocketClient;

/// close code of a deliberate close
pub(crate) const NORMAL_CLOSURE: u16 = 1000;

/// close code used when the connection ends without a close frame
pub(crate) const ABNORMAL_CLOSURE: u16 = 1006;

/// Error when read/write message stream/sink
#[derive(Debug, Snafu)]
#[snafu(module(error), context(suffix(false)))]
pub enum MessageStreamSinkError {
    /// underlying websocket stream broken
    #[snafu(display("underlying websocket stream broken: {source}"))]
    Websocket {
        /// source error
        source: websocket::Error,
    },

    /// peer sent a close frame
    #[snafu(display("connection closed by peer with code {code}: {reason}"))]
    Closed {
        /// close code
        code: u16,
        /// close reason
        reason: String,
    },

    /// parse frame data failed
    #[snafu(display("parse frame to message failed: {source}"))]
    ParseMessageFailed {
        /// source error
        source: ParseMessageError,
    },

    /// encode outgoing message failed
    #[snafu(display("encode {kind} message failed: {source}"))]
    EncodeMessageFailed {
        /// message type
        kind: String,
        /// source error
        source: serde_json::Error,
    },
}

impl MessageStreamSinkError {
    /// Check if this error will make the stream/sink stop
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Websocket { .. } | Self::Closed { .. } => true,
            Self::ParseMessageFailed { .. } | Self::EncodeMessageFailed { .. } => false,
        }
    }

    /// Close code this error ends the connection with
    pub fn close_code(&self) -> u16 {
        match self {
            Self::Closed { code, .. } => *code,
            _ => ABNORMAL_CLOSURE,
        }
    }
}

/// Frame that can be written to a [MessageStreamSink]
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    /// a json message as text frame
    Message(Message),
    /// a close frame
    Close {
        /// close code
        code: u16,
        /// close reason
        reason: String,
    },
}

impl From<Message> for Outgoing {
    fn from(msg: Message) -> Self {
        Self::Message(msg)
    }
}

/// Push channel message stream/sink over a websocket connection.
///
/// Control frames are answered by the websocket layer and never yielded.
#[derive(Debug)]
pub struct MessageStreamSink {
    ws: WebsocketClient,
}

impl MessageStreamSink {
    /// Construct a new stream with underlying websocket connection.
    pub fn new(ws: WebsocketClient) -> Self {
        Self { ws }
    }
}

impl Stream for MessageStreamSink {
    type Item = Result<Message, MessageStreamSinkError>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        loop {
            let frame = match self.ws.poll_next_unpin(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Ready(Some(frame)) => frame,
            };

            let result = match frame {
                Err(e) => Err(MessageStreamSinkError::Websocket { source: e }),
                Ok(websocket::Message::Text(text)) => {
                    Message::decode(&text).map_err(|e| {
                        log::trace!("Parse failed message data: {}", text);
                        MessageStreamSinkError::ParseMessageFailed { source: e }
                    })
                }
                Ok(websocket::Message::Binary(data)) => {
                    Message::decode_binary(&data).map_err(|e| {
                        log::trace!("Parse failed binary data: {:?}", data);
                        MessageStreamSinkError::ParseMessageFailed { source: e }
                    })
                }
                Ok(websocket::Message::Close(frame)) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.into_owned()))
                        .unwrap_or((ABNORMAL_CLOSURE, String::new()));
                    Err(MessageStreamSinkError::Closed { code, reason })
                }
                Ok(_) => continue,
            };

            return Poll::Ready(Some(result));
        }
    }
}

impl Sink<Outgoing> for MessageStreamSink {
    type Error = MessageStreamSinkError;

    fn poll_ready(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        self.ws
            .poll_ready_unpin(cx)
            .map_err(|e| Self::Error::Websocket { source: e })
    }

    fn start_send(mut self: std::pin::Pin<&mut Self>, item: Outgoing) -> Result<(), Self::Error> {
        let frame = match item {
            Outgoing::Message(msg) => {
                let text = msg
                    .encode()
                    .with_context(|_| error::EncodeMessageFailed { kind: msg.kind() })?;
                websocket::Message::Text(text)
            }
            Outgoing::Close { code, reason } => websocket::Message::Close(Some(CloseFrame {
                code: CloseCode::from(code),
                reason: Cow::Owned(reason),
            })),
        };

        self.ws
            .start_send_unpin(frame)
            .map_err(|e| Self::Error::Websocket { source: e })
    }

    fn poll_flush(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        self.ws
            .poll_flush_unpin(cx)
            .map_err(|e| Self::Error::Websocket { source: e })
    }

    fn poll_close(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        self.ws
            .poll_close_unpin(cx)
            .map_err(|e| Self::Error::Websocket { source: e })
    }
}
