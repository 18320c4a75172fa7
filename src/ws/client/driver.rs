use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use snafu::{prelude::*, IntoError};
use tokio::sync::mpsc;
use tokio_tungstenite as websocket;

use super::{error::connection_error, state::Target, ConnectionEvent, Shared};
use crate::ws::{
    message::{ABNORMAL_CLOSURE, NORMAL_CLOSURE},
    ChannelUrl, MessageStreamSink, MessageStreamSinkError, Outgoing,
};

/// Open one socket for `generation` and pump frames until it ends.
pub(crate) async fn run(shared: Arc<Shared>, generation: u64, target: Target) {
    let url = match ChannelUrl::parse(&target.url, target.token.as_deref())
        .context(connection_error::InvalidURL)
    {
        Ok(url) => url,
        Err(e) => return shared.connect_failed(generation, e),
    };

    // path only, the query carries the token
    log::debug!("Connecting to channel {}", url.url().path());

    let limit = shared.options.handshake_timeout;
    let handshake = match tokio::time::timeout(limit, websocket::connect_async(url.as_str()))
        .await
        .ok()
        .with_context(|| connection_error::HandshakeTimeout {
            url: url.url().path(),
            timeout: limit,
        }) {
        Ok(handshake) => handshake,
        Err(e) => return shared.connect_failed(generation, e),
    };

    let ws = match handshake.with_context(|_| connection_error::ConnectFailed {
        url: url.url().path(),
    }) {
        Ok((ws, _)) => ws,
        Err(e) => return shared.connect_failed(generation, e),
    };

    let mut messages = MessageStreamSink::new(ws);
    let (tx, mut rx) = mpsc::unbounded_channel();

    if !shared.opened(generation, tx) {
        log::debug!("Connection superseded during handshake, close it");
        let _ = messages
            .send(Outgoing::Close {
                code: NORMAL_CLOSURE,
                reason: String::new(),
            })
            .await;
        return;
    }

    let (mut sink, mut stream) = messages.split();

    let (code, reason) = loop {
        tokio::select! {
            outgoing = rx.recv() => match outgoing {
                Some(frame @ Outgoing::Close { .. }) => {
                    log::debug!("Closing connection on request");
                    if let Err(e) = sink.send(frame).await {
                        log::debug!("Send close frame failed: {}", e);
                    }
                    return;
                }
                Some(frame) => {
                    if let Err(e) = sink.send(frame).await {
                        if e.is_fatal() {
                            log::warn!("Send message failed, connection broken: {}", e);
                            break close_info(&e);
                        }
                        log::warn!("Drop unsendable message: {}", e);
                        shared.emit_current(generation, &error_event(e));
                    }
                }
                // sender dropped, connection was closed or replaced
                None => return,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(message)) => {
                    log::trace!("Received {} message", message.kind());
                    shared.emit_current(generation, &ConnectionEvent::Message(message));
                }
                Some(Err(e)) if !e.is_fatal() => {
                    log::warn!("Malformed frame ignored: {}", e);
                    shared.emit_current(generation, &error_event(e));
                }
                Some(Err(e)) => break close_info(&e),
                None => break (ABNORMAL_CLOSURE, "stream ended".to_string()),
            },
        }
    };

    shared.closed(generation, code, reason);
}

fn close_info(e: &MessageStreamSinkError) -> (u16, String) {
    match e {
        MessageStreamSinkError::Closed { code, reason } => (*code, reason.clone()),
        other => (other.close_code(), other.to_string()),
    }
}

fn error_event(source: MessageStreamSinkError) -> ConnectionEvent {
    ConnectionEvent::Error(Arc::new(connection_error::Frame.into_error(source)))
}
