//! Push channel message types.

mod stream;

pub use stream::{MessageStreamSink, MessageStreamSinkError, Outgoing};
pub(crate) use stream::{ABNORMAL_CLOSURE, NORMAL_CLOSURE};

use enum_as_inner::EnumAsInner;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::prelude::*;

use crate::api::types::Item;

/// Error when parse frame data as message
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)), module(error), context(suffix(false)))]
pub enum ParseMessageError {
    /// binary frame is not utf-8 text
    #[snafu(display("frame data is not utf-8: {source}"))]
    NotUTF8 {
        /// source error
        source: std::str::Utf8Error,
    },

    /// data is invalid json
    #[snafu(display("parse json failed: {source}"))]
    ParseJSONFailed {
        /// data for decode
        data: String,
        /// source error
        source: serde_json::Error,
    },

    /// data json is not an object
    #[snafu(display("parsed message is not object: {json}"))]
    MessageNotObject {
        /// json string
        json: String,
    },

    /// data json has no type field
    #[snafu(display("message has no type field: {json}"))]
    NoMessageType {
        /// json string
        json: String,
    },

    /// data json type field is not string
    #[snafu(display("message has non-string type field: {json}"))]
    MessageTypeNotString {
        /// json string
        json: String,
    },

    /// data json is not valid typed message
    #[snafu(display("parse to {type_name} message failed: {source}"))]
    ParseJSONToTypedMessageFailed {
        /// type name
        type_name: String,
        /// source error
        source: serde_json::Error,
    },
}

/// Push channel message, a json object tagged by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, EnumAsInner)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Heartbeat, client -> server
    Ping,
    /// Heartbeat reply, server -> client
    Pong {
        /// human readable text
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Sent once after server accepted the connection, server -> client
    ConnectionEstablished {
        /// human readable text
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// A webhook event was received, server -> client
    NewEvent {
        /// the received event, `null` when missing
        #[serde(default)]
        event: Value,
    },
    /// An activity record was created, server -> client
    NewActivity {
        /// the created activity, `null` when missing
        #[serde(default)]
        activity: Value,
    },
    /// Message with a type this client does not know
    #[serde(skip)]
    Unknown {
        /// value of type field
        kind: String,
        /// whole message
        data: Value,
    },
}

static KNOWN_TYPES: [&str; 5] = [
    "ping",
    "pong",
    "connection_established",
    "new_event",
    "new_activity",
];

impl Message {
    /// Decode a text frame to a message
    pub fn decode(text: &str) -> Result<Self, ParseMessageError> {
        let value: Value =
            serde_json::from_str(text).context(error::ParseJSONFailed { data: text })?;

        let obj = value
            .as_object()
            .with_context(|| error::MessageNotObject { json: text })?;

        let kind = obj
            .get("type")
            .with_context(|| error::NoMessageType { json: text })?
            .as_str()
            .with_context(|| error::MessageTypeNotString { json: text })?
            .to_string();

        if !KNOWN_TYPES.contains(&kind.as_str()) {
            return Ok(Self::Unknown { kind, data: value });
        }

        serde_json::from_value(value)
            .with_context(|_| error::ParseJSONToTypedMessageFailed { type_name: kind })
    }

    /// Decode a binary frame carrying utf-8 json
    pub fn decode_binary(data: &[u8]) -> Result<Self, ParseMessageError> {
        let text = std::str::from_utf8(data).context(error::NotUTF8)?;
        Self::decode(text)
    }

    /// Encode to text frame data
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Unknown { data, .. } => serde_json::to_string(data),
            _ => serde_json::to_string(self),
        }
    }

    /// value of type field
    pub fn kind(&self) -> &str {
        match self {
            Self::Ping => "ping",
            Self::Pong { .. } => "pong",
            Self::ConnectionEstablished { .. } => "connection_established",
            Self::NewEvent { .. } => "new_event",
            Self::NewActivity { .. } => "new_activity",
            Self::Unknown { kind, .. } => kind,
        }
    }

    /// Item carried by a new-item push
    pub fn item(&self) -> Option<Item> {
        let payload = match self {
            Self::NewEvent { event } => event,
            Self::NewActivity { activity } => activity,
            _ => return None,
        };

        match Item::from_value(payload.clone()) {
            Ok(item) => Some(item),
            Err(err) => {
                log::debug!("Push {} carries no valid item: {}", self.kind(), err);
                None
            }
        }
    }
}
