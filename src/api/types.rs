//! Webhook management HTTP API request and response types

use std::{collections::BTreeMap, fmt::Display};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use snafu::prelude::*;

/// Error when a json value can't be used as a list item
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(invalid_item_error), context(suffix(false)))]
pub enum InvalidItemError {
    /// item is not a json object
    #[snafu(display("item {json} is not an object"))]
    NotObject {
        /// item json
        json: String,
    },

    /// item has no usable id field
    #[snafu(display("item {json} has no string or number id"))]
    NoID {
        /// item json
        json: String,
    },
}

/// Identity of an item, the server may send it as a string or a number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// id as str
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A listed entity (webhook event, activity record, delivery, endpoint).
///
/// Only `id` (identity) and `created_at` (ordering key) carry meaning here,
/// every other field is kept as received.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    id: ItemId,
    fields: Map<String, Value>,
}

impl Item {
    /// Validate a json value as an item
    pub fn from_value(value: Value) -> Result<Self, InvalidItemError> {
        let fields = match value {
            Value::Object(fields) => fields,
            other => {
                return invalid_item_error::NotObject {
                    json: other.to_string(),
                }
                .fail()
            }
        };

        let id = match fields.get("id") {
            Some(Value::String(s)) if !s.is_empty() => Some(ItemId(s.clone())),
            Some(Value::Number(n)) => Some(ItemId(n.to_string())),
            _ => None,
        };

        let id = id.with_context(|| invalid_item_error::NoID {
            json: Value::Object(fields.clone()).to_string(),
        })?;

        Ok(Self { id, fields })
    }

    /// item id
    pub fn id(&self) -> &ItemId {
        &self.id
    }

    /// creation timestamp as sent by server, RFC 3339 in practice
    pub fn created_at(&self) -> Option<&str> {
        self.fields.get("created_at").and_then(Value::as_str)
    }

    /// `type` or `event_type` discriminator of the item if any
    pub fn kind(&self) -> Option<&str> {
        self.get("type")
            .or_else(|| self.get("event_type"))
            .and_then(Value::as_str)
    }

    /// get a raw field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// all raw fields, including id
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// convert back to json value
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl Serialize for Item {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Item {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

/// Listing response as received. Some endpoints wrap results in a cursor
/// pagination envelope, others return a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawPage {
    /// plain json array of items
    Bare(Vec<Value>),
    /// `{results, next, count}` envelope, every field optional
    Envelope {
        /// page items
        #[serde(default)]
        results: Option<Vec<Value>>,
        /// url of next page
        #[serde(default)]
        next: Option<String>,
        /// total count of the whole result set
        #[serde(default)]
        count: Option<u64>,
    },
}

/// One normalized page of a cursor paginated listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// items, newest first
    pub items: Vec<Item>,
    /// cursor for next page
    pub next_cursor: Option<String>,
    /// is there a next page
    pub has_more: bool,
    /// total count of the whole result set
    pub total_count: u64,
}

fn valid_items(values: Vec<Value>) -> Vec<Item> {
    values
        .into_iter()
        .filter_map(|value| match Item::from_value(value) {
            Ok(item) => Some(item),
            Err(err) => {
                log::warn!("Drop invalid item in listing: {}", err);
                None
            }
        })
        .collect()
}

/// Extract `cursor` query parameter from a next page url.
///
/// Relative urls are accepted too.
pub fn cursor_from_next(next: &str) -> Option<String> {
    let base = url::Url::parse("http://localhost/").ok()?;
    let url = base.join(next).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "cursor")
        .map(|(_, v)| v.into_owned())
}

impl From<RawPage> for Page {
    fn from(raw: RawPage) -> Self {
        match raw {
            RawPage::Bare(values) => {
                let items = valid_items(values);
                Page {
                    total_count: items.len() as u64,
                    items,
                    next_cursor: None,
                    has_more: false,
                }
            }
            RawPage::Envelope {
                results,
                next,
                count,
            } => {
                let items = valid_items(results.unwrap_or_default());
                let next_cursor = next.as_deref().and_then(cursor_from_next);
                Page {
                    total_count: count.unwrap_or(items.len() as u64),
                    has_more: next_cursor.is_some(),
                    next_cursor,
                    items,
                }
            }
        }
    }
}

/// Listing query filters, sent as query parameters.
///
/// Empty values mean "no filter" and are never sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters(BTreeMap<String, String>);

impl Filters {
    /// No filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder style insert
    pub fn with<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a filter
    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.0.insert(key.into(), value.into());
    }

    /// Unset a filter
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Get a filter value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Query pairs that will be sent, empty values skipped
    pub fn query_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// true if no effective filter
    pub fn is_empty(&self) -> bool {
        self.query_pairs().next().is_none()
    }
}

/// Request body for event replay and forward
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryTarget {
    /// url the event will be delivered to
    pub target_url: String,
}

/// Request body for endpoint creation
#[derive(Debug, Clone, Default, Serialize)]
pub struct EndpointDraft {
    /// endpoint name
    pub name: String,
    /// endpoint description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Request body for partial endpoint update
#[derive(Debug, Clone, Default, Serialize)]
pub struct EndpointPatch {
    /// new name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// new description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// new status, `active` or `inactive`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Request body for sending a test delivery to an endpoint
#[derive(Debug, Clone, Serialize)]
pub struct TestDelivery {
    /// json payload delivered as is
    pub payload: Value,
    /// value of `X-Event-Type`, server uses `test` when `None`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RotateSecret {
    pub confirm: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EndpointSecret {
    pub secret: String,
}
