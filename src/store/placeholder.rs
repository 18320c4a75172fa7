//! Deterministic placeholder items shown when the server can't be reached.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::json;

use crate::api::types::{Item, Page};

/// Number of placeholder items
pub const PLACEHOLDER_COUNT: usize = 10;

static KINDS: [(&str, &str); 8] = [
    ("WEBHOOK_RECEIVED", "Webhook received on Payment Endpoint"),
    ("SECRET_ROTATED", "Secret rotated for API Webhook"),
    ("REPLAY_SUCCESS", "Event replay succeeded"),
    ("LOGIN_SUCCESS", "User login successful"),
    ("WEBHOOK_CREATED", "New webhook endpoint created"),
    ("REPLAY_FAILED", "Event replay failed"),
    ("LOGIN_FAILED", "Login attempt failed"),
    ("FORWARD_SUCCESS", "Event forward succeeded"),
];

/// Build the placeholder page, newest first, `demo_1` being `now - 7 minutes`.
pub(crate) fn page(now: DateTime<Utc>) -> Page {
    let items: Vec<Item> = (1..=PLACEHOLDER_COUNT)
        .filter_map(|i| {
            let (kind, title) = KINDS[(i - 1) % KINDS.len()];
            let minutes = (i as i64) * 7;
            let created_at = now - Duration::minutes(minutes);

            Item::from_value(json!({
                "id": format!("demo_{}", i),
                "type": kind,
                "title": title,
                "actor_name": if i % 3 == 0 { "System" } else { "Demo User" },
                "is_system": kind == "WEBHOOK_RECEIVED",
                "created_at": created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                "time_ago": format!("{} minutes ago", minutes),
                "placeholder": true,
            }))
            .ok()
        })
        .collect();

    Page {
        total_count: items.len() as u64,
        items,
        next_cursor: None,
        has_more: false,
    }
}
