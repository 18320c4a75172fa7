//! # hookfeed
//!
//! Async client for a webhook management service: a self healing push
//! channel, cursor paginated list stores and the binder that turns pushes
//! into a "new items" counter.
//!
//! ```no_run
//! # async fn run() -> hookfeed::Result<()> {
//! let session = hookfeed::Session::from_env()?;
//! let events = session.events_view()?;
//!
//! events.store().refresh().await?;
//! let mut state = events.subscribe();
//! while state.changed().await.is_ok() {
//!     println!("{} new events", state.borrow().pending);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_debug_implementations, missing_docs)]
#![forbid(unsafe_code)]

pub mod api;
pub mod config;
pub mod feed;
pub mod filter;
pub mod prefs;
pub mod store;
pub mod ws;

mod error;
pub use config::Config;
pub use error::{Error, Result};

use std::sync::Arc;

use snafu::prelude::*;

use api::{ApiSource, Listing};
use feed::LiveFeed;
use store::{PageStore, StoreConfig};
use ws::{ChannelUrl, Connection};

/// Channel of webhook event pushes
pub const EVENTS_CHANNEL: &str = "events";
/// Channel of activity pushes
pub const ACTIVITY_CHANNEL: &str = "activity";

/// Api client plus the settings needed to open channels and views
#[derive(Debug, Clone)]
pub struct Session {
    config: Config,
    api_client: api::Client,
}

impl Session {
    /// Create a session from `config`
    pub fn new(config: Config) -> Result<Self> {
        let api_client = api::Client::new(&config.api_url, config.token.as_deref(), config.timeout)
            .context(error::CallAPIFailed)?;

        log::info!("Api client for {} created", api_client.base_url());

        Ok(Self { config, api_client })
    }

    /// Create a session configured by `HOOKFEED_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(Config::from_env())
    }

    /// the api client
    pub fn api(&self) -> &api::Client {
        &self.api_client
    }

    /// the config
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Url of push channel `channel`, with token
    pub fn channel_url(&self, channel: &str) -> Result<ChannelUrl> {
        let url = ChannelUrl::for_channel(self.config.channel_base(), channel)
            .with_context(|_| error::InvalidChannelURL { channel })?;

        Ok(match &self.config.token {
            Some(token) => url.with_token(token),
            None => url,
        })
    }

    /// Open a connection to push channel `channel`, must be called inside a tokio runtime.
    pub fn open_channel(&self, channel: &str) -> Result<Connection> {
        let url = self.channel_url(channel)?;
        let connection = Connection::with_options(self.config.connection_options());

        log::debug!("Opening channel {}", channel);
        connection.connect(url.as_str(), None);

        Ok(connection)
    }

    /// Create an empty store of `listing`
    pub fn store(&self, listing: Listing) -> Arc<PageStore<ApiSource>> {
        Arc::new(PageStore::new(
            ApiSource::new(self.api_client.clone(), listing),
            StoreConfig {
                demo_fallback: self.config.demo_data,
            },
        ))
    }

    /// Webhook events list with live `new_event` counter, enabled.
    pub fn events_view(&self) -> Result<LiveFeed<ApiSource>> {
        self.view(Listing::Events, EVENTS_CHANNEL, "new_event")
    }

    /// Activity log with live `new_activity` counter, enabled.
    pub fn activity_view(&self) -> Result<LiveFeed<ApiSource>> {
        self.view(Listing::Activity, ACTIVITY_CHANNEL, "new_activity")
    }

    fn view(&self, listing: Listing, channel: &str, kind: &str) -> Result<LiveFeed<ApiSource>> {
        let connection = self.open_channel(channel)?;
        let feed = LiveFeed::with_filter(connection, self.store(listing), filter::kind(kind));
        feed.enable();
        Ok(feed)
    }
}
