//! Page sources used by [PageStore](crate::store::PageStore).

use super::{
    types::{Filters, ItemId, Page},
    Client, Error,
};

/// Cursor paginated listings of the api
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    /// all received webhook events, `/webhooks/events/`
    Events,
    /// events received by one endpoint, `/webhooks/endpoints/{id}/events/`
    EndpointEvents(ItemId),
    /// delivery attempts of one endpoint, `/webhooks/endpoints/{id}/deliveries/`
    Deliveries(ItemId),
    /// webhook endpoints, `/webhooks/endpoints/`
    Endpoints,
    /// account activity log, `/activity/`
    Activity,
}

impl Listing {
    /// request path relative to api base url
    pub fn path(&self) -> String {
        match self {
            Self::Events => "/webhooks/events/".to_string(),
            Self::EndpointEvents(id) => format!("/webhooks/endpoints/{}/events/", id),
            Self::Deliveries(id) => format!("/webhooks/endpoints/{}/deliveries/", id),
            Self::Endpoints => "/webhooks/endpoints/".to_string(),
            Self::Activity => "/activity/".to_string(),
        }
    }
}

/// Error of a page fetch, tells connectivity failures apart from others.
pub trait FetchError: std::error::Error + Send + Sync + 'static {
    /// true only when the server was provably unreachable
    fn is_unreachable(&self) -> bool;
}

impl FetchError for Error {
    fn is_unreachable(&self) -> bool {
        Error::is_unreachable(self)
    }
}

/// Something that can fetch one page of a listing.
#[async_trait::async_trait]
pub trait PageSource: Send + Sync {
    /// fetch error type
    type Error: FetchError;

    /// fetch the page after `cursor`, or the first page when `cursor` is `None`
    async fn fetch_page(&self, filters: &Filters, cursor: Option<&str>)
        -> Result<Page, Self::Error>;
}

/// A listing of the HTTP api
#[derive(Debug, Clone)]
pub struct ApiSource {
    client: Client,
    listing: Listing,
}

impl ApiSource {
    /// Create a source for `listing`
    pub fn new(client: Client, listing: Listing) -> Self {
        Self { client, listing }
    }

    /// the listing this source fetches
    pub fn listing(&self) -> &Listing {
        &self.listing
    }
}

#[async_trait::async_trait]
impl PageSource for ApiSource {
    type Error = Error;

    async fn fetch_page(&self, filters: &Filters, cursor: Option<&str>) -> Result<Page, Error> {
        self.client.list(&self.listing, filters, cursor).await
    }
}
