use std::{borrow::Borrow, time::Duration};

use bytes::Bytes;
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use snafu::prelude::*;

use super::error::{error_detail, variant::*};
use super::types::*;
use super::{Listing, Result};

/// Default api base url of a local development server
pub static DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const NO_QUERY: [(&str, &str); 0] = [];

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// Webhook management HTTP API Client
#[derive(Debug, Clone)]
pub struct Client {
    client: reqwest::Client,
    base_url: String,
}

impl Client {
    /// Create a new api client.
    ///
    /// When `token` is given every request carries it as a bearer token.
    pub fn new<S: AsRef<str> + ?Sized>(
        base_url: &S,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.as_ref().trim_end_matches('/').to_string();

        url::Url::parse(&base_url).with_context(|_| InvalidBaseURL { url: &base_url })?;

        let mut headers = reqwest::header::HeaderMap::new();

        if let Some(token) = token {
            let auth_header_value = format!("Bearer {}", token).parse().map_err(|_| {
                TokenInvalid {
                    token: token.to_string(),
                }
                .build()
            })?;
            headers.insert(reqwest::header::AUTHORIZATION, auth_header_value);
        }

        let client = reqwest::Client::builder()
            .gzip(true)
            .deflate(true)
            .timeout(timeout)
            .user_agent(APP_USER_AGENT)
            .default_headers(headers)
            .build()
            .context(ClientCreateFailed)?;

        Ok(Self { client, base_url })
    }

    /// api base url, without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn execute<Q, K, V, B>(
        &self,
        method: Method,
        path: &str,
        query: Q,
        body: Option<&B>,
    ) -> Result<Bytes>
    where
        Q: IntoIterator,
        Q::Item: Borrow<(K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.request(method.clone(), &url);

        for q in query.into_iter() {
            let (k, v) = q.borrow();
            req = req.query(&[(k.as_ref(), v.as_ref())]);
        }

        if let Some(body) = body {
            req = req.json(body);
        }

        let req = req.build().context(BuildRequestFailed)?;

        log::trace!("{} {}", method, req.url());

        let resp = self
            .client
            .execute(req)
            .await
            .with_context(|_| RequestFailed {
                method: method.clone(),
                url: &url,
            })?;

        let status_code = resp.status();

        let body = resp.bytes().await.with_context(|_| RequestFailed {
            method: method.clone(),
            url: &url,
        })?;

        ensure!(
            status_code.is_success(),
            HTTPStatusNotOK {
                method,
                url,
                status_code,
                detail: error_detail(&body),
            }
        );

        Ok(body)
    }

    async fn request<R, Q, K, V, B>(
        &self,
        method: Method,
        path: &str,
        query: Q,
        body: Option<&B>,
    ) -> Result<R>
    where
        Q: IntoIterator,
        Q::Item: Borrow<(K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = self.execute(method, path, query, body).await?;
        serde_json::from_slice(&body).with_context(|_| ParseBodyFailed { body })
    }

    async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        self.request::<R, _, &str, &str, ()>(Method::GET, path, NO_QUERY, None)
            .await
    }

    /// Fetch one page of a listing.
    ///
    /// `cursor` is the continuation token of a previous page, `None` for the first page.
    pub async fn list(
        &self,
        listing: &Listing,
        filters: &Filters,
        cursor: Option<&str>,
    ) -> Result<Page> {
        let mut query: Vec<(&str, &str)> = filters.query_pairs().collect();
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }

        let raw: RawPage = self
            .request::<_, _, &str, &str, ()>(Method::GET, &listing.path(), &query, None)
            .await?;

        Ok(raw.into())
    }

    /// Call /webhooks/events/{id}/, get event detail
    pub async fn event(&self, id: &ItemId) -> Result<Item> {
        self.get(&format!("/webhooks/events/{}/", id)).await
    }

    /// Replay an event to target url
    pub async fn replay_event(&self, id: &ItemId, target: &DeliveryTarget) -> Result<Item> {
        self.request::<_, _, &str, &str, _>(
            Method::POST,
            &format!("/webhooks/events/{}/replay/", id),
            NO_QUERY,
            Some(target),
        )
        .await
    }

    /// Forward an event to target url
    pub async fn forward_event(&self, id: &ItemId, target: &DeliveryTarget) -> Result<Item> {
        self.request::<_, _, &str, &str, _>(
            Method::POST,
            &format!("/webhooks/events/{}/forward/", id),
            NO_QUERY,
            Some(target),
        )
        .await
    }

    /// Call /webhooks/endpoints/{id}/, get endpoint detail
    pub async fn endpoint(&self, id: &ItemId) -> Result<Item> {
        self.get(&format!("/webhooks/endpoints/{}/", id)).await
    }

    /// Create an endpoint
    pub async fn create_endpoint(&self, draft: &EndpointDraft) -> Result<Item> {
        self.request::<_, _, &str, &str, _>(Method::POST, "/webhooks/endpoints/", NO_QUERY, Some(draft))
            .await
    }

    /// Partially update an endpoint
    pub async fn update_endpoint(&self, id: &ItemId, patch: &EndpointPatch) -> Result<Item> {
        self.request::<_, _, &str, &str, _>(
            Method::PATCH,
            &format!("/webhooks/endpoints/{}/", id),
            NO_QUERY,
            Some(patch),
        )
        .await
    }

    /// Delete an endpoint
    pub async fn delete_endpoint(&self, id: &ItemId) -> Result<()> {
        self.execute::<_, &str, &str, ()>(
            Method::DELETE,
            &format!("/webhooks/endpoints/{}/", id),
            NO_QUERY,
            None,
        )
        .await?;
        Ok(())
    }

    /// Rotate endpoint secret, returns the server response as is
    pub async fn rotate_secret(&self, id: &ItemId) -> Result<serde_json::Value> {
        self.request::<_, _, &str, &str, _>(
            Method::POST,
            &format!("/webhooks/endpoints/{}/rotate_secret/", id),
            NO_QUERY,
            Some(&RotateSecret { confirm: true }),
        )
        .await
    }

    /// Call /webhooks/endpoints/{id}/secret/, get the signing secret in plain text
    pub async fn secret(&self, id: &ItemId) -> Result<String> {
        let secret: EndpointSecret = self
            .get(&format!("/webhooks/endpoints/{}/secret/", id))
            .await?;
        Ok(secret.secret)
    }

    /// Send a signed test delivery to the endpoint url.
    ///
    /// Server answers with the delivery outcome, returned as is.
    pub async fn test_endpoint(
        &self,
        id: &ItemId,
        test: &TestDelivery,
    ) -> Result<serde_json::Value> {
        self.request::<_, _, &str, &str, _>(
            Method::POST,
            &format!("/webhooks/endpoints/{}/test/", id),
            NO_QUERY,
            Some(test),
        )
        .await
    }

    /// Delivery statistics of an endpoint over the last `days` days, server default is 7.
    pub async fn endpoint_analytics(
        &self,
        id: &ItemId,
        days: Option<u32>,
    ) -> Result<serde_json::Value> {
        let days = days.map(|d| d.to_string());
        let query: Vec<(&str, &str)> = days.iter().map(|d| ("days", d.as_str())).collect();

        self.request::<_, _, &str, &str, ()>(
            Method::GET,
            &format!("/webhooks/endpoints/{}/analytics/", id),
            &query,
            None,
        )
        .await
    }

    /// Call /webhooks/deliveries/{id}/, get delivery detail
    pub async fn delivery(&self, id: &ItemId) -> Result<Item> {
        self.get(&format!("/webhooks/deliveries/{}/", id)).await
    }

    /// Call /activity/{id}/, get activity record detail
    pub async fn activity(&self, id: &ItemId) -> Result<Item> {
        self.get(&format!("/activity/{}/", id)).await
    }
}
