//! Push channel url, `{ws|wss}://<host>/ws/<channel>/?token=...`

use std::{fmt::Display, str::FromStr};

use snafu::prelude::*;
use url::Url;

/// Parse string as channel url error
#[derive(Debug, Snafu)]
#[snafu(
    visibility(pub(crate)),
    module(parse_channel_url_error_variant),
    context(suffix(false))
)]
pub enum ParseChannelURLError {
    #[snafu(display("{s} is an invalid url: {source}"))]
    /// the str is not a valid url
    InvalidURL {
        /// string be parsed
        s: String,
        /// source error
        source: url::ParseError,
    },

    /// the parsed url schema is not websocket
    #[snafu(display("the url {s} has invalid schema {schema}, only ws or wss is ok"))]
    InvalidSchema {
        /// the url
        s: String,
        /// invalid schema
        schema: String,
    },

    /// the parsed url has no host
    #[snafu(display("the channel url {s} has no host"))]
    NoHost {
        /// the url
        s: String,
    },
}

/// A validated push channel url
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUrl {
    url: Url,
}

impl ChannelUrl {
    /// Parse `s` as channel url and set `token` query parameter when given.
    pub fn parse(s: &str, token: Option<&str>) -> Result<Self, ParseChannelURLError> {
        let channel: Self = s.parse()?;
        Ok(match token {
            Some(token) => channel.with_token(token),
            None => channel,
        })
    }

    /// Build the url of `channel` on the server behind `base`.
    ///
    /// `base` may be a http(s) api url (`http://host:8000/api`) or a ws(s) url,
    /// only its scheme, host and port are kept.
    pub fn for_channel(base: &str, channel: &str) -> Result<Self, ParseChannelURLError> {
        let mut url = Url::parse(base)
            .with_context(|_| parse_channel_url_error_variant::InvalidURL { s: base })?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            schema => {
                return parse_channel_url_error_variant::InvalidSchema { s: base, schema }.fail()
            }
        };

        // http <-> ws are both "special" schemes, so this can't fail
        let _ = url.set_scheme(scheme);
        url.set_path(&format!("/ws/{}/", channel.trim_matches('/')));
        url.set_query(None);
        url.set_fragment(None);

        url.as_str().parse()
    }

    /// Replace `token` query parameter
    pub fn with_token(mut self, token: &str) -> Self {
        let pairs: Vec<(String, String)> = self
            .url
            .query_pairs()
            .filter(|(k, _)| k != "token")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        {
            let mut query = self.url.query_pairs_mut();
            query.clear();
            for (k, v) in pairs.iter() {
                query.append_pair(k, v);
            }
            query.append_pair("token", token);
        }

        self
    }

    /// access token in url if any
    pub fn token(&self) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == "token")
            .map(|(_, v)| v.into_owned())
    }

    /// final url
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// final url as str
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl FromStr for ChannelUrl {
    type Err = ParseChannelURLError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url =
            Url::parse(s).with_context(|_| parse_channel_url_error_variant::InvalidURL { s })?;

        ensure!(
            url.scheme() == "wss" || url.scheme() == "ws",
            parse_channel_url_error_variant::InvalidSchema {
                s,
                schema: url.scheme(),
            }
        );

        ensure!(
            url.host().is_some(),
            parse_channel_url_error_variant::NoHost { s }
        );

        Ok(Self { url })
    }
}

impl Display for ChannelUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.url.fmt(f)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_with_token() {
        let u = ChannelUrl::parse("ws://localhost:8000/ws/events/", Some("a b")).unwrap();
        assert_eq!(u.as_str(), "ws://localhost:8000/ws/events/?token=a+b");
        assert_eq!(u.token().as_deref(), Some("a b"));
    }

    #[test]
    fn test_token_replaced() {
        let u = ChannelUrl::parse("wss://example.com/ws/activity/?token=old&x=1", Some("new"))
            .unwrap();
        assert_eq!(u.as_str(), "wss://example.com/ws/activity/?x=1&token=new");
    }

    #[test]
    fn test_invalid_schema() {
        assert!(matches!(
            ChannelUrl::parse("http://localhost/ws/events/", None),
            Err(ParseChannelURLError::InvalidSchema { .. })
        ));
        assert!(matches!(
            "not a url".parse::<ChannelUrl>(),
            Err(ParseChannelURLError::InvalidURL { .. })
        ));
    }

    #[test]
    fn test_for_channel() {
        let u = ChannelUrl::for_channel("http://localhost:8000/api", "events").unwrap();
        assert_eq!(u.as_str(), "ws://localhost:8000/ws/events/");

        let u = ChannelUrl::for_channel("https://hooks.example.com/api/?x=1", "/activity/")
            .unwrap();
        assert_eq!(u.as_str(), "wss://hooks.example.com/ws/activity/");

        assert!(ChannelUrl::for_channel("ftp://example.com", "events").is_err());
    }
}
