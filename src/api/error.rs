use snafu::prelude::*;

/// API Error
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(variant), context(suffix(false)))]
pub enum Error {
    /// access token is invalid(contains invalid character that cant be send in HTTP header)
    #[snafu(display("access token {token} is invalid"))]
    TokenInvalid {
        /// input token
        token: String,
    },

    /// api base url can't be parsed
    #[snafu(display("invalid api base url {url}: {source}"))]
    InvalidBaseURL {
        /// input url
        url: String,
        /// source error
        source: url::ParseError,
    },

    /// create HTTP client failed
    #[snafu(display("create api client failed: {source}"))]
    ClientCreateFailed {
        /// source error
        source: reqwest::Error,
    },

    /// build api request failed
    #[snafu(display("build request failed: {source}"))]
    BuildRequestFailed {
        /// source error
        source: reqwest::Error,
    },

    /// send api request failed
    #[snafu(display("{} url {url} failed: {source}", method.as_str()))]
    RequestFailed {
        /// http method
        method: reqwest::Method,
        /// target url
        url: String,
        /// source http error
        source: reqwest::Error,
    },

    /// http response status of api request is not success(2xx)
    #[snafu(display(
        "{} url {url} got http status code {status_code}{}",
        method.as_str(),
        detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
    ))]
    HTTPStatusNotOK {
        /// http method
        method: reqwest::Method,
        /// request url
        url: String,
        /// received http status code
        status_code: reqwest::StatusCode,
        /// error message extracted from response body
        detail: Option<String>,
    },

    /// parse response body of api request as target json type failed
    #[snafu(display("parse response body {body:?} failed: {source}"))]
    ParseBodyFailed {
        /// http response body
        body: bytes::Bytes,
        /// source parse error
        source: serde_json::Error,
    },
}

impl Error {
    /// Check if the server is provably unreachable: connection could not be
    /// established or no response arrived in time.
    ///
    /// Authorization and validation failures are never unreachable.
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::RequestFailed { source, .. } => source.is_connect() || source.is_timeout(),
            _ => false,
        }
    }

    /// HTTP status code if the server answered with an error status
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Self::HTTPStatusNotOK { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

/// Summarise an error response body.
///
/// Looks for `detail`, `message` or `error` fields, then for field validation
/// errors in `{"field": ["msg", ...]}` form. A bare json string is used as is.
pub(crate) fn error_detail(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;

    if let Some(s) = value.as_str() {
        return Some(s.to_string());
    }

    let obj = value.as_object()?;

    for key in ["detail", "message", "error"] {
        if let Some(s) = obj.get(key).and_then(serde_json::Value::as_str) {
            return Some(s.to_string());
        }
    }

    let fields = obj
        .iter()
        .filter_map(|(k, v)| {
            let messages = v
                .as_array()?
                .iter()
                .filter_map(serde_json::Value::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            Some(format!("{k}: {messages}"))
        })
        .collect::<Vec<_>>()
        .join("; ");

    (!fields.is_empty()).then_some(fields)
}
