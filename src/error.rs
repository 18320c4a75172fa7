//! crate error types

use snafu::{prelude::*, IntoError};

use crate::{api::Error as APIError, prefs::PrefsError, ws::ParseChannelURLError};

/// crate result type
pub type Result<T> = std::result::Result<T, Error>;

/// crate error type
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), context(suffix(false)))]
pub enum Error {
    /// Create api client or call api failed
    #[snafu(display("call webhook api failed: {source}"))]
    CallAPIFailed {
        /// source error
        source: APIError,
    },

    /// Push channel url can't be built from config
    #[snafu(display("invalid url for channel {channel}: {source}"))]
    InvalidChannelURL {
        /// channel name
        channel: String,
        /// source error
        source: ParseChannelURLError,
    },

    /// Load or save preferences failed
    #[snafu(display("preferences unavailable: {source}"))]
    PreferencesFailed {
        /// source error
        source: PrefsError,
    },
}

impl From<APIError> for Error {
    fn from(source: APIError) -> Self {
        CallAPIFailed.into_error(source)
    }
}

impl From<PrefsError> for Error {
    fn from(source: PrefsError) -> Self {
        PreferencesFailed.into_error(source)
    }
}
