//! webhook management api

mod client;
mod error;
mod source;
pub mod types;

pub use client::{Client, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use error::Error;
pub use source::{ApiSource, FetchError, Listing, PageSource};

/// Result type for api module
pub type Result<T> = std::result::Result<T, Error>;
