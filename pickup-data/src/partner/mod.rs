//! Partner API access: token caching, paged listing requests and the wire
//! shapes they return.
//!
//! [`HttpPartnerClient`] is the production [`PartnerSource`]. It obtains a
//! bearer token through [`TokenManager`], issues one GET per page and decodes
//! the body. Pages that do not match the expected shape are skipped with a
//! warning unless [`PartnerConfig::strict`] is set. Transport failures are
//! always errors.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use pickup_data::partner::{HttpPartnerClient, PartnerConfig, PartnerSource};
//! use secrecy::SecretString;
//!
//! # async fn run() -> Result<(), pickup_data::partner::PartnerError> {
//! let config = PartnerConfig::new("https://api.cdek.ru/v2", "id", SecretString::from("key"))
//!     .with_timeout(Duration::from_secs(60));
//! let client = HttpPartnerClient::new(config)?;
//! let points = client.points(0, 5000).await?;
//! # let _ = points;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod token;
mod wire;

#[doc(hidden)]
pub mod test_support;

pub use client::{HttpPartnerClient, PartnerError, PartnerResource, PartnerSource};
pub use config::{
    DEFAULT_COUNTRY_CODE, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, PageSizes, PartnerConfig,
};
pub use token::{
    AuthenticationError, Clock, EXPIRY_MARGIN_SECS, HttpTokenEndpoint, SystemClock,
    TokenEndpoint, TokenGrant, TokenManager,
};
pub use wire::PageRejection;
