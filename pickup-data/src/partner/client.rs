//! Authenticated, paginated reads from the partner API.

use std::fmt;

use async_trait::async_trait;
use pickup_core::{CityRecord, PointRecord, RegionRecord};
use reqwest::Client;
use thiserror::Error;

use super::token::{AuthenticationError, Clock, HttpTokenEndpoint, SystemClock, TokenEndpoint};
use super::wire::{PageRejection, decode_page, decode_points};
use super::{PartnerConfig, TokenManager};

/// Catalog resources served by the partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartnerResource {
    /// `/location/regions`.
    Regions,
    /// `/location/cities`.
    Cities,
    /// `/deliverypoints`.
    Points,
}

impl PartnerResource {
    /// Path relative to the API root.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Regions => "/location/regions",
            Self::Cities => "/location/cities",
            Self::Points => "/deliverypoints",
        }
    }

    /// Name of the country filter parameter, which differs per resource.
    #[must_use]
    pub const fn country_param(self) -> &'static str {
        match self {
            Self::Regions | Self::Cities => "country_codes",
            Self::Points => "country_code",
        }
    }

    /// Short label for logs and errors.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Regions => "regions",
            Self::Cities => "cities",
            Self::Points => "points",
        }
    }
}

impl fmt::Display for PartnerResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors raised by [`PartnerSource`] implementations.
#[derive(Debug, Error)]
pub enum PartnerError {
    /// Building the HTTP client failed.
    #[error("failed to build HTTP client")]
    Build(#[source] reqwest::Error),
    /// No access token could be obtained.
    #[error(transparent)]
    Authentication(#[from] AuthenticationError),
    /// The request did not complete within the configured timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// Requested URL.
        url: String,
        /// Configured timeout.
        timeout_secs: u64,
    },
    /// The partner answered with a non-success status.
    #[error("request to {url} failed with status {status}")]
    Http {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },
    /// The request failed below HTTP, e.g. DNS or connection errors.
    #[error("request to {url} failed")]
    Network {
        /// Requested URL.
        url: String,
        /// Source error returned by `reqwest`.
        #[source]
        source: reqwest::Error,
    },
    /// A page did not match the expected shape and strict mode is on.
    #[error("{resource} page {page} was rejected")]
    InvalidPage {
        /// Resource being paged.
        resource: PartnerResource,
        /// Zero-based page index.
        page: u32,
        /// Why the page was rejected.
        #[source]
        reason: PageRejection,
    },
}

/// Paged access to the partner catalog.
///
/// Pages are zero-based; an empty page marks the end of the listing.
#[async_trait]
pub trait PartnerSource: Send + Sync {
    /// One page of regions.
    async fn regions(&self, page: u32, size: u32) -> Result<Vec<RegionRecord>, PartnerError>;

    /// One page of cities.
    async fn cities(&self, page: u32, size: u32) -> Result<Vec<CityRecord>, PartnerError>;

    /// One page of points, flattened.
    async fn points(&self, page: u32, size: u32) -> Result<Vec<PointRecord>, PartnerError>;
}

/// [`PartnerSource`] over HTTP with bearer authentication.
///
/// # Examples
/// ```no_run
/// use pickup_data::partner::{HttpPartnerClient, PartnerConfig, PartnerSource};
/// use secrecy::SecretString;
///
/// # async fn run() -> Result<(), pickup_data::partner::PartnerError> {
/// let config = PartnerConfig::new(
///     "https://api.cdek.ru/v2",
///     "client",
///     SecretString::from("secret"),
/// );
/// let client = HttpPartnerClient::new(config)?;
/// let first_page = client.regions(0, 500).await?;
/// println!("{} regions", first_page.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct HttpPartnerClient<E = HttpTokenEndpoint, C = SystemClock> {
    client: Client,
    config: PartnerConfig,
    tokens: TokenManager<E, C>,
}

impl HttpPartnerClient {
    /// Build a client whose tokens come from the partner's OAuth endpoint.
    ///
    /// # Errors
    /// Returns [`PartnerError::Build`] if the HTTP client cannot be created.
    pub fn new(config: PartnerConfig) -> Result<Self, PartnerError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(PartnerError::Build)?;
        let tokens = TokenManager::new(HttpTokenEndpoint::new(client.clone(), &config));
        Ok(Self::with_tokens(client, config, tokens))
    }
}

impl<E: TokenEndpoint, C: Clock> HttpPartnerClient<E, C> {
    /// Assemble a client from parts.
    pub fn with_tokens(client: Client, config: PartnerConfig, tokens: TokenManager<E, C>) -> Self {
        Self {
            client,
            config,
            tokens,
        }
    }

    /// Active configuration.
    pub const fn config(&self) -> &PartnerConfig {
        &self.config
    }

    async fn fetch(
        &self,
        resource: PartnerResource,
        page: u32,
        size: u32,
    ) -> Result<Vec<u8>, PartnerError> {
        let token = self.tokens.get_token().await?;
        let url = self.config.endpoint(resource.path());
        log::debug!("fetching {resource} page {page} (size {size})");

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[
                ("page", page.to_string()),
                ("size", size.to_string()),
                (resource.country_param(), self.config.country_code.clone()),
            ])
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(err, &url))?
            .error_for_status()
            .map_err(|err| self.convert_reqwest_error(err, &url))?;

        let body = response
            .bytes()
            .await
            .map_err(|err| self.convert_reqwest_error(err, &url))?;
        Ok(body.to_vec())
    }

    fn convert_reqwest_error(&self, error: reqwest::Error, url: &str) -> PartnerError {
        if error.is_timeout() {
            return PartnerError::Timeout {
                url: url.to_owned(),
                timeout_secs: self.config.timeout.as_secs(),
            };
        }

        if let Some(status) = error.status() {
            return PartnerError::Http {
                url: url.to_owned(),
                status: status.as_u16(),
            };
        }

        PartnerError::Network {
            url: url.to_owned(),
            source: error,
        }
    }

    /// Apply the strict or lenient policy to a decoded page.
    fn accept<T>(
        &self,
        resource: PartnerResource,
        page: u32,
        decoded: Result<Vec<T>, PageRejection>,
    ) -> Result<Vec<T>, PartnerError> {
        match decoded {
            Ok(records) => Ok(records),
            Err(reason) if self.config.strict => Err(PartnerError::InvalidPage {
                resource,
                page,
                reason,
            }),
            Err(reason) => {
                log::warn!("skipping {resource} page {page}: {reason}");
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl<E: TokenEndpoint, C: Clock> PartnerSource for HttpPartnerClient<E, C> {
    async fn regions(&self, page: u32, size: u32) -> Result<Vec<RegionRecord>, PartnerError> {
        let resource = PartnerResource::Regions;
        let body = self.fetch(resource, page, size).await?;
        self.accept(resource, page, decode_page(&body))
    }

    async fn cities(&self, page: u32, size: u32) -> Result<Vec<CityRecord>, PartnerError> {
        let resource = PartnerResource::Cities;
        let body = self.fetch(resource, page, size).await?;
        self.accept(resource, page, decode_page(&body))
    }

    async fn points(&self, page: u32, size: u32) -> Result<Vec<PointRecord>, PartnerError> {
        let resource = PartnerResource::Points;
        let body = self.fetch(resource, page, size).await?;
        self.accept(resource, page, decode_points(&body))
    }
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "tests unwrap known-good fixtures")]
mod tests {
    use super::*;
    use crate::partner::test_support::{ManualClock, StubTokenEndpoint};
    use rstest::rstest;
    use secrecy::SecretString;

    fn client(strict: bool) -> HttpPartnerClient<StubTokenEndpoint, ManualClock> {
        let config = PartnerConfig::new("http://127.0.0.1:9", "client", SecretString::from("s"))
            .with_strict(strict);
        let tokens =
            TokenManager::with_clock(StubTokenEndpoint::issuing(3600), ManualClock::at(0));
        HttpPartnerClient::with_tokens(Client::new(), config, tokens)
    }

    fn rejection() -> PageRejection {
        PageRejection::CodeTooLong {
            code: "ABCDEFGHIJK".into(),
            length: 11,
        }
    }

    #[rstest]
    fn lenient_mode_turns_rejections_into_empty_pages() {
        let records: Vec<RegionRecord> = client(false)
            .accept(PartnerResource::Regions, 3, Err(rejection()))
            .expect("lenient");
        assert!(records.is_empty());
    }

    #[rstest]
    fn strict_mode_surfaces_rejections() {
        let err = client(true)
            .accept::<PointRecord>(PartnerResource::Points, 2, Err(rejection()))
            .expect_err("strict");
        assert!(matches!(
            err,
            PartnerError::InvalidPage {
                resource: PartnerResource::Points,
                page: 2,
                ..
            }
        ));
    }

    #[rstest]
    #[case(PartnerResource::Regions, "/location/regions", "country_codes")]
    #[case(PartnerResource::Cities, "/location/cities", "country_codes")]
    #[case(PartnerResource::Points, "/deliverypoints", "country_code")]
    fn resources_map_to_partner_paths(
        #[case] resource: PartnerResource,
        #[case] path: &str,
        #[case] country_param: &str,
    ) {
        assert_eq!(resource.path(), path);
        assert_eq!(resource.country_param(), country_param);
    }
}
