//! Connection settings for the partner API.

use std::time::Duration;

use secrecy::SecretString;

/// Default user agent sent with every partner request.
pub const DEFAULT_USER_AGENT: &str = "pickup-mirror/0.1";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Country filter applied when none is configured.
pub const DEFAULT_COUNTRY_CODE: &str = "RU";

/// Records requested per page for each resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSizes {
    /// Regions per page.
    pub regions: u32,
    /// Cities per page.
    pub cities: u32,
    /// Points per page.
    pub points: u32,
}

impl Default for PageSizes {
    fn default() -> Self {
        Self {
            regions: 500,
            cities: 5000,
            points: 5000,
        }
    }
}

/// Configuration for [`super::HttpPartnerClient`].
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use pickup_data::partner::PartnerConfig;
/// use secrecy::SecretString;
///
/// let config = PartnerConfig::new(
///     "https://api.edu.cdek.ru/v2",
///     "client",
///     SecretString::from("secret"),
/// )
/// .with_timeout(Duration::from_secs(10))
/// .with_strict(true);
/// assert_eq!(config.country_code, "RU");
/// assert!(config.strict);
/// ```
#[derive(Debug)]
pub struct PartnerConfig {
    /// API root, e.g. `https://api.cdek.ru/v2`.
    pub base_url: String,
    /// OAuth client identifier.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: SecretString,
    /// Per-request timeout.
    pub timeout: Duration,
    /// User agent header value.
    pub user_agent: String,
    /// Country filter sent with every listing request.
    pub country_code: String,
    /// Fail on pages that do not match the expected shape instead of
    /// skipping them.
    pub strict: bool,
}

impl PartnerConfig {
    /// Create a configuration with the default timeout and country.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            client_id: client_id.into(),
            client_secret,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            country_code: DEFAULT_COUNTRY_CODE.to_owned(),
            strict: false,
        }
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the country filter.
    #[must_use]
    pub fn with_country_code(mut self, country_code: impl Into<String>) -> Self {
        self.country_code = country_code.into();
        self
    }

    /// Toggle strict page validation.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Absolute URL of `resource`, which must start with `/`.
    pub(crate) fn endpoint(&self, resource: &str) -> String {
        format!("{}{resource}", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn config(base_url: &str) -> PartnerConfig {
        PartnerConfig::new(base_url, "client", SecretString::from("secret"))
    }

    #[rstest]
    #[case("https://api.example.com/v2")]
    #[case("https://api.example.com/v2/")]
    fn endpoint_joins_without_double_slash(#[case] base_url: &str) {
        assert_eq!(
            config(base_url).endpoint("/location/regions"),
            "https://api.example.com/v2/location/regions"
        );
    }

    #[rstest]
    fn defaults_match_partner_limits() {
        let config = config("https://api.example.com");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(!config.strict);
    }

    #[rstest]
    fn default_page_sizes_match_partner_limits() {
        let sizes = PageSizes::default();
        assert_eq!((sizes.regions, sizes.cities, sizes.points), (500, 5000, 5000));
    }

    #[rstest]
    fn secret_is_redacted_in_debug_output() {
        let rendered = format!("{:?}", config("https://api.example.com"));
        assert!(!rendered.contains("\"secret\""), "secret leaked: {rendered}");
    }
}
