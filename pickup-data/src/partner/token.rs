//! OAuth client-credentials token cache.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;

use super::PartnerConfig;

/// Seconds shaved off the advertised lifetime so a token is never used
/// right at its expiry.
pub const EXPIRY_MARGIN_SECS: i64 = 10;

/// Token endpoint path relative to the API root.
const TOKEN_RESOURCE: &str = "/oauth/token?parameters";

/// Errors raised while obtaining an access token.
#[derive(Debug, Error)]
pub enum AuthenticationError {
    /// The token request could not be sent or its body not read.
    #[error("token request to {url} failed")]
    Transport {
        /// Token endpoint.
        url: String,
        /// Source error returned by `reqwest`.
        #[source]
        source: reqwest::Error,
    },
    /// The endpoint answered with a non-success status.
    #[error("token endpoint {url} rejected the credentials with status {status}")]
    Rejected {
        /// Token endpoint.
        url: String,
        /// HTTP status code.
        status: u16,
    },
    /// The response lacked `access_token` or `expires_in`.
    #[error("token response from {url} is malformed")]
    Malformed {
        /// Token endpoint.
        url: String,
        /// Source error produced by `serde_json`.
        #[source]
        source: serde_json::Error,
    },
}

/// Successful client-credentials exchange.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    /// Bearer credential.
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: i64,
}

/// Performs the client-credentials exchange.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Request a fresh token.
    async fn exchange(&self) -> Result<TokenGrant, AuthenticationError>;
}

/// Source of wall-clock time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now_ms(&self) -> i64;
}

/// [`Clock`] backed by [`SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| {
                i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
            })
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_ms(&self) -> i64 {
        (**self).now_ms()
    }
}

/// Form-encoded POST against the partner's OAuth endpoint.
pub struct HttpTokenEndpoint {
    client: Client,
    url: String,
    client_id: String,
    client_secret: SecretString,
}

impl std::fmt::Debug for HttpTokenEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTokenEndpoint")
            .field("url", &self.url)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl HttpTokenEndpoint {
    /// Build an endpoint sharing `client` with the listing requests.
    #[must_use]
    pub fn new(client: Client, config: &PartnerConfig) -> Self {
        Self {
            client,
            url: config.endpoint(TOKEN_RESOURCE),
            client_id: config.client_id.clone(),
            client_secret: SecretString::from(config.client_secret.expose_secret()),
        }
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn exchange(&self) -> Result<TokenGrant, AuthenticationError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
        ];
        let transport = |source| AuthenticationError::Transport {
            url: self.url.clone(),
            source,
        };
        let response = self
            .client
            .post(&self.url)
            .form(&form)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthenticationError::Rejected {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await.map_err(transport)?;
        serde_json::from_slice(&body).map_err(|source| AuthenticationError::Malformed {
            url: self.url.clone(),
            source,
        })
    }
}

#[derive(Debug)]
struct CachedToken {
    token: String,
    issued_at_ms: i64,
    ttl_ms: i64,
}

impl CachedToken {
    fn is_fresh(&self, now_ms: i64) -> bool {
        now_ms.saturating_sub(self.issued_at_ms) < self.ttl_ms
    }
}

/// Caches a bearer token and refreshes it once it expires.
///
/// The cache lock is held across the freshness check, the exchange and the
/// store, so concurrent callers wait for a single in-flight exchange and
/// then reuse its token. A failed exchange leaves the cache as it was.
#[derive(Debug)]
pub struct TokenManager<E, C = SystemClock> {
    endpoint: E,
    clock: C,
    cached: Mutex<Option<CachedToken>>,
}

impl<E: TokenEndpoint> TokenManager<E> {
    /// Manage tokens from `endpoint` using the system clock.
    pub fn new(endpoint: E) -> Self {
        Self::with_clock(endpoint, SystemClock)
    }
}

impl<E: TokenEndpoint, C: Clock> TokenManager<E, C> {
    /// Manage tokens with an explicit clock.
    pub fn with_clock(endpoint: E, clock: C) -> Self {
        Self {
            endpoint,
            clock,
            cached: Mutex::new(None),
        }
    }

    /// Borrow the token endpoint.
    pub const fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// Borrow the clock.
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Return a valid bearer token, exchanging credentials when the cached
    /// one is missing or expired.
    ///
    /// # Errors
    /// Propagates [`AuthenticationError`] from the exchange.
    pub async fn get_token(&self) -> Result<String, AuthenticationError> {
        let mut cached = self.cached.lock().await;
        let now_ms = self.clock.now_ms();
        if let Some(token) = cached.as_ref().filter(|token| token.is_fresh(now_ms)) {
            return Ok(token.token.clone());
        }

        let grant = self.endpoint.exchange().await?;
        log::debug!(
            "obtained partner access token valid for {}s",
            grant.expires_in
        );
        let ttl_ms = grant
            .expires_in
            .saturating_sub(EXPIRY_MARGIN_SECS)
            .saturating_mul(1000);
        *cached = Some(CachedToken {
            token: grant.access_token.clone(),
            issued_at_ms: now_ms,
            ttl_ms,
        });
        Ok(grant.access_token)
    }
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "tests unwrap known-good token grants")]
mod tests {
    use super::*;
    use crate::partner::test_support::{ManualClock, StubTokenEndpoint};
    use rstest::{fixture, rstest};
    use std::time::Duration;

    #[fixture]
    fn manager() -> TokenManager<StubTokenEndpoint, ManualClock> {
        TokenManager::with_clock(StubTokenEndpoint::issuing(3600), ManualClock::at(1_000_000))
    }

    #[rstest]
    #[tokio::test]
    async fn reuses_token_within_ttl(manager: TokenManager<StubTokenEndpoint, ManualClock>) {
        let first = manager.get_token().await.expect("first token");
        manager.clock().advance(Duration::from_secs(3589));
        let second = manager.get_token().await.expect("cached token");
        assert_eq!(first, second);
        assert_eq!(manager.endpoint().exchanges(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn refreshes_once_ttl_elapses(manager: TokenManager<StubTokenEndpoint, ManualClock>) {
        let first = manager.get_token().await.expect("first token");
        // 3600s advertised minus the 10s margin.
        manager.clock().advance(Duration::from_secs(3590));
        let second = manager.get_token().await.expect("refreshed token");
        assert_ne!(first, second);
        assert_eq!(manager.endpoint().exchanges(), 2);
    }

    #[rstest]
    #[tokio::test]
    async fn failed_exchange_keeps_previous_state(
        manager: TokenManager<StubTokenEndpoint, ManualClock>,
    ) {
        manager.endpoint().set_rejecting(Some(401));
        let err = manager.get_token().await.expect_err("rejected exchange");
        assert!(matches!(
            err,
            AuthenticationError::Rejected { status: 401, .. }
        ));

        manager.endpoint().set_rejecting(None);
        let token = manager.get_token().await.expect("token after recovery");
        assert_eq!(token, "token-2");
        assert_eq!(manager.endpoint().exchanges(), 2);
    }

    #[rstest]
    #[tokio::test]
    async fn short_lifetimes_never_cache() {
        let manager =
            TokenManager::with_clock(StubTokenEndpoint::issuing(5), ManualClock::at(0));
        manager.get_token().await.expect("first token");
        manager.get_token().await.expect("second token");
        assert_eq!(manager.endpoint().exchanges(), 2);
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_exchange() {
        let manager = Arc::new(TokenManager::with_clock(
            StubTokenEndpoint::issuing(3600),
            ManualClock::at(0),
        ));
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.get_token().await })
            })
            .collect();
        for task in tasks {
            let token = task.await.expect("join").expect("token");
            assert_eq!(token, "token-1");
        }
        assert_eq!(manager.endpoint().exchanges(), 1);
    }

    #[rstest]
    fn grant_requires_both_fields() {
        let missing: Result<TokenGrant, _> =
            serde_json::from_str(r#"{"access_token":"abc"}"#);
        assert!(missing.is_err());
        let grant: TokenGrant =
            serde_json::from_str(r#"{"access_token":"abc","expires_in":3600,"scope":"x"}"#)
                .expect("valid grant");
        assert_eq!(grant.expires_in, 3600);
    }
}
