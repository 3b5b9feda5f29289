//! Deterministic partner doubles.
//!
//! [`StubPartnerSource`] serves fixed record lists page by page,
//! [`StubTokenEndpoint`] issues numbered tokens and [`ManualClock`] only
//! moves when told to.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use pickup_core::{CityRecord, PointRecord, RegionRecord};

use super::token::{AuthenticationError, Clock, TokenEndpoint, TokenGrant};
use super::{PartnerError, PartnerResource, PartnerSource};

#[derive(Debug, Default)]
struct StubFeed {
    regions: Vec<RegionRecord>,
    cities: Vec<CityRecord>,
    points: Vec<PointRecord>,
    failure: Option<(PartnerResource, u16)>,
    requests: Vec<(PartnerResource, u32, u32)>,
}

/// In-memory [`PartnerSource`] slicing fixed lists into pages.
///
/// Page `n` of size `s` holds records `n * s .. (n + 1) * s`, so paging past
/// the end yields the empty page that stops a sync stage.
#[derive(Debug, Default)]
pub struct StubPartnerSource {
    feed: Mutex<StubFeed>,
}

impl StubPartnerSource {
    /// Create a source with no records.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn feed(&self) -> MutexGuard<'_, StubFeed> {
        self.feed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn feed_mut(&mut self) -> &mut StubFeed {
        self.feed.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serve these regions.
    #[must_use]
    pub fn with_regions(mut self, regions: Vec<RegionRecord>) -> Self {
        self.feed_mut().regions = regions;
        self
    }

    /// Serve these cities.
    #[must_use]
    pub fn with_cities(mut self, cities: Vec<CityRecord>) -> Self {
        self.feed_mut().cities = cities;
        self
    }

    /// Serve these points.
    #[must_use]
    pub fn with_points(mut self, points: Vec<PointRecord>) -> Self {
        self.feed_mut().points = points;
        self
    }

    /// Swap the point feed between runs.
    pub fn replace_points(&self, points: Vec<PointRecord>) {
        self.feed().points = points;
    }

    /// Answer every request for `resource` with an HTTP error.
    pub fn fail_with_status(&self, resource: PartnerResource, status: u16) {
        self.feed().failure = Some((resource, status));
    }

    /// Stop failing.
    pub fn clear_failure(&self) {
        self.feed().failure = None;
    }

    /// Every `(resource, page, size)` requested so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<(PartnerResource, u32, u32)> {
        self.feed().requests.clone()
    }

    fn serve<T: Clone>(
        &self,
        resource: PartnerResource,
        page: u32,
        size: u32,
        select: impl FnOnce(&StubFeed) -> &[T],
    ) -> Result<Vec<T>, PartnerError> {
        let mut feed = self.feed();
        feed.requests.push((resource, page, size));
        if let Some((failing, status)) = feed.failure
            && failing == resource
        {
            return Err(PartnerError::Http {
                url: format!("stub://{}", resource.path()),
                status,
            });
        }
        let size = usize::try_from(size).unwrap_or(usize::MAX);
        let skip = usize::try_from(page)
            .unwrap_or(usize::MAX)
            .saturating_mul(size);
        Ok(select(&*feed).iter().skip(skip).take(size).cloned().collect())
    }
}

#[async_trait]
impl PartnerSource for StubPartnerSource {
    async fn regions(&self, page: u32, size: u32) -> Result<Vec<RegionRecord>, PartnerError> {
        self.serve(PartnerResource::Regions, page, size, |feed| feed.regions.as_slice())
    }

    async fn cities(&self, page: u32, size: u32) -> Result<Vec<CityRecord>, PartnerError> {
        self.serve(PartnerResource::Cities, page, size, |feed| feed.cities.as_slice())
    }

    async fn points(&self, page: u32, size: u32) -> Result<Vec<PointRecord>, PartnerError> {
        self.serve(PartnerResource::Points, page, size, |feed| feed.points.as_slice())
    }
}

/// [`TokenEndpoint`] issuing `token-1`, `token-2`, ... on successive calls.
#[derive(Debug)]
pub struct StubTokenEndpoint {
    expires_in: i64,
    rejecting: Mutex<Option<u16>>,
    exchanges: AtomicUsize,
}

impl StubTokenEndpoint {
    /// Issue tokens advertising `expires_in` seconds of validity.
    #[must_use]
    pub fn issuing(expires_in: i64) -> Self {
        Self {
            expires_in,
            rejecting: Mutex::new(None),
            exchanges: AtomicUsize::new(0),
        }
    }

    /// Reject subsequent exchanges with `status`, or accept them again.
    pub fn set_rejecting(&self, status: Option<u16>) {
        *self.rejecting.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    /// Number of exchanges attempted, including rejected ones.
    #[must_use]
    pub fn exchanges(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenEndpoint for StubTokenEndpoint {
    async fn exchange(&self) -> Result<TokenGrant, AuthenticationError> {
        let attempt = self.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
        let rejecting = *self.rejecting.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(status) = rejecting {
            return Err(AuthenticationError::Rejected {
                url: "stub://oauth/token".to_owned(),
                status,
            });
        }
        // Yield so concurrent callers get a chance to race the cache lock.
        tokio::task::yield_now().await;
        Ok(TokenGrant {
            access_token: format!("token-{attempt}"),
            expires_in: self.expires_in,
        })
    }
}

/// [`Clock`] that only advances when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    /// Start at `now_ms` milliseconds since the epoch.
    #[must_use]
    pub fn at(now_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
        }
    }

    /// Move forwards by `elapsed`.
    pub fn advance(&self, elapsed: Duration) {
        let millis = i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX);
        self.now_ms.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
