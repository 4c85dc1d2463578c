//! Rate-limited structurer wrapper.
//!
//! Wraps any Structurer implementation with rate limiting using the
//! governor crate, so batch ingestion respects the external interface's
//! throughput limits.

use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};

use crate::error::Result;
use crate::traits::structurer::{StructureRequest, StructuredPayload, Structurer};

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A structurer wrapper that enforces rate limits.
pub struct RateLimitedStructurer<S: Structurer> {
    inner: S,
    limiter: Arc<DefaultRateLimiter>,
}

impl<S: Structurer> RateLimitedStructurer<S> {
    /// Create a new rate-limited structurer.
    ///
    /// # Arguments
    /// * `structurer` - The underlying structurer to wrap
    /// * `requests_per_second` - Maximum structuring calls per second
    pub fn new(structurer: S, requests_per_second: u32) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(requests_per_second).expect("requests_per_second must be > 0"),
        );
        Self {
            inner: structurer,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Create with a custom quota.
    pub fn with_quota(structurer: S, quota: Quota) -> Self {
        Self {
            inner: structurer,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Create with burst support.
    pub fn with_burst(structurer: S, requests_per_second: u32, burst: u32) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(requests_per_second).expect("requests_per_second must be > 0"),
        )
        .allow_burst(NonZeroU32::new(burst).expect("burst must be > 0"));

        Self {
            inner: structurer,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }
}

#[async_trait]
impl<S: Structurer> Structurer for RateLimitedStructurer<S> {
    async fn structure(&self, request: &StructureRequest) -> Result<StructuredPayload> {
        // Wait for a permit before each call
        self.limiter.until_ready().await;
        self.inner.structure(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockStructurer;
    use chrono::Utc;

    #[tokio::test]
    async fn test_passes_calls_through() {
        let mock = MockStructurer::new();
        let limited = RateLimitedStructurer::with_burst(mock.clone(), 100, 10);

        let request = StructureRequest {
            instruction: "structure".to_string(),
            raw_text: "공지".to_string(),
            anchor: Utc::now(),
        };

        let payload = limited.structure(&request).await.unwrap();
        assert_eq!(payload.category, "notice");
        assert_eq!(mock.call_count(), 1);
    }
}
