//! Minimum-spacing throttle for outbound calls to the remote food API.
//!
//! Each [`ApiCategory`] has its own slot. Reserving a slot is a single
//! read-compute-write under a narrow lock: the next permitted instant is
//! `max(now, last + interval)`, and it becomes the new `last` before the lock
//! is released. Any waiting happens afterwards, outside the lock, so
//! concurrent callers queue up behind each other at `interval` spacing
//! instead of all observing the same stale timestamp.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Upstream search quota is 10/min.
pub const DEFAULT_SEARCH_INTERVAL: Duration = Duration::from_millis(6100);
/// Upstream product quota is 100/min.
pub const DEFAULT_PRODUCT_INTERVAL: Duration = Duration::from_millis(700);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiCategory {
    /// Free-text batch search.
    Search,
    /// Single product by barcode.
    Product,
}

impl ApiCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Product => "product",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub search: Duration,
    pub product: Duration,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            search: DEFAULT_SEARCH_INTERVAL,
            product: DEFAULT_PRODUCT_INTERVAL,
        }
    }
}

#[derive(Debug)]
struct Slot {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Slot {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    /// Claim the next slot at or after `now` and return how long to wait for it.
    fn reserve(&self, now: Instant) -> Duration {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = match *last {
            Some(prev) => (prev + self.interval).max(now),
            None => now,
        };
        *last = Some(slot);
        slot - now
    }

    fn try_reserve(&self, now: Instant) -> Result<(), Duration> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(prev) = *last {
            let next = prev + self.interval;
            if next > now {
                return Err(next - now);
            }
        }
        *last = Some(now);
        Ok(())
    }
}

/// Per-category throttle state. Never persisted; a new limiter starts with no prior call.
#[derive(Debug)]
pub struct RateLimiter {
    search: Slot,
    product: Slot,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimits::default())
    }
}

impl RateLimiter {
    #[must_use]
    pub fn new(limits: RateLimits) -> Self {
        Self {
            search: Slot::new(limits.search),
            product: Slot::new(limits.product),
        }
    }

    /// A limiter that never waits.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(RateLimits {
            search: Duration::ZERO,
            product: Duration::ZERO,
        })
    }

    fn slot(&self, category: ApiCategory) -> &Slot {
        match category {
            ApiCategory::Search => &self.search,
            ApiCategory::Product => &self.product,
        }
    }

    #[must_use]
    pub fn interval(&self, category: ApiCategory) -> Duration {
        self.slot(category).interval
    }

    /// Reserve the next call slot and return the wait before it may be used.
    pub fn reserve(&self, category: ApiCategory) -> Duration {
        self.slot(category).reserve(Instant::now())
    }

    /// Take the slot only if it is free right now; otherwise report the remaining wait.
    pub fn try_acquire(&self, category: ApiCategory) -> Result<(), Duration> {
        self.slot(category).try_reserve(Instant::now())
    }

    /// Block the calling thread until a call in `category` is permitted.
    pub fn acquire(&self, category: ApiCategory) {
        let wait = self.reserve(category);
        if !wait.is_zero() {
            tracing::debug!(
                category = category.as_str(),
                wait_ms = wait.as_millis(),
                "throttling remote call"
            );
            std::thread::sleep(wait);
        }
    }
}
