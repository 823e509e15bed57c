//! Per-principal rate limiting. The numeric window is configurable; the
//! algorithm is GCRA via `governor`.

use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;

pub struct RateLimitRegistry {
    limiter: RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>,
    clock: DefaultClock,
}

impl RateLimitRegistry {
    pub fn new(requests_per_period: u32, period: Duration, burst_size: u32) -> Self {
        let requests_per_period = requests_per_period.max(1);
        let per_request = period / requests_per_period;
        let quota = Quota::with_period(per_request)
            .expect("non-zero period")
            .allow_burst(NonZeroU32::new(burst_size.max(1)).expect("non-zero burst"));
        Self {
            limiter: RateLimiter::keyed(quota),
            clock: DefaultClock::default(),
        }
    }

    /// `Ok(())` if the principal's bucket has capacity; `Err(retry_after)`
    /// with a wait-time hint otherwise.
    pub fn check(&self, principal_id: &str) -> Result<(), Duration> {
        match self.limiter.check_key(&principal_id.to_string()) {
            Ok(()) => Ok(()),
            Err(not_until) => Err(not_until.wait_time_from(self.clock.now())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_requests_within_burst() {
        let registry = RateLimitRegistry::new(60, Duration::from_secs(60), 3);
        for _ in 0..3 {
            assert!(registry.check("principal-1").is_ok());
        }
    }

    #[test]
    fn rejects_once_burst_is_exhausted() {
        let registry = RateLimitRegistry::new(60, Duration::from_secs(60), 1);
        assert!(registry.check("principal-1").is_ok());
        assert!(registry.check("principal-1").is_err());
    }

    #[test]
    fn buckets_are_independent_per_principal() {
        let registry = RateLimitRegistry::new(60, Duration::from_secs(60), 1);
        assert!(registry.check("principal-1").is_ok());
        assert!(registry.check("principal-2").is_ok());
    }
}
