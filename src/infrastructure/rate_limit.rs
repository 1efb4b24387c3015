use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::net::IpAddr;
use std::num::NonZeroU32;
use tracing::debug;

/// Per-client-IP throttle for the credential endpoints (register, login, verify,
/// password reset and change). The budget refills evenly over a minute.
pub struct AuthRateLimiter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
    per_minute: NonZeroU32,
}

impl AuthRateLimiter {
    /// A zero budget falls back to one request per minute.
    pub fn new(per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::keyed(Quota::per_minute(per_minute)),
            per_minute,
        }
    }

    pub fn per_minute(&self) -> u32 {
        self.per_minute.get()
    }

    /// Consume one request for `ip`. `false` means the caller is over budget.
    pub fn check(&self, ip: IpAddr) -> bool {
        self.limiter.check_key(&ip).is_ok()
    }

    /// Forget clients whose budget has fully refilled.
    pub fn purge_idle(&self) -> usize {
        let before = self.limiter.len();
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        let purged = before.saturating_sub(self.limiter.len());
        if purged > 0 {
            debug!(purged, "Dropped idle rate limit keys");
        }
        purged
    }
}
