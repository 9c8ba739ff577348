use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;

pub const NOTIFY_BURST: u32 = 10;
pub const NOTIFY_RATE_PER_SEC: u32 = 8;
pub const NOTIFY_PREFIX: &str = "[VoiceLink] ";

/// Burst of [`NOTIFY_BURST`], refilled at [`NOTIFY_RATE_PER_SEC`].
pub fn notify_quota() -> Quota {
    let rate = NonZeroU32::new(NOTIFY_RATE_PER_SEC).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(NOTIFY_BURST).unwrap_or(NonZeroU32::MIN);
    Quota::per_second(rate).allow_burst(burst)
}

/// Rate-limited, prefixed user notifications. Starts with a full burst.
pub struct Notifier<C: Clock = DefaultClock> {
    limiter: RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<C::Instant>>,
}

impl<C: Clock> Notifier<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            limiter: RateLimiter::direct_with_clock(notify_quota(), clock),
        }
    }

    /// The prefixed text if it may be shown now.
    pub fn admit(&self, text: &str) -> Option<String> {
        self.limiter
            .check()
            .is_ok()
            .then(|| format!("{NOTIFY_PREFIX}{text}"))
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::with_clock(DefaultClock::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use governor::clock::FakeRelativeClock;
    use std::time::Duration;

    fn fake() -> (FakeRelativeClock, Notifier<FakeRelativeClock>) {
        let clock = FakeRelativeClock::default();
        let notifier = Notifier::with_clock(clock.clone());
        (clock, notifier)
    }

    #[test]
    fn burst_then_refill() {
        let (clock, n) = fake();
        for _ in 0..10 {
            assert!(n.admit("x").is_some());
        }
        assert!(n.admit("x").is_none());
        clock.advance(Duration::from_millis(100));
        assert!(n.admit("x").is_none());
        clock.advance(Duration::from_millis(30));
        assert!(n.admit("x").is_some());
        assert!(n.admit("x").is_none());
    }

    #[test]
    fn refill_caps_at_burst() {
        let (clock, n) = fake();
        assert!(n.admit("x").is_some());
        clock.advance(Duration::from_secs(60));
        let taken = (0..20).filter(|_| n.admit("x").is_some()).count();
        assert_eq!(taken, 10);
    }

    #[test]
    fn notifier_prefixes() {
        let n = Notifier::default();
        assert_eq!(
            n.admit("Runtime connected").as_deref(),
            Some("[VoiceLink] Runtime connected")
        );
    }
}
