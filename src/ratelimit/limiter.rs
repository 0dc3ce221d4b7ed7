//! Strategy selection and clock binding.

use std::borrow::Borrow;
use std::fmt::Debug;
use std::hash::Hash;

use tracing::info;

use super::backend::RateLimiter;
use super::clock::TimeSource;
use super::sliding_window::SlidingWindowLimiter;
use super::throttle::ThrottleLimiter;
use crate::config::{LimiterConfig, StrategyConfig};
use crate::error::Result;

/// A limiter whose strategy is chosen at runtime.
///
/// Both variants honour the same [`RateLimiter`] contract, so callers can
/// switch strategy through configuration alone.
pub enum Limiter<K> {
    /// Moving-window counter
    SlidingWindow(SlidingWindowLimiter<K>),
    /// Fixed-interval throttle
    Throttle(ThrottleLimiter<K>),
}

impl<K> Limiter<K>
where
    K: Hash + Eq + Clone + Debug + Send + Sync,
{
    /// Build a limiter from configuration.
    pub fn from_config(config: &LimiterConfig) -> Result<Self> {
        let limiter = match config.strategy {
            StrategyConfig::SlidingWindow {
                window_size_secs,
                max_requests,
            } => Limiter::SlidingWindow(SlidingWindowLimiter::new(
                window_size_secs,
                max_requests,
            )?),
            StrategyConfig::Throttle {
                min_interval_secs,
                retention_secs: Some(retention),
            } => Limiter::Throttle(ThrottleLimiter::with_retention(
                min_interval_secs,
                retention,
            )?),
            StrategyConfig::Throttle {
                min_interval_secs,
                retention_secs: None,
            } => Limiter::Throttle(ThrottleLimiter::new(min_interval_secs)?),
        };

        info!(strategy = limiter.strategy_name(), "Rate limiter initialized");
        Ok(limiter)
    }

    /// Get a short name for the active strategy.
    pub fn strategy_name(&self) -> &'static str {
        match self {
            Limiter::SlidingWindow(_) => "sliding_window",
            Limiter::Throttle(_) => "throttle",
        }
    }
}

impl<K> RateLimiter for Limiter<K>
where
    K: Hash + Eq + Clone + Debug + Send + Sync,
{
    type Key = K;

    fn may_act<Q>(&self, key: &Q, now: f64) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        match self {
            Limiter::SlidingWindow(inner) => inner.may_act(key, now),
            Limiter::Throttle(inner) => inner.may_act(key, now),
        }
    }

    fn record_act<Q>(&self, key: &Q, now: f64) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        match self {
            Limiter::SlidingWindow(inner) => inner.record_act(key, now),
            Limiter::Throttle(inner) => inner.record_act(key, now),
        }
    }

    fn time_until_allowed<Q>(&self, key: &Q, now: f64) -> f64
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        match self {
            Limiter::SlidingWindow(inner) => inner.time_until_allowed(key, now),
            Limiter::Throttle(inner) => inner.time_until_allowed(key, now),
        }
    }

    fn tracked_keys(&self) -> usize {
        match self {
            Limiter::SlidingWindow(inner) => inner.tracked_keys(),
            Limiter::Throttle(inner) => inner.tracked_keys(),
        }
    }

    fn clear(&self) {
        match self {
            Limiter::SlidingWindow(inner) => inner.clear(),
            Limiter::Throttle(inner) => inner.clear(),
        }
    }
}

/// A limiter paired with the clock it reads "now" from.
pub struct Clocked<L, C> {
    limiter: L,
    clock: C,
}

impl<L, C> Clocked<L, C>
where
    L: RateLimiter,
    C: TimeSource,
{
    /// Bind `limiter` to `clock`.
    pub fn new(limiter: L, clock: C) -> Self {
        Self { limiter, clock }
    }

    /// Returns whether `key` may act now.
    pub fn may_act<Q>(&self, key: &Q) -> bool
    where
        L::Key: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = L::Key> + ?Sized,
    {
        self.limiter.may_act(key, self.clock.now())
    }

    /// Records an action for `key` now if it is admitted.
    pub fn record_act<Q>(&self, key: &Q) -> bool
    where
        L::Key: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = L::Key> + ?Sized,
    {
        self.limiter.record_act(key, self.clock.now())
    }

    /// Returns the number of seconds until `key` may act again.
    pub fn time_until_allowed<Q>(&self, key: &Q) -> f64
    where
        L::Key: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = L::Key> + ?Sized,
    {
        self.limiter.time_until_allowed(key, self.clock.now())
    }

    /// Get the wrapped limiter.
    pub fn limiter(&self) -> &L {
        &self.limiter
    }

    /// Get the clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::ManualClock;

    #[test]
    fn test_from_config_picks_strategy() {
        let limiter = Limiter::<String>::from_config(&LimiterConfig::default()).unwrap();
        assert_eq!(limiter.strategy_name(), "sliding_window");

        let config = LimiterConfig {
            strategy: StrategyConfig::throttle(),
        };
        let limiter = Limiter::<String>::from_config(&config).unwrap();
        assert_eq!(limiter.strategy_name(), "throttle");
    }

    #[test]
    fn test_from_config_with_retention() {
        let config = LimiterConfig {
            strategy: StrategyConfig::Throttle {
                min_interval_secs: 1.0,
                retention_secs: Some(30.0),
            },
        };

        match Limiter::<String>::from_config(&config).unwrap() {
            Limiter::Throttle(inner) => assert_eq!(inner.retention(), Some(30.0)),
            Limiter::SlidingWindow(_) => panic!("expected a throttle"),
        }
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let config = LimiterConfig {
            strategy: StrategyConfig::SlidingWindow {
                window_size_secs: 0.0,
                max_requests: 1,
            },
        };
        assert!(Limiter::<String>::from_config(&config).is_err());
    }

    #[test]
    fn test_limiter_delegates() {
        let limiter = Limiter::<String>::from_config(&LimiterConfig::default()).unwrap();

        assert!(limiter.record_act("1", 0.0));
        assert!(!limiter.may_act("1", 5.0));
        assert_eq!(limiter.time_until_allowed("1", 5.0), 5.0);
        assert_eq!(limiter.tracked_keys(), 1);

        limiter.clear();
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn test_clocked_reads_clock() {
        let clock = ManualClock::new(0.0);
        let limiter = Clocked::new(ThrottleLimiter::<String>::new(10.0).unwrap(), clock.clone());

        assert!(limiter.record_act("1"));

        clock.set(9.5);
        assert!(!limiter.may_act("1"));
        assert!(!limiter.record_act("1"));
        assert_eq!(limiter.time_until_allowed("1"), 0.5);

        clock.advance(0.5);
        assert!(limiter.record_act("1"));
        assert_eq!(limiter.clock().now(), 10.0);
        assert_eq!(limiter.limiter().tracked_keys(), 1);
    }
}
