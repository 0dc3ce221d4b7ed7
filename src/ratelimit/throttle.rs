//! Fixed-interval throttle.
//!
//! A caller is admitted if it has never been admitted before, or if at least
//! `min_interval` seconds have passed since its last admission.

use std::borrow::Borrow;
use std::fmt::Debug;
use std::hash::Hash;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::backend::RateLimiter;
use crate::error::{LimiterError, Result};

/// A limiter allowing at most one action per caller per `min_interval`.
///
/// Entries are kept indefinitely unless a retention horizon is configured
/// with [`ThrottleLimiter::with_retention`].
pub struct ThrottleLimiter<K> {
    /// Last admitted timestamp per caller
    last_admitted: DashMap<K, f64>,
    /// Cooldown between admissions in seconds
    min_interval: f64,
    /// Periodic eviction horizon, if enabled
    retention: Option<f64>,
    /// Time of the last periodic sweep
    last_sweep: Mutex<f64>,
}

impl<K> ThrottleLimiter<K>
where
    K: Hash + Eq + Clone + Debug + Send + Sync,
{
    /// Create a new throttle that never evicts callers.
    pub fn new(min_interval: f64) -> Result<Self> {
        validate_interval(min_interval)?;

        debug!(min_interval, "Creating throttle limiter");
        Ok(Self {
            last_admitted: DashMap::new(),
            min_interval,
            retention: None,
            last_sweep: Mutex::new(f64::NEG_INFINITY),
        })
    }

    /// Create a throttle that sweeps out callers idle for `retention` seconds.
    ///
    /// `retention` must be at least `min_interval`, so an evicted caller is
    /// always one that would have been admitted anyway. Sweeps run from
    /// `record_act` at most once per `retention` seconds.
    pub fn with_retention(min_interval: f64, retention: f64) -> Result<Self> {
        validate_interval(min_interval)?;
        if !retention.is_finite() || retention < min_interval {
            return Err(LimiterError::Config(format!(
                "retention ({}) must be a finite number of seconds no shorter than min_interval ({})",
                retention, min_interval
            )));
        }

        debug!(min_interval, retention, "Creating throttle limiter with retention");
        Ok(Self {
            last_admitted: DashMap::new(),
            min_interval,
            retention: Some(retention),
            last_sweep: Mutex::new(f64::NEG_INFINITY),
        })
    }

    /// Get the cooldown between admissions in seconds.
    pub fn min_interval(&self) -> f64 {
        self.min_interval
    }

    /// Get the retention horizon, if periodic eviction is enabled.
    pub fn retention(&self) -> Option<f64> {
        self.retention
    }

    /// Remove callers whose last admission is at least the retention horizon
    /// (or `min_interval`, when no retention is configured) before `now`.
    ///
    /// Returns the number of callers removed.
    pub fn evict_stale(&self, now: f64) -> usize {
        let horizon = self.retention.unwrap_or(self.min_interval);
        let mut removed = 0;

        self.last_admitted.retain(|_, last| {
            if now - *last >= horizon {
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            debug!(removed, now, "Evicted stale throttle entries");
        }
        removed
    }

    fn maybe_sweep(&self, now: f64) {
        let Some(retention) = self.retention else {
            return;
        };

        {
            let mut last_sweep = self.last_sweep.lock();
            if now - *last_sweep < retention {
                return;
            }
            *last_sweep = now;
        }
        self.evict_stale(now);
    }

    fn is_cooled_down(&self, last: f64, now: f64) -> bool {
        now - last >= self.min_interval
    }
}

impl<K> RateLimiter for ThrottleLimiter<K>
where
    K: Hash + Eq + Clone + Debug + Send + Sync,
{
    type Key = K;

    fn may_act<Q>(&self, key: &Q, now: f64) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        match self.last_admitted.get(key) {
            Some(last) => self.is_cooled_down(*last, now),
            None => true,
        }
    }

    fn record_act<Q>(&self, key: &Q, now: f64) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        // Must run before taking the entry lock: the sweep visits every shard.
        self.maybe_sweep(now);

        match self.last_admitted.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) => {
                let last = *occupied.get();
                if self.is_cooled_down(last, now) {
                    occupied.insert(now);
                    trace!(key = ?occupied.key(), now, "Action recorded");
                    true
                } else {
                    debug!(
                        key = ?occupied.key(),
                        last,
                        min_interval = self.min_interval,
                        now,
                        "Rate limit exceeded"
                    );
                    false
                }
            }
            Entry::Vacant(vacant) => {
                trace!(key = ?vacant.key(), now, "Action recorded for new caller");
                vacant.insert(now);
                true
            }
        }
    }

    fn time_until_allowed<Q>(&self, key: &Q, now: f64) -> f64
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        match self.last_admitted.get(key) {
            Some(last) if !self.is_cooled_down(*last, now) => {
                (*last + self.min_interval - now).max(0.0)
            }
            _ => 0.0,
        }
    }

    fn tracked_keys(&self) -> usize {
        self.last_admitted.len()
    }

    fn clear(&self) {
        self.last_admitted.clear();
    }
}

fn validate_interval(min_interval: f64) -> Result<()> {
    if !min_interval.is_finite() || min_interval <= 0.0 {
        return Err(LimiterError::Config(format!(
            "min_interval must be a positive number of seconds, got {}",
            min_interval
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn limiter(min_interval: f64) -> ThrottleLimiter<String> {
        ThrottleLimiter::new(min_interval).unwrap()
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        assert!(matches!(
            ThrottleLimiter::<String>::new(0.0),
            Err(LimiterError::Config(_))
        ));
        assert!(ThrottleLimiter::<String>::new(-3.0).is_err());
        assert!(ThrottleLimiter::<String>::new(f64::NAN).is_err());
        assert!(ThrottleLimiter::<String>::with_retention(10.0, 5.0).is_err());
        assert!(ThrottleLimiter::<String>::with_retention(10.0, f64::INFINITY).is_err());
        assert!(ThrottleLimiter::<String>::with_retention(10.0, 10.0).is_ok());
    }

    #[test]
    fn test_unseen_caller_is_allowed() {
        let limiter = limiter(10.0);

        // Even at time zero: an unseen caller has no cooldown to wait out
        assert!(limiter.may_act("1", 0.0));
        assert_eq!(limiter.time_until_allowed("1", 0.0), 0.0);
        assert!(limiter.record_act("1", 0.0));
    }

    #[test]
    fn test_interval_scenario() {
        let limiter = limiter(10.0);

        assert!(limiter.record_act("1", 0.0));

        assert!(!limiter.record_act("1", 9.9));
        let wait = limiter.time_until_allowed("1", 9.9);
        assert!((wait - 0.1).abs() < 1e-9, "wait was {}", wait);

        assert!(limiter.record_act("1", 10.0));
        assert_eq!(limiter.time_until_allowed("1", 10.0), 10.0);
    }

    #[test]
    fn test_denial_keeps_original_timestamp() {
        let limiter = limiter(4.0);

        assert!(limiter.record_act("user", 1.0));
        assert!(!limiter.record_act("user", 2.0));
        assert!(!limiter.record_act("user", 4.5));
        assert_eq!(limiter.time_until_allowed("user", 4.5), 0.5);
        assert!(limiter.record_act("user", 5.0));
    }

    #[test]
    fn test_keys_are_isolated() {
        let limiter = limiter(10.0);

        assert!(limiter.record_act("a", 0.0));
        assert!(!limiter.may_act("a", 1.0));
        assert!(limiter.may_act("b", 1.0));
        assert_eq!(limiter.time_until_allowed("b", 1.0), 0.0);
    }

    #[test]
    fn test_may_act_is_idempotent() {
        let limiter = limiter(10.0);
        limiter.record_act("user", 0.0);

        for _ in 0..5 {
            assert!(!limiter.may_act("user", 7.5));
            assert_eq!(limiter.time_until_allowed("user", 7.5), 2.5);
        }
    }

    #[test]
    fn test_entries_retained_without_retention() {
        let limiter = limiter(1.0);

        limiter.record_act("a", 0.0);
        limiter.record_act("b", 0.0);
        limiter.record_act("c", 1000.0);

        assert_eq!(limiter.tracked_keys(), 3);
        assert_eq!(limiter.retention(), None);
    }

    #[test]
    fn test_evict_stale_only_removes_cooled_down_callers() {
        let limiter = limiter(10.0);

        limiter.record_act("old", 0.0);
        limiter.record_act("boundary", 5.0);
        limiter.record_act("fresh", 12.0);

        assert_eq!(limiter.evict_stale(15.0), 2);
        assert_eq!(limiter.tracked_keys(), 1);
        assert!(!limiter.may_act("fresh", 15.0));
        assert_eq!(limiter.time_until_allowed("fresh", 15.0), 7.0);
    }

    #[test]
    fn test_periodic_eviction_with_retention() {
        let limiter = ThrottleLimiter::<String>::with_retention(1.0, 60.0).unwrap();

        // The first record_act sweeps an empty map and starts the period
        assert!(limiter.record_act("a", 0.0));
        assert!(limiter.record_act("b", 30.0));
        assert_eq!(limiter.tracked_keys(), 2);

        // Next sweep is due at 60.0: "a" is exactly 60s idle, "b" is not
        assert!(limiter.record_act("c", 60.0));
        assert_eq!(limiter.tracked_keys(), 2);
        assert!(limiter.may_act("a", 60.0));
        assert!(limiter.may_act("b", 60.0));
        assert!(!limiter.may_act("c", 60.5));
    }

    #[test]
    fn test_concurrent_record_admits_once_per_interval() {
        let limiter = limiter(10.0);
        let admitted = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..100 {
                        if limiter.record_act("shared", 3.0) {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        assert_eq!(admitted.load(Ordering::SeqCst), 1);
    }
}
