//! Sliding-window rate limiter.
//!
//! Each caller owns a chronologically ordered queue of admitted timestamps.
//! Before every decision the queue is trimmed of timestamps at or before
//! `now - window_size`; the caller is admitted while fewer than
//! `max_requests` timestamps survive. A caller whose queue empties is
//! removed from the map, so inactive callers retain no state.

use std::borrow::Borrow;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::hash::Hash;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace};

use super::backend::RateLimiter;
use crate::error::{LimiterError, Result};

/// A moving-window limiter allowing at most `max_requests` actions per
/// caller in any trailing `window_size` seconds.
///
/// This struct is thread-safe and can be shared across threads. Per-caller
/// queues live in a sharded map; `record_act` holds the caller's shard lock
/// for the whole trim, check and append sequence.
pub struct SlidingWindowLimiter<K> {
    /// Admitted timestamps per caller, oldest first
    windows: DashMap<K, VecDeque<f64>>,
    /// Window length in seconds
    window_size: f64,
    /// Maximum admitted actions per window
    max_requests: usize,
}

impl<K> SlidingWindowLimiter<K>
where
    K: Hash + Eq + Clone + Debug + Send + Sync,
{
    /// Create a new sliding-window limiter.
    ///
    /// Fails with [`LimiterError::Config`] if `window_size` is not a positive
    /// finite number or `max_requests` is zero.
    pub fn new(window_size: f64, max_requests: usize) -> Result<Self> {
        if !window_size.is_finite() || window_size <= 0.0 {
            return Err(LimiterError::Config(format!(
                "window_size must be a positive number of seconds, got {}",
                window_size
            )));
        }
        if max_requests == 0 {
            return Err(LimiterError::Config(
                "max_requests must be greater than zero".to_string(),
            ));
        }

        debug!(window_size, max_requests, "Creating sliding-window limiter");
        Ok(Self {
            windows: DashMap::new(),
            window_size,
            max_requests,
        })
    }

    /// Get the window length in seconds.
    pub fn window_size(&self) -> f64 {
        self.window_size
    }

    /// Get the maximum number of actions per window.
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Get the number of timestamps still counted for `key` at `now`.
    pub fn request_count<Q>(&self, key: &Q, now: f64) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.cleanup(key, now).map_or(0, |(count, _)| count)
    }

    /// Trim every caller's window and drop callers with nothing left.
    ///
    /// Returns the number of callers removed.
    pub fn purge_expired(&self, now: f64) -> usize {
        let cutoff = now - self.window_size;
        let mut removed = 0;

        self.windows.retain(|_, window| {
            evict_expired(window, cutoff);
            if window.is_empty() {
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            debug!(removed, now, "Purged expired sliding windows");
        }
        removed
    }

    /// Trim expired timestamps for `key`.
    ///
    /// Returns the surviving count and the oldest surviving timestamp, or
    /// `None` if the caller has no state left.
    fn cleanup<Q>(&self, key: &Q, now: f64) -> Option<(usize, f64)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let cutoff = now - self.window_size;
        let survivors = {
            let mut window = self.windows.get_mut(key)?;
            evict_expired(&mut window, cutoff);
            window.front().map(|&oldest| (window.len(), oldest))
        };

        if survivors.is_none() {
            // Re-checked under the shard lock: a concurrent record_act may have refilled it.
            self.windows.remove_if(key, |_, window| window.is_empty());
            trace!(now, "Dropped empty sliding window");
        }
        survivors
    }
}

impl<K> RateLimiter for SlidingWindowLimiter<K>
where
    K: Hash + Eq + Clone + Debug + Send + Sync,
{
    type Key = K;

    fn may_act<Q>(&self, key: &Q, now: f64) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        self.request_count(key, now) < self.max_requests
    }

    fn record_act<Q>(&self, key: &Q, now: f64) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        let cutoff = now - self.window_size;

        match self.windows.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) => {
                let window = occupied.get_mut();
                evict_expired(window, cutoff);
                let count = window.len();

                if count < self.max_requests {
                    window.push_back(now);
                    trace!(key = ?occupied.key(), count = count + 1, now, "Action recorded");
                    true
                } else {
                    debug!(
                        key = ?occupied.key(),
                        count,
                        limit = self.max_requests,
                        now,
                        "Rate limit exceeded"
                    );
                    false
                }
            }
            Entry::Vacant(vacant) => {
                trace!(key = ?vacant.key(), now, "Action recorded for new caller");
                vacant.insert(VecDeque::from([now]));
                true
            }
        }
    }

    fn time_until_allowed<Q>(&self, key: &Q, now: f64) -> f64
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        match self.cleanup(key, now) {
            Some((count, oldest)) if count >= self.max_requests => {
                (oldest + self.window_size - now).max(0.0)
            }
            _ => 0.0,
        }
    }

    fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    fn clear(&self) {
        self.windows.clear();
    }
}

/// Pop timestamps at or before `cutoff` off the front of `window`.
///
/// Relies on `window` being in ascending order.
fn evict_expired(window: &mut VecDeque<f64>, cutoff: f64) {
    while window.front().is_some_and(|&ts| ts <= cutoff) {
        window.pop_front();
    }
}
