//! Rate limiter trait shared by every strategy.

use std::borrow::Borrow;
use std::hash::Hash;

/// The three-operation contract every limiter strategy implements.
///
/// Timestamps are seconds as `f64`. For a given limiter, `now` must be
/// non-decreasing across calls; passing an earlier `now` than one already
/// recorded for the same key is a caller error and produces unspecified
/// (but memory-safe) decisions.
///
/// `may_act` followed by a separate `record_act` is a check-then-act
/// sequence and is not atomic: another caller may be admitted in between.
/// Use `record_act` alone when the decision must also reserve the slot.
pub trait RateLimiter: Send + Sync {
    /// The caller key type.
    type Key: Hash + Eq;

    /// Returns whether `key` may act at `now` without recording an action.
    fn may_act<Q>(&self, key: &Q, now: f64) -> bool
    where
        Self::Key: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = Self::Key> + ?Sized;

    /// Records an action for `key` at `now` if it is admitted.
    ///
    /// Returns `true` if the action was admitted and recorded.
    fn record_act<Q>(&self, key: &Q, now: f64) -> bool
    where
        Self::Key: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = Self::Key> + ?Sized;

    /// Returns the number of seconds until `key` may act again, or `0.0`.
    fn time_until_allowed<Q>(&self, key: &Q, now: f64) -> f64
    where
        Self::Key: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = Self::Key> + ?Sized;

    /// Get the number of callers with retained state.
    fn tracked_keys(&self) -> usize;

    /// Drop all per-caller state.
    fn clear(&self);
}
