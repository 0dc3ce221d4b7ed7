//! Ratewarden - per-caller admission control
//!
//! This crate decides whether an identified caller may perform an action now,
//! using one of two interchangeable strategies: a sliding-window counter or a
//! fixed-interval throttle. Both take the current time from the caller (or an
//! injected [`ratelimit::TimeSource`]) and never sleep.

pub mod config;
pub mod error;
pub mod ratelimit;
