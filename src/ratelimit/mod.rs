//! Rate limiting strategies and per-caller state.

mod backend;
mod clock;
mod limiter;
mod sliding_window;
mod throttle;

pub use backend::RateLimiter;
pub use clock::{ManualClock, MonotonicClock, SystemClock, TimeSource};
pub use limiter::{Clocked, Limiter};
pub use sliding_window::SlidingWindowLimiter;
pub use throttle::ThrottleLimiter;
