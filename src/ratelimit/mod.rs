pub mod limiter;
pub mod window;

pub use limiter::{RateLimiter, RouteLimits};
pub use window::RateWindow;
