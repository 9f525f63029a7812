//! Progress plumbing shared by transfers and compression.

mod rate;
mod throttle;

pub use rate::RateEstimator;
pub use throttle::{ProgressThrottle, TRANSFER_PROGRESS_INTERVAL};
