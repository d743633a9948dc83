//! Rate limiting windows and admission decisions.

mod set;
mod window;

pub use set::RateWindowSet;
pub use window::{RateLimitRule, RateWindow};
