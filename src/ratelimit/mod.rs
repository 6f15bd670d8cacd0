//! Rate limiting logic and state management.

mod clock;
mod counter;
pub mod identity;
mod key;
mod limiter;
mod registry;
mod rules;

pub use clock::{Clock, ManualClock, SystemClock};
pub use counter::CounterEntry;
pub use identity::{client_identifier, RequestContext};
pub use key::RateLimitKey;
pub use registry::Registry;
pub use limiter::{Admission, RateLimitExceeded, RateLimiter, RateLimiterConfig};
pub use rules::{ActionRule, ActionRules};
