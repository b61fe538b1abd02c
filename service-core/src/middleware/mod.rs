pub mod rate_limit;
pub mod tracing;

pub use rate_limit::{
    MultiWindowRateLimiter, RateLimitExceeded, RateWindow, ip_rate_limit_middleware,
};
pub use self::tracing::{REQUEST_ID_HEADER, request_id_middleware};
