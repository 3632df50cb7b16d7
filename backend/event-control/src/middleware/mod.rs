pub mod admin_auth;
pub mod request_metrics;

pub use admin_auth::{AdminAuthMiddleware, AdminId};
pub use request_metrics::RequestMetrics;
