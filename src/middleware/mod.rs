pub mod auth;

pub use auth::{auth_middleware, cron_authorized, AuthUser, Claims};
