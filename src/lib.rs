// Library root - exports for the binaries and tests

pub mod background;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

pub use config::Config;
pub use routes::build_router;

use database::DatabasePool;
use services::mailer::Mailer;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DatabasePool,
    pub config: Arc<Config>,
    pub mailer: Arc<dyn Mailer>,
}
