use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::middleware::auth::auth_middleware;
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/api/copy-records", post(handlers::copy_records))
        .route(
            "/api/scheduled-events",
            get(handlers::list_scheduled_events).post(handlers::create_scheduled_event),
        )
        .route(
            "/api/scheduled-events/:id",
            get(handlers::get_scheduled_event).delete(handlers::delete_scheduled_event),
        )
        .route("/api/library-years", get(handlers::list_library_years))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health_check))
        // Platform cron issues GET; manual triggers tend to POST.
        .route(
            "/api/cron/process-scheduled-events",
            get(handlers::process_scheduled_events).post(handlers::process_scheduled_events),
        )
        .merge(admin)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
