use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};

use consortium_stats_api::background::BackgroundScheduler;
use consortium_stats_api::services::mailer;
use consortium_stats_api::{build_router, database, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    init_tracing();
    info!("Starting consortium statistics API...");

    let config = Arc::new(Config::from_env()?);
    info!(timezone = %config.schedule_timezone, email = ?config.email.provider, "Configuration loaded");

    let db_pool = database::new_pool(&config.database_url).await?;
    info!("Database connection pool created");
    database::run_migrations(&db_pool).await?;

    let mailer = mailer::from_config(&config.email)?;

    let app_state = AppState {
        db_pool: db_pool.clone(),
        config: config.clone(),
        mailer,
    };

    let mut scheduler = match config.cron_schedule.as_deref() {
        Some(expr) => Some(BackgroundScheduler::new(app_state.clone(), expr).await?),
        None => {
            info!("CRON_SCHEDULE not set; scheduled events run only via /api/cron/process-scheduled-events");
            None
        }
    };

    let app = build_router(app_state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutting down gracefully...");
        }
    }

    if let Some(scheduler) = scheduler.as_mut() {
        scheduler.shutdown().await;
    }

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "consortium_stats_api=debug,tower_http=debug".into());

    if std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false) {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
