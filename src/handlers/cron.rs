use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
};
use chrono::Utc;
use serde::Serialize;

use crate::error::{error_response, ApiError};
use crate::middleware::auth::cron_authorized;
use crate::services::event_processor::{EventProcessor, ProcessingReport};
use crate::services::schedule_store::PgScheduleRepository;
use crate::AppState;

#[derive(Serialize)]
pub struct CronResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: ProcessingReport,
}

/// Cron entry point: fire every pending event due today.
pub async fn process_scheduled_events(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CronResponse>, ApiError> {
    if !cron_authorized(&headers, &state.config) {
        tracing::warn!("Rejected unauthorized cron invocation");
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            Some("Missing or invalid cron credentials".to_string()),
        ));
    }

    let report = run_due_events(&state).await?;
    Ok(Json(CronResponse {
        success: report.is_success(),
        report,
    }))
}

/// Shared by the HTTP trigger and the in-process cron job.
pub async fn run_due_events(state: &AppState) -> Result<ProcessingReport, ApiError> {
    let repo = PgScheduleRepository::new((*state.db_pool).clone());
    let processor = EventProcessor::new(
        &repo,
        state.mailer.as_ref(),
        state.config.schedule_timezone,
        &state.config.app_base_url,
    );
    Ok(processor.run(Utc::now()).await?)
}
