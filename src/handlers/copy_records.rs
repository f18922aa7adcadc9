use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
    Extension,
};
use serde::Serialize;

use crate::error::{json_rejection, ApiError};
use crate::middleware::auth::AuthUser;
use crate::services::copy_records::{self, CopyReport, CopyRequest, PgCountsStore};
use crate::AppState;

#[derive(Serialize)]
pub struct CopyRecordsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: CopyReport,
}

pub async fn copy_records(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CopyRequest>, JsonRejection>,
) -> Result<Json<CopyRecordsResponse>, ApiError> {
    let Json(payload) = payload.map_err(json_rejection)?;
    tracing::info!(
        by = %user.subject,
        table = %payload.table,
        records = payload.record_ids.len(),
        target_year = payload.target_year,
        "Copy records requested"
    );

    let store = PgCountsStore::new((*state.db_pool).clone());
    let report = copy_records::copy_records(&store, &payload).await?;

    Ok(Json(CopyRecordsResponse {
        success: report.failed.is_empty(),
        report,
    }))
}
