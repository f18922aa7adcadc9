use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::Json,
    Extension,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{bad_request, json_rejection, path_rejection, query_rejection, ApiError, ServiceError};
use crate::middleware::auth::AuthUser;
use crate::models::{EventId, EventStatus, EventType, LibraryId, LibraryYear, ScheduledEvent};
use crate::services::copy_records::{MAX_YEAR, MIN_YEAR};
use crate::services::schedule_store::{self, NewScheduledEvent};
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScheduledEventRequest {
    pub event_type: String,
    #[serde(deserialize_with = "crate::utils::date::deserialize")]
    pub scheduled_date: NaiveDate,
    pub year: Option<i32>,
    pub library_ids: Option<Vec<LibraryId>>,
    pub subject: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub notify_members: bool,
}

impl CreateScheduledEventRequest {
    pub fn into_new_event(self, created_by: Option<String>) -> Result<NewScheduledEvent, ServiceError> {
        let event_type = EventType::from_str(&self.event_type).ok_or_else(|| {
            ServiceError::Validation(format!(
                "eventType must be BROADCAST, FORM_OPENING or FORM_CLOSING (got {})",
                self.event_type
            ))
        })?;

        let subject = self.subject.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let message = self.message.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        if event_type == EventType::Broadcast && (subject.is_none() || message.is_none()) {
            return Err(ServiceError::Validation(
                "A broadcast needs both a subject and a message".to_string(),
            ));
        }

        if let Some(year) = self.year {
            if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
                return Err(ServiceError::Validation(format!(
                    "year must be between {} and {}",
                    MIN_YEAR, MAX_YEAR
                )));
            }
        }

        let library_ids = match self.library_ids {
            Some(ids) if ids.iter().any(|id| *id <= 0) => {
                return Err(ServiceError::Validation("libraryIds must be positive".to_string()));
            }
            Some(ids) if ids.is_empty() => None,
            other => other,
        };

        Ok(NewScheduledEvent {
            event_type,
            scheduled_date: self.scheduled_date,
            year: self.year,
            library_ids,
            subject,
            message,
            notify_members: self.notify_members,
            created_by,
        })
    }
}

#[derive(Deserialize)]
pub struct ListEventsQuery {
    status: Option<String>,
}

pub async fn list_scheduled_events(
    params: Result<Query<ListEventsQuery>, QueryRejection>,
    State(state): State<AppState>,
) -> Result<Json<Vec<ScheduledEvent>>, ApiError> {
    let Query(params) = params.map_err(query_rejection)?;
    let status = match params.status.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => Some(
            EventStatus::from_str(s).ok_or_else(|| bad_request(format!("unknown status: {}", s)))?,
        ),
        None => None,
    };

    let events = schedule_store::list_events(&*state.db_pool, status)
        .await
        .map_err(ServiceError::from)?;
    Ok(Json(events))
}

pub async fn create_scheduled_event(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateScheduledEventRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ScheduledEvent>), ApiError> {
    let Json(payload) = payload.map_err(json_rejection)?;
    let new_event = payload.into_new_event(Some(user.subject.clone()))?;
    let event = schedule_store::insert_event(&*state.db_pool, &new_event)
        .await
        .map_err(ServiceError::from)?;

    tracing::info!(
        event_id = event.id,
        event_type = %event.event_type,
        scheduled_date = %event.scheduled_date,
        by = %user.subject,
        "Scheduled event created"
    );
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn get_scheduled_event(
    id: Result<Path<EventId>, PathRejection>,
    State(state): State<AppState>,
) -> Result<Json<ScheduledEvent>, ApiError> {
    let Path(id) = id.map_err(path_rejection)?;
    let event = schedule_store::find_event(&*state.db_pool, id)
        .await
        .map_err(ServiceError::from)?
        .ok_or_else(|| ServiceError::NotFound(format!("scheduled event {} does not exist", id)))?;
    Ok(Json(event))
}

/// Only pending events can be withdrawn; completed ones are history.
pub async fn delete_scheduled_event(
    id: Result<Path<EventId>, PathRejection>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id.map_err(path_rejection)?;
    let deleted = schedule_store::delete_pending_event(&*state.db_pool, id)
        .await
        .map_err(ServiceError::from)?;
    if deleted {
        tracing::info!(event_id = id, by = %user.subject, "Scheduled event deleted");
        return Ok(StatusCode::NO_CONTENT);
    }

    let existing = schedule_store::find_event(&*state.db_pool, id)
        .await
        .map_err(ServiceError::from)?;
    match existing {
        None => Err(ServiceError::NotFound(format!("scheduled event {} does not exist", id)).into()),
        Some(_) => Err(ServiceError::Conflict(format!(
            "scheduled event {} has already run and cannot be deleted",
            id
        ))
        .into()),
    }
}

#[derive(Deserialize)]
pub struct LibraryYearQuery {
    year: Option<i32>,
}

pub async fn list_library_years(
    params: Result<Query<LibraryYearQuery>, QueryRejection>,
    State(state): State<AppState>,
) -> Result<Json<Vec<LibraryYear>>, ApiError> {
    let Query(params) = params.map_err(query_rejection)?;
    let rows = schedule_store::list_library_years(&*state.db_pool, params.year)
        .await
        .map_err(ServiceError::from)?;
    Ok(Json(rows))
}
