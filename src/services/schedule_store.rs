//! Postgres access for scheduled events and Library_Year windows.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;

use crate::models::{EventId, EventStatus, EventType, LibraryId, LibraryYear, ScheduledEvent};

const EVENT_COLUMNS: &str = "id, event_type, scheduled_date, year, library_ids, subject, message, \
     notify_members, status, last_error, created_by, created_at, completed_at";

/// The queries the event processor needs. Kept narrow so runs can be exercised without a database.
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// Pending events dated on or before `today`, oldest first.
    async fn due_events(&self, today: NaiveDate) -> Result<Vec<ScheduledEvent>, sqlx::Error>;

    /// Set `is_open_for_editing` on the matching Library_Year rows whose flag differs.
    /// Returns how many rows actually changed.
    async fn set_forms_open(
        &self,
        year: i32,
        library_ids: Option<&[LibraryId]>,
        open: bool,
    ) -> Result<u64, sqlx::Error>;

    async fn broadcast_recipients(&self) -> Result<Vec<String>, sqlx::Error>;

    /// Flip a pending event to completed. `false` if it was no longer pending.
    async fn mark_completed(&self, id: EventId) -> Result<bool, sqlx::Error>;

    async fn record_failure(&self, id: EventId, error: &str) -> Result<(), sqlx::Error>;
}

#[derive(Clone)]
pub struct PgScheduleRepository {
    pool: PgPool,
}

impl PgScheduleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScheduleRepository for PgScheduleRepository {
    async fn due_events(&self, today: NaiveDate) -> Result<Vec<ScheduledEvent>, sqlx::Error> {
        sqlx::query_as::<_, ScheduledEvent>(&format!(
            "SELECT {} FROM scheduled_events \
             WHERE status = 'pending' AND scheduled_date <= $1 \
             ORDER BY scheduled_date, id",
            EVENT_COLUMNS
        ))
        .bind(today)
        .fetch_all(&self.pool)
        .await
    }

    async fn set_forms_open(
        &self,
        year: i32,
        library_ids: Option<&[LibraryId]>,
        open: bool,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE library_years
            SET is_open_for_editing = $1, updated_at = NOW()
            WHERE year = $2
              AND is_open_for_editing <> $1
              AND ($3::INTEGER[] IS NULL OR cardinality($3::INTEGER[]) = 0 OR library_id = ANY($3))
            "#,
        )
        .bind(open)
        .bind(year)
        .bind(library_ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn broadcast_recipients(&self) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT LOWER(TRIM(email)) AS email
            FROM users
            WHERE is_active = true AND TRIM(email) <> ''
            ORDER BY email
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn mark_completed(&self, id: EventId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_events
            SET status = 'completed', completed_at = NOW(), last_error = NULL
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_failure(&self, id: EventId, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE scheduled_events SET last_error = $2 WHERE id = $1")
            .bind(id)
            .bind(error)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub struct NewScheduledEvent {
    pub event_type: EventType,
    pub scheduled_date: NaiveDate,
    pub year: Option<i32>,
    pub library_ids: Option<Vec<LibraryId>>,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub notify_members: bool,
    pub created_by: Option<String>,
}

pub async fn insert_event(pool: &PgPool, event: &NewScheduledEvent) -> Result<ScheduledEvent, sqlx::Error> {
    sqlx::query_as::<_, ScheduledEvent>(&format!(
        r#"
        INSERT INTO scheduled_events
            (event_type, scheduled_date, year, library_ids, subject, message, notify_members, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {}
        "#,
        EVENT_COLUMNS
    ))
    .bind(event.event_type.as_str())
    .bind(event.scheduled_date)
    .bind(event.year)
    .bind(&event.library_ids)
    .bind(&event.subject)
    .bind(&event.message)
    .bind(event.notify_members)
    .bind(&event.created_by)
    .fetch_one(pool)
    .await
}

pub async fn list_events(
    pool: &PgPool,
    status: Option<EventStatus>,
) -> Result<Vec<ScheduledEvent>, sqlx::Error> {
    sqlx::query_as::<_, ScheduledEvent>(&format!(
        "SELECT {} FROM scheduled_events \
         WHERE ($1::TEXT IS NULL OR status = $1) \
         ORDER BY scheduled_date, id",
        EVENT_COLUMNS
    ))
    .bind(status.map(|s| s.as_str()))
    .fetch_all(pool)
    .await
}

pub async fn find_event(pool: &PgPool, id: EventId) -> Result<Option<ScheduledEvent>, sqlx::Error> {
    sqlx::query_as::<_, ScheduledEvent>(&format!(
        "SELECT {} FROM scheduled_events WHERE id = $1",
        EVENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Delete only while pending; returns whether a row went away.
pub async fn delete_pending_event(pool: &PgPool, id: EventId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM scheduled_events WHERE id = $1 AND status = 'pending'")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn list_library_years(pool: &PgPool, year: Option<i32>) -> Result<Vec<LibraryYear>, sqlx::Error> {
    sqlx::query_as::<_, LibraryYear>(
        r#"
        SELECT ly.id, ly.library_id, l.name AS library_name, ly.year,
               ly.is_open_for_editing, ly.updated_at
        FROM library_years ly
        JOIN libraries l ON l.id = ly.library_id
        WHERE ($1::INTEGER IS NULL OR ly.year = $1)
        ORDER BY ly.year DESC, l.name
        "#,
    )
    .bind(year)
    .fetch_all(pool)
    .await
}
