use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};

use super::{EventId, LibraryId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Broadcast,
    FormOpening,
    FormClosing,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Broadcast => "BROADCAST",
            EventType::FormOpening => "FORM_OPENING",
            EventType::FormClosing => "FORM_CLOSING",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "BROADCAST" => Some(EventType::Broadcast),
            "FORM_OPENING" => Some(EventType::FormOpening),
            "FORM_CLOSING" => Some(EventType::FormClosing),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Pending,
    Completed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(EventStatus::Pending),
            "completed" => Some(EventStatus::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledEvent {
    pub id: EventId,
    pub event_type: EventType,
    pub scheduled_date: NaiveDate,
    /// Survey year targeted by FORM_OPENING/FORM_CLOSING. `None` means the current year.
    pub year: Option<i32>,
    /// Restricts FORM_OPENING/FORM_CLOSING to these libraries. `None` means every library.
    pub library_ids: Option<Vec<LibraryId>>,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub notify_members: bool,
    pub status: EventStatus,
    pub last_error: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ScheduledEvent {
    /// Pending and dated on or before `today`.
    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.status == EventStatus::Pending && self.scheduled_date <= today
    }
}

impl<'r> FromRow<'r, PgRow> for ScheduledEvent {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let event_type: String = row.try_get("event_type")?;
        let status: String = row.try_get("status")?;
        Ok(Self {
            id: row.try_get("id")?,
            event_type: EventType::from_str(&event_type).ok_or_else(|| sqlx::Error::ColumnDecode {
                index: "event_type".to_string(),
                source: format!("unknown event type: {}", event_type).into(),
            })?,
            scheduled_date: row.try_get("scheduled_date")?,
            year: row.try_get("year")?,
            library_ids: row.try_get("library_ids")?,
            subject: row.try_get("subject")?,
            message: row.try_get("message")?,
            notify_members: row.try_get("notify_members")?,
            status: EventStatus::from_str(&status).ok_or_else(|| sqlx::Error::ColumnDecode {
                index: "status".to_string(),
                source: format!("unknown event status: {}", status).into(),
            })?,
            last_error: row.try_get("last_error")?,
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }
}
