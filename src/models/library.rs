use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::LibraryId;

/// One institution's survey session for one year.
#[derive(Clone, Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LibraryYear {
    pub id: i32,
    pub library_id: LibraryId,
    pub library_name: String,
    pub year: i32,
    pub is_open_for_editing: bool,
    pub updated_at: DateTime<Utc>,
}
