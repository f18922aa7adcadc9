//! Carries per-year counts rows forward into a new survey year.
//!
//! Rows get explicit primary keys (`MAX(id) + 1`, `+ 2`, ...) so the copied block is contiguous,
//! which leaves the table's serial sequence behind; it is re-synchronised after every copy.
//! Not safe under concurrent callers: two copies into the same table can pick the same ids.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::error::ServiceError;
use crate::models::{CountsTable, RecordId};

pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 2200;

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyRequest {
    pub table: CountsTable,
    pub record_ids: Vec<RecordId>,
    pub target_year: i32,
    /// Copy from exactly this year; otherwise from each record's latest year before the target.
    #[serde(default)]
    pub source_year: Option<i32>,
}

impl CopyRequest {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.record_ids.is_empty() {
            return Err(ServiceError::Validation("recordIds must not be empty".to_string()));
        }
        if let Some(bad) = self.record_ids.iter().find(|id| **id <= 0) {
            return Err(ServiceError::Validation(format!("invalid record id: {}", bad)));
        }
        if !(MIN_YEAR..=MAX_YEAR).contains(&self.target_year) {
            return Err(ServiceError::Validation(format!(
                "targetYear must be between {} and {}",
                MIN_YEAR, MAX_YEAR
            )));
        }
        if let Some(source) = self.source_year {
            if !(MIN_YEAR..=MAX_YEAR).contains(&source) {
                return Err(ServiceError::Validation(format!(
                    "sourceYear must be between {} and {}",
                    MIN_YEAR, MAX_YEAR
                )));
            }
            if source == self.target_year {
                return Err(ServiceError::Validation(
                    "sourceYear and targetYear must differ".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Requested ids with repeats removed, first occurrence kept.
    pub fn unique_record_ids(&self) -> Vec<RecordId> {
        let mut seen = HashSet::new();
        self.record_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedRow {
    pub id: i32,
    pub record_id: RecordId,
    /// Row whose counts are copied; `None` inserts an empty row.
    pub source_id: Option<i32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CopyPlan {
    pub rows: Vec<PlannedRow>,
    pub already_exists: Vec<RecordId>,
}

/// Decide which records get a new row and which primary key each one receives.
pub fn plan_copy(
    record_ids: &[RecordId],
    existing: &HashSet<RecordId>,
    sources: &HashMap<RecordId, i32>,
    max_id: i32,
) -> CopyPlan {
    let mut plan = CopyPlan::default();
    let mut next_id = max_id;

    for &record_id in record_ids {
        if existing.contains(&record_id) {
            plan.already_exists.push(record_id);
            continue;
        }
        next_id += 1;
        plan.rows.push(PlannedRow {
            id: next_id,
            record_id,
            source_id: sources.get(&record_id).copied(),
        });
    }

    plan
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyFailure {
    pub record_id: RecordId,
    pub error: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyReport {
    pub table: CountsTable,
    pub target_year: i32,
    pub inserted_count: usize,
    pub skipped_count: usize,
    pub already_exists: Vec<RecordId>,
    pub created_empty: Vec<RecordId>,
    pub inserted_ids: Vec<i32>,
    pub failed: Vec<CopyFailure>,
    /// Value the table's sequence hands out next.
    pub next_id: i64,
}

pub enum InsertError {
    /// The (record, year) pair appeared after planning.
    Duplicate,
    Other(sqlx::Error),
}

#[async_trait]
pub trait CountsStore: Send + Sync {
    /// Records among `record_ids` that already have a row for `year`.
    async fn existing_records(
        &self,
        table: CountsTable,
        year: i32,
        record_ids: &[RecordId],
    ) -> Result<HashSet<RecordId>, sqlx::Error>;

    /// Source row id per record: `source_year` when given, else the latest year before `target_year`.
    async fn source_rows(
        &self,
        table: CountsTable,
        record_ids: &[RecordId],
        target_year: i32,
        source_year: Option<i32>,
    ) -> Result<HashMap<RecordId, i32>, sqlx::Error>;

    /// Largest primary key in the table, 0 when empty.
    async fn max_id(&self, table: CountsTable) -> Result<i32, sqlx::Error>;

    async fn insert_row(&self, table: CountsTable, row: &PlannedRow, year: i32) -> Result<(), InsertError>;

    /// Point the table's sequence past `MAX(id)`; returns the next value it will produce.
    async fn repair_sequence(&self, table: CountsTable) -> Result<i64, sqlx::Error>;
}

pub async fn copy_records(store: &dyn CountsStore, request: &CopyRequest) -> Result<CopyReport, ServiceError> {
    request.validate()?;
    let table = request.table;
    let record_ids = request.unique_record_ids();

    let existing = store
        .existing_records(table, request.target_year, &record_ids)
        .await?;
    let sources = store
        .source_rows(table, &record_ids, request.target_year, request.source_year)
        .await?;
    let max_id = store.max_id(table).await?;

    let plan = plan_copy(&record_ids, &existing, &sources, max_id);
    info!(
        %table,
        target_year = request.target_year,
        planned = plan.rows.len(),
        skipped = plan.already_exists.len(),
        "Copying counts rows"
    );

    let mut report = CopyReport {
        table,
        target_year: request.target_year,
        inserted_count: 0,
        skipped_count: 0,
        already_exists: plan.already_exists.clone(),
        created_empty: Vec::new(),
        inserted_ids: Vec::new(),
        failed: Vec::new(),
        next_id: 0,
    };

    for row in &plan.rows {
        match store.insert_row(table, row, request.target_year).await {
            Ok(()) => {
                report.inserted_ids.push(row.id);
                if row.source_id.is_none() {
                    report.created_empty.push(row.record_id);
                }
            }
            Err(InsertError::Duplicate) => report.already_exists.push(row.record_id),
            Err(InsertError::Other(e)) => {
                warn!(%table, record_id = row.record_id, "Counts row insert failed: {:?}", e);
                report.failed.push(CopyFailure {
                    record_id: row.record_id,
                    error: e.to_string(),
                });
            }
        }
    }

    // Always resync, even after partial failure: some manual ids may have landed.
    report.next_id = store.repair_sequence(table).await?;
    report.inserted_count = report.inserted_ids.len();
    report.skipped_count = report.already_exists.len();

    info!(
        %table,
        inserted = report.inserted_count,
        skipped = report.skipped_count,
        failed = report.failed.len(),
        next_id = report.next_id,
        "Counts copy finished"
    );
    Ok(report)
}

#[derive(Clone)]
pub struct PgCountsStore {
    pool: PgPool,
}

impl PgCountsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CountsStore for PgCountsStore {
    async fn existing_records(
        &self,
        table: CountsTable,
        year: i32,
        record_ids: &[RecordId],
    ) -> Result<HashSet<RecordId>, sqlx::Error> {
        let sql = format!(
            "SELECT {fk} FROM {table} WHERE year = $1 AND {fk} = ANY($2)",
            fk = table.record_column(),
            table = table.table_name(),
        );
        let ids: Vec<RecordId> = sqlx::query_scalar(&sql)
            .bind(year)
            .bind(record_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    async fn source_rows(
        &self,
        table: CountsTable,
        record_ids: &[RecordId],
        target_year: i32,
        source_year: Option<i32>,
    ) -> Result<HashMap<RecordId, i32>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT DISTINCT ON ({fk}) {fk}, id
            FROM {table}
            WHERE {fk} = ANY($1)
              AND (($3::INTEGER IS NULL AND year < $2) OR year = $3)
            ORDER BY {fk}, year DESC
            "#,
            fk = table.record_column(),
            table = table.table_name(),
        );
        let rows: Vec<(RecordId, i32)> = sqlx::query_as(&sql)
            .bind(record_ids)
            .bind(target_year)
            .bind(source_year)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().collect())
    }

    async fn max_id(&self, table: CountsTable) -> Result<i32, sqlx::Error> {
        let sql = format!("SELECT COALESCE(MAX(id), 0) FROM {}", table.table_name());
        sqlx::query_scalar(&sql).fetch_one(&self.pool).await
    }

    async fn insert_row(&self, table: CountsTable, row: &PlannedRow, year: i32) -> Result<(), InsertError> {
        let result = match row.source_id {
            Some(source_id) => {
                let columns = table.value_columns().join(", ");
                let sql = format!(
                    "INSERT INTO {table} (id, {fk}, year, {columns}) \
                     SELECT $1, $2, $3, {columns} FROM {table} WHERE id = $4",
                    table = table.table_name(),
                    fk = table.record_column(),
                    columns = columns,
                );
                sqlx::query(&sql)
                    .bind(row.id)
                    .bind(row.record_id)
                    .bind(year)
                    .bind(source_id)
                    .execute(&self.pool)
                    .await
            }
            None => {
                let sql = format!(
                    "INSERT INTO {} (id, {}, year) VALUES ($1, $2, $3)",
                    table.table_name(),
                    table.record_column(),
                );
                sqlx::query(&sql)
                    .bind(row.id)
                    .bind(row.record_id)
                    .bind(year)
                    .execute(&self.pool)
                    .await
            }
        };

        match result {
            Ok(done) if done.rows_affected() == 1 => Ok(()),
            Ok(_) => Err(InsertError::Other(sqlx::Error::RowNotFound)),
            Err(e) => Err(classify_insert_error(e)),
        }
    }

    async fn repair_sequence(&self, table: CountsTable) -> Result<i64, sqlx::Error> {
        // is_called = false: the next nextval() returns exactly MAX(id) + 1 (1 for an empty table).
        let sql = format!(
            "SELECT setval(pg_get_serial_sequence('{table}', 'id'), COALESCE((SELECT MAX(id) FROM {table}), 0) + 1, false)",
            table = table.table_name(),
        );
        sqlx::query_scalar(&sql).fetch_one(&self.pool).await
    }
}

/// A unique violation on the (record, year) key means someone else created the row;
/// one on the primary key means our manual id collided and is a real failure.
fn classify_insert_error(e: sqlx::Error) -> InsertError {
    let duplicate = e.as_database_error().map_or(false, |db| {
        db.is_unique_violation() && !db.constraint().map_or(false, |c| c.ends_with("_pkey"))
    });
    if duplicate {
        InsertError::Duplicate
    } else {
        InsertError::Other(e)
    }
}
