//! Repository layer: collection-scoped database operations.
//!
//! One sub-module per collection. Every function takes a borrowed
//! `Connection`; callers own connection lifetime. List queries hide
//! soft-deleted rows unless the filter asks for them.

mod consumption;
mod doctor;
mod medication;
mod patient;
mod schedule;
mod user;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use super::DatabaseError;

pub use consumption::*;
pub use doctor::*;
pub use medication::*;
pub use patient::*;
pub use schedule::*;
pub use user::*;

const DATE_FORMAT: &str = "%Y-%m-%d";

// ═══════════════════════════════════════════
// Column codecs
// ═══════════════════════════════════════════

pub(crate) fn date_to_sql(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn timestamp_to_sql(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

pub(crate) fn parse_uuid(column: &str, value: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value).map_err(|_| invalid(column, value))
}

pub(crate) fn parse_opt_uuid(
    column: &str,
    value: Option<String>,
) -> Result<Option<Uuid>, DatabaseError> {
    value.map(|v| parse_uuid(column, &v)).transpose()
}

pub(crate) fn parse_date(column: &str, value: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| invalid(column, value))
}

pub(crate) fn parse_opt_date(
    column: &str,
    value: Option<String>,
) -> Result<Option<NaiveDate>, DatabaseError> {
    value.map(|v| parse_date(column, &v)).transpose()
}

pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| invalid(column, value))
}

/// List-valued fields are stored as JSON arrays in TEXT columns.
pub(crate) fn encode_list<T: Serialize>(items: &[T]) -> Result<String, DatabaseError> {
    Ok(serde_json::to_string(items)?)
}

pub(crate) fn decode_list<T: DeserializeOwned>(
    column: &str,
    value: &str,
) -> Result<Vec<T>, DatabaseError> {
    serde_json::from_str(value).map_err(|_| invalid(column, value))
}

fn invalid(column: &str, value: &str) -> DatabaseError {
    DatabaseError::InvalidValue {
        column: column.into(),
        value: value.into(),
    }
}

// ═══════════════════════════════════════════
// Dynamic WHERE builder
// ═══════════════════════════════════════════

/// Accumulates `AND` clauses with positional parameters.
///
/// Clause templates use `{p}` for the next parameter index.
#[derive(Default)]
pub(crate) struct SqlFilter {
    clauses: Vec<String>,
    params: Vec<Box<dyn rusqlite::types::ToSql>>,
}

impl SqlFilter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn raw(&mut self, clause: &str) {
        self.clauses.push(clause.to_string());
    }

    pub(crate) fn eq<T: rusqlite::types::ToSql + 'static>(&mut self, template: &str, value: T) {
        let idx = self.params.len() + 1;
        self.clauses.push(template.replace("{p}", &format!("?{idx}")));
        self.params.push(Box::new(value));
    }

    /// `column IN (...)`. An empty id list can never match.
    pub(crate) fn any_of(&mut self, column: &str, ids: &[Uuid]) {
        if ids.is_empty() {
            self.clauses.push("0 = 1".into());
            return;
        }
        let mut placeholders = Vec::with_capacity(ids.len());
        for id in ids {
            self.params.push(Box::new(id.to_string()));
            placeholders.push(format!("?{}", self.params.len()));
        }
        self.clauses
            .push(format!("{column} IN ({})", placeholders.join(", ")));
    }

    pub(crate) fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub(crate) fn params(&self) -> Vec<&dyn rusqlite::types::ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}
