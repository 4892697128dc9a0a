//! API endpoint handlers.
//!
//! Each module corresponds to a screen or resource. Handlers are thin:
//! they open a connection and call the matching service module.

pub mod auth;
pub mod consumption;
pub mod dashboard;
pub mod doctors;
pub mod health;
pub mod me;
pub mod medications;
pub mod patients;
pub mod profile;
pub mod schedules;

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::api::error::ApiError;

/// Parse a path id, answering 400 on malformed input.
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("Invalid ID format".into()))
}

/// Wall-clock time in the server's local zone; dose times are local.
pub(crate) fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}
