//! Patient endpoints.
//!
//! - `GET /api/patients`, `POST /api/patients`
//! - `GET|PUT|DELETE /api/patients/:id`
//! - `GET /api/patients/:id/compliance`

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use super::{local_now, parse_id};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::models::Patient;
use crate::patients::{self, PatientForm, PatientPatch, PatientQuery};
use crate::reporting::{self, PatientCompliance};

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<PatientQuery>,
) -> Result<Json<Vec<Patient>>, ApiError> {
    let conn = ctx.open_db()?;
    Ok(Json(patients::fetch_patients(&conn, &user.actor, &query)?))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(form): Json<PatientForm>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let conn = ctx.open_db()?;
    let patient = patients::create_patient(&conn, &user.actor, &form, local_now().date())?;
    Ok((StatusCode::CREATED, Json(patient)))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<Json<Patient>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.open_db()?;
    Ok(Json(patients::fetch_patient(&conn, &user.actor, &id)?))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(patch): Json<PatientPatch>,
) -> Result<Json<Patient>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.open_db()?;
    Ok(Json(patients::update_patient(&conn, &user.actor, &id, &patch)?))
}

/// Soft delete; the record and its history stay in storage.
pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.open_db()?;
    patients::deactivate_patient(&conn, &user.actor, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn compliance(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<Json<PatientCompliance>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.open_db()?;
    Ok(Json(reporting::fetch_patient_compliance(&conn, &user.actor, &id)?))
}
