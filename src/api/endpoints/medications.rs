//! Drug catalogue endpoints.
//!
//! - `GET /api/medications`: any role, `?search=&category=`
//! - `GET /api/medications/:id`
//! - `POST`, `PUT`, `DELETE`: admin only

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use super::parse_id;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::medications::{self, MedicationForm, MedicationPatch, MedicationQuery};
use crate::models::Medication;

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<MedicationQuery>,
) -> Result<Json<Vec<Medication>>, ApiError> {
    let conn = ctx.open_db()?;
    Ok(Json(medications::fetch_medications(&conn, &user.actor, &query)?))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(form): Json<MedicationForm>,
) -> Result<(StatusCode, Json<Medication>), ApiError> {
    let conn = ctx.open_db()?;
    let medication = medications::create_medication(&conn, &user.actor, &form)?;
    Ok((StatusCode::CREATED, Json(medication)))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<Json<Medication>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.open_db()?;
    Ok(Json(medications::fetch_medication(&conn, &user.actor, &id)?))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(patch): Json<MedicationPatch>,
) -> Result<Json<Medication>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.open_db()?;
    Ok(Json(medications::update_medication(&conn, &user.actor, &id, &patch)?))
}

pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.open_db()?;
    medications::deactivate_medication(&conn, &user.actor, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
