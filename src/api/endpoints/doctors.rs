//! Doctor endpoints (admin only).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use super::parse_id;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::doctors::{self, DoctorForm, DoctorPatch, DoctorQuery};
use crate::models::Doctor;

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<DoctorQuery>,
) -> Result<Json<Vec<Doctor>>, ApiError> {
    let conn = ctx.open_db()?;
    Ok(Json(doctors::fetch_doctors(&conn, &user.actor, &query)?))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(form): Json<DoctorForm>,
) -> Result<(StatusCode, Json<Doctor>), ApiError> {
    let conn = ctx.open_db()?;
    let doctor = doctors::create_doctor(&conn, &user.actor, &form)?;
    Ok((StatusCode::CREATED, Json(doctor)))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<Json<Doctor>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.open_db()?;
    Ok(Json(doctors::fetch_doctor(&conn, &user.actor, &id)?))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(patch): Json<DoctorPatch>,
) -> Result<Json<Doctor>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.open_db()?;
    Ok(Json(doctors::update_doctor(&conn, &user.actor, &id, &patch)?))
}

pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.open_db()?;
    doctors::deactivate_doctor(&conn, &user.actor, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
