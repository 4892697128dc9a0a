//! Medication schedule endpoints. Admins manage every schedule, doctors
//! the schedules of their own patients.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use super::parse_id;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::models::MedicationSchedule;
use crate::schedules::{self, ScheduleForm, SchedulePatch, ScheduleQuery};

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<Vec<MedicationSchedule>>, ApiError> {
    let conn = ctx.open_db()?;
    Ok(Json(schedules::fetch_schedules(&conn, &user.actor, &query)?))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(form): Json<ScheduleForm>,
) -> Result<(StatusCode, Json<MedicationSchedule>), ApiError> {
    let conn = ctx.open_db()?;
    let schedule = schedules::create_schedule(&conn, &user.actor, &form)?;
    Ok((StatusCode::CREATED, Json(schedule)))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<Json<MedicationSchedule>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.open_db()?;
    Ok(Json(schedules::fetch_schedule(&conn, &user.actor, &id)?))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(patch): Json<SchedulePatch>,
) -> Result<Json<MedicationSchedule>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.open_db()?;
    Ok(Json(schedules::update_schedule(&conn, &user.actor, &id, &patch)?))
}

pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.open_db()?;
    schedules::deactivate_schedule(&conn, &user.actor, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
