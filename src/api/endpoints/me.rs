//! Patient self-service endpoints.
//!
//! - `GET /api/me/schedules`: own active schedules
//! - `GET /api/me/today`: today's dose timeline
//! - `GET /api/me/records`: own consumption history

use axum::extract::State;
use axum::{Extension, Json};

use super::local_now;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::authorization;
use crate::consumption;
use crate::models::enums::UserRole;
use crate::models::{ConsumptionRecord, MedicationSchedule};
use crate::reporting::{self, DoseSlot};
use crate::schedules;

pub async fn schedules(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<Vec<MedicationSchedule>>, ApiError> {
    let conn = ctx.open_db()?;
    Ok(Json(schedules::fetch_own_schedules(&conn, &user.actor)?))
}

pub async fn today(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<Vec<DoseSlot>>, ApiError> {
    authorization::require_role(&user.actor, &[UserRole::Patient])?;
    let conn = ctx.open_db()?;
    Ok(Json(reporting::own_timeline(&conn, &user.actor, local_now())?))
}

pub async fn records(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<Vec<ConsumptionRecord>>, ApiError> {
    let conn = ctx.open_db()?;
    Ok(Json(consumption::fetch_own_records(&conn, &user.actor)?))
}
