//! Dose history endpoints.
//!
//! - `GET /api/consumption`: history with `?search=&status=&patient_id=`
//! - `POST /api/consumption`: record a dose

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use super::local_now;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::consumption::{self, DoseForm, History, HistoryQuery};
use crate::models::ConsumptionRecord;

pub async fn history(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<History>, ApiError> {
    let conn = ctx.open_db()?;
    Ok(Json(consumption::fetch_history(&conn, &user.actor, &query)?))
}

pub async fn record(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(form): Json<DoseForm>,
) -> Result<(StatusCode, Json<ConsumptionRecord>), ApiError> {
    let conn = ctx.open_db()?;
    let record = consumption::record_dose(&conn, &user.actor, &form, local_now().date())?;
    Ok((StatusCode::CREATED, Json(record)))
}
