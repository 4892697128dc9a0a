//! `GET /api/dashboard`: statistics for the caller's role.

use axum::extract::State;
use axum::{Extension, Json};

use super::local_now;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::reporting::{self, DashboardStats};

pub async fn stats(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<DashboardStats>, ApiError> {
    let conn = ctx.open_db()?;
    let stats = reporting::dashboard(&conn, &user.actor, local_now())?;
    Ok(Json(stats))
}
