//! Own-profile endpoints: `GET /api/profile`, `PUT /api/profile`.

use axum::extract::State;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::auth::{self, ProfileUpdate};
use crate::models::UserProfile;

pub async fn get(Extension(user): Extension<UserContext>) -> Json<UserProfile> {
    Json(user.profile)
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<UserProfile>, ApiError> {
    let conn = ctx.open_db()?;
    let profile = auth::update_profile(&conn, &user.actor.user_id, &update)?;
    tracing::info!(user_id = %profile.id, "Profile updated");
    Ok(Json(profile))
}
