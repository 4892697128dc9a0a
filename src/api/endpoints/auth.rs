//! Authentication endpoints.
//!
//! `POST /api/auth/sign-up`, `POST /api/auth/sign-in`: unprotected
//! `POST /api/auth/sign-out`, `GET /api/auth/me`: signed-in callers

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::auth::{self, AuthError, SignInForm, SignUpForm, SignedIn};
use crate::models::AuthUser;

/// Password hashing is CPU-bound; run it off the async workers.
async fn run_blocking<T, F>(f: F) -> Result<Result<T, AuthError>, ApiError>
where
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("auth task failed: {e}")))
}

/// `POST /api/auth/sign-up`: create an account and sign it in.
pub async fn sign_up(
    State(ctx): State<ApiContext>,
    Json(form): Json<SignUpForm>,
) -> Result<(StatusCode, Json<SignedIn>), ApiError> {
    let core = ctx.core.clone();
    let signed_in = run_blocking(move || auth::sign_up(&core, &form)).await??;
    Ok((StatusCode::CREATED, Json(signed_in)))
}

/// `POST /api/auth/sign-in`: unknown email and wrong password answer
/// with the same message.
pub async fn sign_in(
    State(ctx): State<ApiContext>,
    Json(form): Json<SignInForm>,
) -> Result<Json<SignedIn>, ApiError> {
    let core = ctx.core.clone();
    match run_blocking(move || auth::sign_in(&core, &form)).await? {
        Ok(signed_in) => Ok(Json(signed_in)),
        Err(AuthError::UserNotFound | AuthError::WrongPassword) => Err(ApiError::InvalidCredentials),
        Err(e) => Err(e.into()),
    }
}

/// `POST /api/auth/sign-out`: revoke the presented token.
pub async fn sign_out(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<StatusCode, ApiError> {
    auth::sign_out(&ctx.core, &user.token)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct MeResponse {
    pub user: AuthUser,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
}

/// `GET /api/auth/me`: the signed-in user and the care records linked
/// to the account.
pub async fn me(Extension(user): Extension<UserContext>) -> Json<MeResponse> {
    Json(MeResponse {
        user: user.profile.to_auth_user(),
        doctor_id: user.actor.doctor_id,
        patient_id: user.actor.patient_id,
    })
}
