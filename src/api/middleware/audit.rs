//! Access logging middleware.
//!
//! Logs every API request with method, path, caller and response
//! status. Runs innermost (after auth has injected `UserContext`).

use std::time::Instant;

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::UserContext;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let user = req
        .extensions()
        .get::<UserContext>()
        .map(|u| (u.actor.user_id.to_string(), u.actor.role.to_string()));

    let started = Instant::now();
    let response = next.run(req).await;
    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match user {
        Some((user_id, role)) => {
            tracing::info!(%method, %path, %user_id, %role, status, elapsed_ms, "API access")
        }
        None => tracing::info!(%method, %path, status, elapsed_ms, "API access"),
    }

    response
}
