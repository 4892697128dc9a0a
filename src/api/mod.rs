//! HTTP API.
//!
//! Exposes the care-record services as JSON endpoints under `/api/`.
//! Public routes (health, sign-in, sign-up) are only rate-limited; every
//! other route runs Rate Limit → Auth → Audit → Handler.
//!
//! `api_router()` returns a `Router` that can be mounted on any axum
//! server; `server` owns the listener lifecycle.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use server::{start_api_server, ApiServer, ServerError};
pub use types::ApiContext;
