//! API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! - protected: auth validator → rate limiter (per user) → audit logger
//! - public: rate limiter (per peer address) → audit logger

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router with default rate limits.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

/// Build router from a pre-constructed `ApiContext`.
pub fn api_router_with_ctx(ctx: ApiContext) -> Router {
    build_router(ctx)
}

fn build_router(ctx: ApiContext) -> Router {
    // Protected routes: auth → rate limit → audit → handler.
    // Layers are listed innermost first.
    let protected = Router::new()
        .route("/auth/sign-out", post(endpoints::auth::sign_out))
        .route("/auth/me", get(endpoints::auth::me))
        .route(
            "/profile",
            get(endpoints::profile::get).put(endpoints::profile::update),
        )
        .route("/dashboard", get(endpoints::dashboard::stats))
        .route(
            "/patients",
            get(endpoints::patients::list).post(endpoints::patients::create),
        )
        .route(
            "/patients/:id",
            get(endpoints::patients::detail)
                .put(endpoints::patients::update)
                .delete(endpoints::patients::remove),
        )
        .route(
            "/patients/:id/compliance",
            get(endpoints::patients::compliance),
        )
        .route(
            "/doctors",
            get(endpoints::doctors::list).post(endpoints::doctors::create),
        )
        .route(
            "/doctors/:id",
            get(endpoints::doctors::detail)
                .put(endpoints::doctors::update)
                .delete(endpoints::doctors::remove),
        )
        .route(
            "/medications",
            get(endpoints::medications::list).post(endpoints::medications::create),
        )
        .route(
            "/medications/:id",
            get(endpoints::medications::detail)
                .put(endpoints::medications::update)
                .delete(endpoints::medications::remove),
        )
        .route(
            "/schedules",
            get(endpoints::schedules::list).post(endpoints::schedules::create),
        )
        .route(
            "/schedules/:id",
            get(endpoints::schedules::detail)
                .put(endpoints::schedules::update)
                .delete(endpoints::schedules::remove),
        )
        .route("/me/schedules", get(endpoints::me::schedules))
        .route("/me/today", get(endpoints::me::today))
        .route("/me/records", get(endpoints::me::records))
        .route(
            "/consumption",
            get(endpoints::consumption::history).post(endpoints::consumption::record),
        )
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx.clone()));

    // Unprotected routes (rate-limited only)
    let public = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/auth/sign-up", post(endpoints::auth::sign_up))
        .route("/auth/sign-in", post(endpoints::auth::sign_in))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx));

    Router::new()
        .nest("/api", protected)
        .nest("/api", public)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::api::types::RateLimiter;
    use crate::seed;

    /// Router over a seeded temp database. Keep the guard alive for the
    /// duration of the test.
    fn seeded_app() -> (Router, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let core = Arc::new(CoreState::new(
            tmp.path().join("medtrack.db"),
            Duration::from_secs(600),
        ));
        let mut conn = core.open_db().unwrap();
        seed::seed_demo_data(&mut conn, chrono::Local::now().date_naive())
            .unwrap()
            .unwrap();
        (api_router(core), tmp)
    }

    fn make_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {t}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn json_request(
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: serde_json::Value,
    ) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json");
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {t}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn response_json(response: axum::http::Response<Body>) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    async fn sign_in(app: &Router, email: &str, password: &str) -> String {
        let req = json_request(
            "POST",
            "/api/auth/sign-in",
            None,
            serde_json::json!({ "email": email, "password": password }),
        );
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = response_json(resp).await;
        json["token"].as_str().unwrap().to_string()
    }

    async fn get_json(app: &Router, uri: &str, token: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .clone()
            .oneshot(make_request("GET", uri, Some(token)))
            .await
            .unwrap();
        let status = resp.status();
        (status, response_json(resp).await)
    }

    fn names(list: &serde_json::Value) -> Vec<String> {
        let mut names: Vec<String> = list
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap().to_string())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn health_is_public() {
        let (app, _tmp) = seeded_app();
        let resp = app.oneshot(make_request("GET", "/api/health", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("x-content-type-options").unwrap(), "nosniff");
        let json = response_json(resp).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["database"], true);
        assert_eq!(json["version"], crate::config::APP_VERSION);
    }

    #[tokio::test]
    async fn protected_routes_require_token() {
        let (app, _tmp) = seeded_app();
        for uri in ["/api/patients", "/api/dashboard", "/api/auth/me", "/api/me/today"] {
            let resp = app.clone().oneshot(make_request("GET", uri, None)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
        let resp = app
            .oneshot(make_request("GET", "/api/patients", Some("not-a-token")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let json = response_json(resp).await;
        assert_eq!(json["error"]["code"], "unauthenticated");
    }

    #[tokio::test]
    async fn sign_in_resolves_current_user() {
        let (app, _tmp) = seeded_app();
        let token = sign_in(&app, "michael.chen@beom-med.com", "doctor123").await;
        let (status, json) = get_json(&app, "/api/auth/me", &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["user"]["role"], "doctor");
        assert_eq!(json["user"]["name"], "Michael Chen");
        assert!(json["doctor_id"].is_string());
        assert!(json["patient_id"].is_null());
    }

    #[tokio::test]
    async fn bad_credentials_share_one_message() {
        let (app, _tmp) = seeded_app();
        for (email, password) in [
            ("admin@beom-med.com", "wrong-password"),
            ("nobody@beom-med.com", "admin123"),
        ] {
            let req = json_request(
                "POST",
                "/api/auth/sign-in",
                None,
                serde_json::json!({ "email": email, "password": password }),
            );
            let resp = app.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
            let json = response_json(resp).await;
            assert_eq!(json["error"]["message"], "Invalid email or password");
        }
    }

    #[tokio::test]
    async fn sign_up_rejects_mismatched_passwords() {
        let (app, _tmp) = seeded_app();
        let req = json_request(
            "POST",
            "/api/auth/sign-up",
            None,
            serde_json::json!({
                "name": "New Patient",
                "email": "new@email.com",
                "password": "secret1",
                "confirm_password": "secret2",
                "role": "patient"
            }),
        );
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = response_json(resp).await;
        assert_eq!(json["error"]["code"], "invalid-argument");
    }

    #[tokio::test]
    async fn sign_up_opens_a_session() {
        let (app, _tmp) = seeded_app();
        let req = json_request(
            "POST",
            "/api/auth/sign-up",
            None,
            serde_json::json!({
                "name": "Emily Davis",
                "email": "emily.davis@email.com",
                "password": "secret1",
                "confirm_password": "secret1",
                "role": "patient"
            }),
        );
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let json = response_json(resp).await;
        let token = json["token"].as_str().unwrap().to_string();

        // No patient record carries this email, so the dashboard is empty.
        let (status, stats) = get_json(&app, "/api/dashboard", &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["role"], "patient");
        assert_eq!(stats["compliance"], 0);
        assert_eq!(stats["schedules_today"], 0);
    }

    #[tokio::test]
    async fn sign_out_revokes_token() {
        let (app, _tmp) = seeded_app();
        let token = sign_in(&app, "admin@beom-med.com", "admin123").await;
        let resp = app
            .clone()
            .oneshot(make_request("POST", "/api/auth/sign-out", Some(&token)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let resp = app
            .oneshot(make_request("GET", "/api/auth/me", Some(&token)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn doctor_sees_only_own_patients() {
        let (app, _tmp) = seeded_app();
        let admin = sign_in(&app, "admin@beom-med.com", "admin123").await;
        let chen = sign_in(&app, "michael.chen@beom-med.com", "doctor123").await;

        let (_, all) = get_json(&app, "/api/patients", &admin).await;
        assert_eq!(names(&all), vec!["John Smith", "Maria Garcia", "Robert Johnson"]);

        let (status, own) = get_json(&app, "/api/patients", &chen).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(names(&own), vec!["John Smith", "Robert Johnson"]);

        let maria = all
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["name"] == "Maria Garcia")
            .unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string();
        let (status, json) = get_json(&app, &format!("/api/patients/{maria}"), &chen).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"]["code"], "permission-denied");
        let (status, _) = get_json(&app, &format!("/api/patients/{maria}/compliance"), &chen).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = get_json(&app, &format!("/api/patients/{maria}/compliance"), &admin).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn doctors_page_is_admin_only() {
        let (app, _tmp) = seeded_app();
        let admin = sign_in(&app, "admin@beom-med.com", "admin123").await;
        let john = sign_in(&app, "john.smith@email.com", "patient123").await;

        let (status, doctors) = get_json(&app, "/api/doctors", &admin).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(doctors.as_array().unwrap().len(), 3);
        let (status, _) = get_json(&app, "/api/doctors", &john).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = get_json(&app, "/api/patients", &john).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn catalogue_is_read_by_all_written_by_admin() {
        let (app, _tmp) = seeded_app();
        let admin = sign_in(&app, "admin@beom-med.com", "admin123").await;
        let john = sign_in(&app, "john.smith@email.com", "patient123").await;

        let (status, meds) = get_json(&app, "/api/medications?search=metf", &john).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(names(&meds), vec!["Metformin"]);

        let body = serde_json::json!({
            "name": "Atorvastatin",
            "dosage": "20mg",
            "frequency": "1x daily",
            "category": "other",
            "stock_quantity": 30
        });
        let resp = app
            .clone()
            .oneshot(json_request("POST", "/api/medications", Some(&john), body.clone()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let resp = app
            .clone()
            .oneshot(json_request("POST", "/api/medications", Some(&admin), body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created = response_json(resp).await;
        let id = created["id"].as_str().unwrap();

        let resp = app
            .clone()
            .oneshot(make_request("DELETE", &format!("/api/medications/{id}"), Some(&admin)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let (_, meds) = get_json(&app, "/api/medications", &john).await;
        assert_eq!(meds.as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn patient_records_own_dose() {
        let (app, _tmp) = seeded_app();
        let john = sign_in(&app, "john.smith@email.com", "patient123").await;

        let (status, schedules) = get_json(&app, "/api/me/schedules", &john).await;
        assert_eq!(status, StatusCode::OK);
        let metformin = schedules
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["times"].as_array().unwrap().len() == 2)
            .unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string();

        let (status, today) = get_json(&app, "/api/me/today", &john).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(today.as_array().unwrap().len(), 3);

        let req = json_request(
            "POST",
            "/api/consumption",
            Some(&john),
            serde_json::json!({
                "schedule_id": metformin,
                "scheduled_time": "08:00",
                "actual_time": "08:10",
                "status": "taken"
            }),
        );
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let (_, records) = get_json(&app, "/api/me/records", &john).await;
        // 3 days × 3 doses seeded, plus the new one.
        assert_eq!(records.as_array().unwrap().len(), 10);

        let (status, _) = get_json(&app, "/api/consumption", &john).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn history_filters_by_status() {
        let (app, _tmp) = seeded_app();
        let admin = sign_in(&app, "admin@beom-med.com", "admin123").await;
        let (status, history) = get_json(&app, "/api/consumption?status=missed", &admin).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history["summary"]["missed"], 1);
        assert_eq!(history["summary"]["total"], 1);
        assert_eq!(history["records"][0]["patient_name"], "John Smith");
    }

    #[tokio::test]
    async fn malformed_id_is_bad_request() {
        let (app, _tmp) = seeded_app();
        let admin = sign_in(&app, "admin@beom-med.com", "admin123").await;
        let (status, json) = get_json(&app, "/api/patients/not-a-uuid", &admin).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["message"], "Invalid ID format");
    }

    #[tokio::test]
    async fn responses_are_not_cached() {
        let (app, _tmp) = seeded_app();
        let admin = sign_in(&app, "admin@beom-med.com", "admin123").await;
        let resp = app
            .oneshot(make_request("GET", "/api/dashboard", Some(&admin)))
            .await
            .unwrap();
        assert_eq!(resp.headers().get("Cache-Control").unwrap(), "no-store");
        let json = response_json(resp).await;
        assert_eq!(json["role"], "admin");
        assert_eq!(json["total_patients"], 3);
    }

    #[tokio::test]
    async fn rate_limit_rejects_burst() {
        let tmp = tempfile::tempdir().unwrap();
        let core = Arc::new(CoreState::new(tmp.path().join("m.db"), Duration::from_secs(60)));
        let app = api_router_with_ctx(ApiContext::with_limiter(core, RateLimiter::with_limits(2, 100)));
        for _ in 0..2 {
            let resp = app.clone().oneshot(make_request("GET", "/api/health", None)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }
        let resp = app.oneshot(make_request("GET", "/api/health", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers().get("Retry-After").unwrap(), "60");
    }

    #[tokio::test]
    async fn rotating_bearer_does_not_reset_sign_in_limit() {
        let tmp = tempfile::tempdir().unwrap();
        let core = Arc::new(CoreState::new(tmp.path().join("m.db"), Duration::from_secs(60)));
        let ctx = ApiContext::with_limiter(core, RateLimiter::with_limits(2, 100));
        let app = api_router_with_ctx(ctx);

        let mut limited = 0;
        for i in 0..10 {
            let req = json_request(
                "POST",
                "/api/auth/sign-in",
                Some(&format!("junk-bearer-{i}")),
                serde_json::json!({ "email": "nobody@beom-med.com", "password": "x" }),
            );
            let resp = app.clone().oneshot(req).await.unwrap();
            if resp.status() == StatusCode::TOO_MANY_REQUESTS {
                limited += 1;
            }
        }
        assert_eq!(limited, 8);
    }

    #[tokio::test]
    async fn signed_in_users_get_separate_buckets() {
        let tmp = tempfile::tempdir().unwrap();
        let core = Arc::new(CoreState::new(
            tmp.path().join("medtrack.db"),
            Duration::from_secs(600),
        ));
        let mut conn = core.open_db().unwrap();
        seed::seed_demo_data(&mut conn, chrono::Local::now().date_naive())
            .unwrap()
            .unwrap();
        let app = api_router_with_ctx(ApiContext::with_limiter(core, RateLimiter::with_limits(3, 100)));

        // Both sign-ins share the anonymous bucket.
        let admin = sign_in(&app, "admin@beom-med.com", "admin123").await;
        let john = sign_in(&app, "john.smith@email.com", "patient123").await;

        for _ in 0..3 {
            let (status, _) = get_json(&app, "/api/auth/me", &admin).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, _) = get_json(&app, "/api/auth/me", &admin).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

        let (status, json) = get_json(&app, "/api/auth/me", &john).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["user"]["role"], "patient");
    }
}
