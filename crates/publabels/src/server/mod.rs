mod auth;
mod changes;
mod error;
mod events;
mod labels;
pub(crate) mod limits;
mod roles;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{any, get, post};
use axum::{Json, Router};
use eyre::WrapErr;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};

use publabels_core::Registry;

// ==============================================================================
// Application State
// ==============================================================================

pub struct AppState {
    pub registry: Arc<RwLock<Registry>>,
    pub api_token: String,
    pub max_page_size: usize,
}

type SharedState = Arc<AppState>;

// ==============================================================================
// Router
// ==============================================================================

pub fn build_router(state: AppState, origin: &str) -> eyre::Result<Router> {
    // Only reflect the allowed origin when the request's Origin header
    // matches it exactly.
    let allowed: axum::http::HeaderValue = origin
        .parse()
        .wrap_err_with(|| format!("invalid CORS origin `{origin}`"))?;
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |request_origin: &axum::http::HeaderValue, _| *request_origin == allowed,
        ))
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::HeaderName::from_static("x-api-token"),
            axum::http::header::HeaderName::from_static("x-caller"),
        ]);

    let shared = Arc::new(state);

    let public_api = Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/limits", get(limits::get_limits));

    // Every route that accepts a JSON body, plus the reads sharing their paths.
    const JSON_BODY_LIMIT: usize = 2 * 1024 * 1024;

    let body_limited_routes = Router::new()
        .route(
            "/api/v1/roles/{role}",
            get(roles::list_role_members).post(roles::grant_role),
        )
        .route(
            "/api/v1/roles/{role}/{address}",
            get(roles::has_role).delete(roles::revoke_role),
        )
        .route("/api/v1/labels", post(labels::set_labels))
        .route("/api/v1/changes/approve", post(changes::approve_changes))
        .route("/api/v1/changes/reject", post(changes::reject_changes))
        .route("/api/v1/entries/lookup", post(labels::lookup_entries))
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT));

    let protected_api = Router::new()
        .route("/api/v1/changes", get(changes::list_changes))
        .route("/api/v1/entries", get(labels::list_entries))
        .route("/api/v1/events", get(events::get_events))
        .merge(body_limited_routes);

    Ok(Router::new()
        .merge(public_api)
        .merge(protected_api)
        .route("/api", any(api_not_found))
        .route("/api/{*path}", any(api_not_found))
        .fallback(api_not_found)
        .layer(cors)
        .with_state(shared))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn api_not_found() -> error::AppError {
    error::AppError::NotFound("API route not found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use publabels_core::events::{EventRecord, EventSink};
    use publabels_core::{Address, CoreError};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const TOKEN: &str = "test-token";

    fn addr(byte: u8) -> Address {
        Address([byte; 20])
    }

    fn admin() -> Address {
        addr(0xaa)
    }

    fn test_router_with_page_size(max_page_size: usize) -> Router {
        let state = AppState {
            registry: Arc::new(RwLock::new(Registry::new(admin()))),
            api_token: TOKEN.to_string(),
            max_page_size,
        };
        build_router(state, "http://127.0.0.1:3090").expect("test origin must parse")
    }

    fn test_router() -> Router {
        test_router_with_page_size(500)
    }

    struct BrokenJournal;

    impl EventSink for BrokenJournal {
        fn publish(&mut self, _records: &[EventRecord]) -> Result<(), CoreError> {
            Err(CoreError::Io(std::io::Error::other("no space left on device")))
        }
    }

    fn test_router_with_broken_journal() -> Router {
        let mut registry = Registry::new(admin());
        registry.add_sink(Box::new(BrokenJournal));
        let state = AppState {
            registry: Arc::new(RwLock::new(registry)),
            api_token: TOKEN.to_string(),
            max_page_size: 500,
        };
        build_router(state, "http://127.0.0.1:3090").expect("test origin must parse")
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-api-token", TOKEN)
            .body(Body::empty())
            .expect("request must build")
    }

    fn post_req(uri: &str, caller: Address, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("x-api-token", TOKEN)
            .header("x-caller", caller.to_string())
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request must build")
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router
            .clone()
            .oneshot(request)
            .await
            .expect("router should serve request");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("response body must be readable");
        let json = serde_json::from_slice(&bytes).expect("response body must be valid JSON");
        (status, json)
    }

    fn error_message(json: &Value) -> Option<&str> {
        json.get("error").and_then(Value::as_str)
    }

    #[tokio::test]
    async fn unknown_api_route_returns_json_404() {
        let router = test_router();
        let (status, json) = send(&router, get_req("/api/v1/does-not-exist")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error_message(&json), Some("API route not found"));
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let router = test_router();
        let request = Request::builder()
            .uri("/api/v1/entries")
            .body(Body::empty())
            .expect("request must build");
        let (status, json) = send(&router, request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_message(&json), Some("invalid or missing X-API-Token"));
    }

    #[tokio::test]
    async fn health_needs_no_token() {
        let router = test_router();
        let request = Request::builder()
            .uri("/api/v1/health")
            .body(Body::empty())
            .expect("request must build");
        let (status, json) = send(&router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn limits_endpoint_exposes_hard_configured_and_effective_values() {
        let router = test_router_with_page_size(9_000);
        let (status, json) = send(&router, get_req("/api/v1/limits")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json["hard_max_page_size"].as_u64(),
            Some(limits::HARD_MAX_PAGE_SIZE as u64)
        );
        assert_eq!(json["configured_max_page_size"].as_u64(), Some(9_000));
        assert_eq!(
            json["effective_max_page_size"].as_u64(),
            Some(limits::HARD_MAX_PAGE_SIZE as u64)
        );
        assert_eq!(json["default_page_size"].as_u64(), Some(100));
    }

    #[tokio::test]
    async fn contributor_submission_is_published_after_approval() {
        let router = test_router();
        let contributor = addr(1);
        let target = addr(0x10);

        let (status, _) = send(
            &router,
            post_req(
                "/api/v1/roles/contributor",
                admin(),
                json!({ "account": contributor }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, json) = send(
            &router,
            post_req(
                "/api/v1/labels",
                contributor,
                json!({ "identifiers": [target], "labels": ["Hot Wallet"] }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["change_ids"], json!([0]));
        assert_eq!(json["published"], 0);

        let (_, json) = send(&router, get_req("/api/v1/changes")).await;
        assert_eq!(json["total"], 1);
        assert_eq!(json["identifiers"], json!([target]));
        assert_eq!(json["entries"][0]["state"], "pending");

        let (status, _) = send(
            &router,
            post_req(
                "/api/v1/changes/approve",
                admin(),
                json!({ "change_ids": [0] }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, json) = send(
            &router,
            post_req(
                "/api/v1/entries/lookup",
                contributor,
                json!({ "identifiers": [target, addr(0x11)] }),
            ),
        )
        .await;
        assert_eq!(json["entries"][0]["label"], "Hot Wallet");
        assert_eq!(json["entries"][0]["state"], "verified");
        assert_eq!(json["entries"][0]["submitter"], json!(contributor));
        assert_eq!(json["entries"][1]["state"], "unset");

        let (_, json) = send(&router, get_req("/api/v1/entries")).await;
        assert_eq!(json["total"], 1);
        assert_eq!(json["entries"][0]["identifier"], json!(target));
    }

    #[tokio::test]
    async fn outsider_submission_is_forbidden() {
        let router = test_router();
        let (status, json) = send(
            &router,
            post_req(
                "/api/v1/labels",
                addr(9),
                json!({ "identifiers": [addr(0x10)], "labels": ["x"] }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(error_message(&json).is_some_and(|msg| msg.contains("set labels")));
    }

    #[tokio::test]
    async fn length_mismatch_is_bad_request() {
        let router = test_router();
        let (status, _) = send(
            &router,
            post_req(
                "/api/v1/labels",
                admin(),
                json!({ "identifiers": [addr(1), addr(2)], "labels": ["only one"] }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn journal_failure_is_internal_error_and_writes_nothing() {
        let router = test_router_with_broken_journal();
        let (status, json) = send(
            &router,
            post_req(
                "/api/v1/labels",
                admin(),
                json!({ "identifiers": [addr(1)], "labels": ["a"] }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(error_message(&json)
            .is_some_and(|msg| msg.contains("no space left on device")));

        let (_, json) = send(&router, get_req("/api/v1/entries")).await;
        assert_eq!(json["total"], 0);
        let (_, json) = send(&router, get_req("/api/v1/events")).await;
        assert_eq!(json["total"], 1);
    }

    #[tokio::test]
    async fn reviewing_unknown_change_is_bad_request() {
        let router = test_router();
        let (status, _) = send(
            &router,
            post_req(
                "/api/v1/changes/reject",
                admin(),
                json!({ "change_ids": [7] }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_caller_is_bad_request() {
        let router = test_router();
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/labels")
            .header("x-api-token", TOKEN)
            .header("content-type", "application/json")
            .body(Body::from(r#"{"identifiers":[],"labels":[]}"#))
            .expect("request must build");
        let (status, json) = send(&router, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_message(&json), Some("missing X-Caller header"));
    }

    #[tokio::test]
    async fn unknown_fields_are_rejected() {
        let router = test_router();
        let (status, _) = send(
            &router,
            post_req(
                "/api/v1/labels",
                admin(),
                json!({ "identifiers": [], "labels": [], "extra": true }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn paging_past_the_end_returns_empty_page() {
        let router = test_router();
        send(
            &router,
            post_req(
                "/api/v1/labels",
                admin(),
                json!({ "identifiers": [addr(1), addr(2)], "labels": ["a", "b"] }),
            ),
        )
        .await;

        let (status, json) = send(&router, get_req("/api/v1/entries?start=5&limit=10")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total"], 2);
        assert_eq!(json["entries"], json!([]));

        let (status, json) = send(&router, get_req("/api/v1/entries?start=1&limit=10")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["entries"][0]["label"], "b");
    }

    #[tokio::test]
    async fn role_routes_grant_list_and_revoke() {
        let router = test_router();
        let verifier = addr(3);

        let (_, json) = send(
            &router,
            post_req(
                "/api/v1/roles/verifier",
                admin(),
                json!({ "account": verifier }),
            ),
        )
        .await;
        assert_eq!(json["changed"], true);

        let uri = format!("/api/v1/roles/verifier/{verifier}");
        let (_, json) = send(&router, get_req(&uri)).await;
        assert_eq!(json["has_role"], true);

        let (_, json) = send(&router, get_req("/api/v1/roles/verifier")).await;
        assert_eq!(json["members"], json!([verifier]));

        let request = Request::builder()
            .method("DELETE")
            .uri(&uri)
            .header("x-api-token", TOKEN)
            .header("x-caller", admin().to_string())
            .body(Body::empty())
            .expect("request must build");
        let (status, json) = send(&router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["changed"], true);

        let (_, json) = send(&router, get_req(&uri)).await;
        assert_eq!(json["has_role"], false);
    }

    #[tokio::test]
    async fn unknown_role_is_not_found() {
        let router = test_router();
        let (status, _) = send(&router, get_req("/api/v1/roles/owner")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn events_page_reports_next_sequence() {
        let router = test_router();
        send(
            &router,
            post_req(
                "/api/v1/labels",
                admin(),
                json!({ "identifiers": [addr(1)], "labels": ["a"] }),
            ),
        )
        .await;

        let (status, json) = send(&router, get_req("/api/v1/events?since=0&limit=1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total"], 2);
        assert_eq!(json["next"], 1);
        assert_eq!(json["records"][0]["event"]["type"], "role_granted");

        let (_, json) = send(&router, get_req("/api/v1/events?since=1")).await;
        assert_eq!(json["next"], 2);
        assert_eq!(json["records"][0]["event"]["type"], "entry_change");
    }
}
