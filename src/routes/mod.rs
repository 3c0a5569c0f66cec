//! HTTP routes.
//!
//! Only the node status endpoint is served. Everything else falls through to
//! the router's 404 (unknown path) or 405 (unknown method on `/`).
//!
//! Request tracing is enabled via middleware that generates a unique request ID
//! for each incoming request.

pub mod health;

use axum::{middleware, routing::get, Router};
use http::header::{HeaderValue, CACHE_CONTROL};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::{RequestBodyTimeoutLayer, TimeoutLayer};

use crate::config::CACHE_CONTROL_STATUS;
use crate::middleware::request_id_layer;
use crate::state::AppState;

/// Creates the Axum router with the status route and server-wide limits.
pub fn create_router(state: AppState) -> Router {
    let web = state.config.web.clone();

    // Status - never cached, every probe must see the latest check
    let status_routes = Router::new()
        .route("/", get(health::status).head(health::status))
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_STATUS),
        ));

    Router::new()
        .merge(status_routes)
        .with_state(state)
        .layer(TimeoutLayer::new(web.write_timeout()))
        .layer(RequestBodyTimeoutLayer::new(web.read_timeout()))
        .layer(GlobalConcurrencyLimitLayer::new(web.max_concurrency))
        // Request ID middleware - creates root span with request_id for correlation
        .layer(middleware::from_fn(request_id_layer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::status::{CheckResult, StatusStore};
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use tower::ServiceExt;

    fn router(force_enabled: bool, store: StatusStore) -> Router {
        let mut config = AppConfig::default();
        config.check.force_enabled = force_enabled;
        create_router(AppState::new(config, store))
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_reports_available_node() {
        let store = StatusStore::new();
        store.commit(CheckResult::responded(10, 200, "ok"));

        let res = router(false, store)
            .oneshot(request(Method::GET, "/"))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[CACHE_CONTROL], "no-store");
        let body = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(
            std::str::from_utf8(&body).unwrap(),
            r#"{"NodeAvailable":true,"Timestamp":10,"HTTPResponseText":"ok","HTTPResponseCode":200,"ReasonText":"OK","ReasonCode":0}"#
        );
    }

    #[tokio::test]
    async fn test_get_before_first_check_is_unavailable() {
        let res = router(false, StatusStore::new())
            .oneshot(request(Method::GET, "/"))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["ReasonCode"], 2);
        assert_eq!(json["ReasonText"], "Node isn't available");
        assert_eq!(json["NodeAvailable"], false);
    }

    #[tokio::test]
    async fn test_force_enabled_reports_actual_status_alongside() {
        let store = StatusStore::new();
        store.commit(CheckResult::responded(3, 503, "down"));

        let res = router(true, store)
            .oneshot(request(Method::GET, "/"))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["ReasonCode"], 1);
        assert_eq!(json["ReasonText"], "Force enabled");
        assert_eq!(json["NodeAvailable"], false);
        assert_eq!(json["HTTPResponseCode"], 503);
    }

    #[tokio::test]
    async fn test_head_matches_get_status_without_body() {
        let store = StatusStore::new();
        store.commit(CheckResult::unreachable(4, "connection refused"));

        let res = router(false, store)
            .oneshot(request(Method::HEAD, "/"))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let res = router(false, StatusStore::new())
            .oneshot(request(Method::GET, "/health"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_post_is_not_allowed() {
        let res = router(false, StatusStore::new())
            .oneshot(request(Method::POST, "/"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
