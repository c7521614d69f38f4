//! HTTP surface tests against the full router with a simulated driver.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use bio600_scanserver::device::SimulatedDriver;
use bio600_scanserver::state::{AppConfig, AppState};
use bio600_scanserver::web_api::routes;

fn ready_app() -> Router {
    let state = AppState::new(AppConfig::default(), Arc::new(SimulatedDriver::new()));
    state.session.init().unwrap();
    routes::create_router(state)
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn healthz_reports_device_state() {
    let app = ready_app();
    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_string(response).await;
    assert!(body.contains("\"status\":\"ok\""));
    assert!(body.contains("\"device_connected\":true"));
}

#[tokio::test]
async fn capture_returns_image_payload() {
    let app = ready_app();
    let response = app
        .oneshot(post_json(
            "/api/fingerprint/capture",
            r#"{"width":8,"height":8}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_string(response).await;
    assert!(body.contains("\"success\":true"));
    assert!(body.contains("\"imageData\""));
    assert!(body.contains("\"quality\":80"));
}

#[tokio::test]
async fn capture_without_init_is_service_unavailable() {
    let state = AppState::new(AppConfig::default(), Arc::new(SimulatedDriver::new()));
    let app = routes::create_router(state);

    let response = app
        .oneshot(post_json("/api/fingerprint/capture", "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = body_string(response).await;
    assert!(body.contains("DEVICE_NOT_CONNECTED"));
}

#[tokio::test]
async fn dry_wet_level_out_of_range_is_bad_request() {
    let app = ready_app();
    let response = app
        .oneshot(post_json("/api/fingerprint/dry-wet/9", ""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_string(response).await;
    assert!(body.contains("INVALID_FORMAT"));
}

#[tokio::test]
async fn compare_endpoint_applies_threshold() {
    let app = ready_app();
    let template = {
        use base64::Engine as _;
        base64::engine::general_purpose::STANDARD.encode([1u8; 64])
    };
    let body = format!(r#"{{"template1":"{t}","template2":"{t}"}}"#, t = template);

    let response = app
        .oneshot(post_json("/api/fingerprint/compare", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_string(response).await;
    assert!(body.contains("\"isMatch\":true"));
    assert!(body.contains("\"score\":90"));
}

#[tokio::test]
async fn template_store_roundtrip_and_miss() {
    let state = AppState::new(AppConfig::default(), Arc::new(SimulatedDriver::new()));
    state.session.init().unwrap();
    let app = routes::create_router(state);

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/fingerprint/template/store/thumb-r",
            r#"{"template":"QUJD"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/fingerprint/template/thumb-r")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("QUJD"));

    let response = app
        .clone()
        .oneshot(post_json("/api/fingerprint/template/clear", ""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/fingerprint/template/missing")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn split_four_right_names_fingers() {
    let app = ready_app();
    let response = app
        .oneshot(post_json("/api/fingerprint/split/four-right", "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_string(response).await;
    assert!(body.contains("\"fingerCount\":4"));
    assert!(body.contains("right_index"));
    assert!(body.contains("right_little"));
}
