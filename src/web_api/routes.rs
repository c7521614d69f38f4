//! HTTP route table and handlers
//!
//! Capture handlers accept an optional JSON body; an empty request uses
//! the device defaults. Transport-level problems surface as typed error
//! responses; acquisition outcomes ride in the result DTOs.

use axum::extract::{ConnectInfo, Path, State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::capture::{HandSide, SplitKind};
use crate::error::Result;
use crate::models::{
    ApiResponse, CaptureRequest, CaptureResult, CompareRequest, CompareResult, ControlResult,
    DeviceSettingsRequest, DeviceStatus, FingerTypeRequest, FingerTypeResult, HealthResponse,
    MultiTemplateResult, RollRequest, SplitRequest, SplitResult, StoreTemplateRequest,
    TemplateRequest, TemplateResult,
};
use crate::state::AppState;

use super::{device_status, ws};

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/status", get(api_status))
        .route("/api/fingerprint/initialize", post(fingerprint_initialize))
        .route("/api/fingerprint/close", post(fingerprint_close))
        .route("/api/fingerprint/status", get(fingerprint_status))
        .route("/api/fingerprint/capture", post(capture))
        .route("/api/fingerprint/template", post(capture_template))
        .route("/api/fingerprint/split/four-right", post(split_four_right))
        .route("/api/fingerprint/split/two-thumbs", post(split_two_thumbs))
        .route("/api/fingerprint/capture/roll", post(capture_roll))
        .route("/api/fingerprint/compare", post(compare_templates))
        .route("/api/fingerprint/capture/finger-type", post(capture_finger_type))
        .route("/api/fingerprint/capture/two-thumbs", post(capture_two_thumbs))
        .route(
            "/api/fingerprint/capture/right-four-templates",
            post(right_four_templates),
        )
        .route(
            "/api/fingerprint/capture/left-four-templates",
            post(left_four_templates),
        )
        .route("/api/fingerprint/capture/full-right-four", post(full_right_four))
        .route("/api/fingerprint/capture/full-left-four", post(full_left_four))
        .route("/api/fingerprint/settings", post(set_device_settings))
        .route("/api/fingerprint/beep/:beep_type", post(play_beep))
        .route("/api/fingerprint/led/:image_index", post(set_led))
        .route("/api/fingerprint/lcd/:image_index", post(set_lcd))
        .route("/api/fingerprint/dry-wet/:level", post(set_dry_wet))
        .route("/api/fingerprint/template/store/:template_id", post(store_template))
        .route("/api/fingerprint/template/clear", post(clear_templates))
        .route("/api/fingerprint/template/:template_id", get(fetch_template))
        .route("/api/preview/start", post(preview_start))
        .route("/api/preview/stop", post(preview_stop))
        .route("/api/preview/status", get(preview_status))
        .route("/ws/fingerprint", get(websocket_upgrade))
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = device_status(&state);
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_sec: state.uptime_sec(),
        device_connected: status.connected,
        matcher_available: status.matcher_available,
    })
}

async fn api_status(State(state): State<AppState>) -> Json<ApiResponse<DeviceStatus>> {
    Json(ApiResponse::success(device_status(&state)))
}

async fn fingerprint_initialize(State(state): State<AppState>) -> Result<Json<ApiResponse<DeviceStatus>>> {
    state.session.init()?;
    Ok(Json(ApiResponse::success(device_status(&state))))
}

async fn fingerprint_close(State(state): State<AppState>) -> Json<ApiResponse<DeviceStatus>> {
    // Preview must release the device lease before teardown
    state.preview.stop();
    state.session.close();
    Json(ApiResponse::success(device_status(&state)))
}

async fn fingerprint_status(State(state): State<AppState>) -> Json<ApiResponse<DeviceStatus>> {
    Json(ApiResponse::success(device_status(&state)))
}

async fn capture(
    State(state): State<AppState>,
    body: Option<Json<CaptureRequest>>,
) -> Result<Json<CaptureResult>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(state.orchestrator.capture_flat(&req).await?))
}

async fn capture_template(
    State(state): State<AppState>,
    body: Option<Json<TemplateRequest>>,
) -> Result<Json<TemplateResult>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(state.orchestrator.capture_template(&req).await?))
}

async fn split_four_right(
    State(state): State<AppState>,
    body: Option<Json<SplitRequest>>,
) -> Result<Json<SplitResult>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(
        state
            .orchestrator
            .capture_split(&req, SplitKind::FourRight)
            .await?,
    ))
}

async fn split_two_thumbs(
    State(state): State<AppState>,
    body: Option<Json<SplitRequest>>,
) -> Result<Json<SplitResult>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(
        state
            .orchestrator
            .capture_split(&req, SplitKind::TwoThumbs)
            .await?,
    ))
}

async fn capture_roll(
    State(state): State<AppState>,
    body: Option<Json<RollRequest>>,
) -> Result<Json<CaptureResult>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(state.orchestrator.capture_roll(&req).await?))
}

async fn compare_templates(
    State(state): State<AppState>,
    Json(req): Json<CompareRequest>,
) -> Result<Json<CompareResult>> {
    Ok(Json(state.orchestrator.compare(&req).await?))
}

async fn capture_finger_type(
    State(state): State<AppState>,
    body: Option<Json<FingerTypeRequest>>,
) -> Result<Json<FingerTypeResult>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(state.orchestrator.capture_finger_type(&req).await?))
}

async fn capture_two_thumbs(
    State(state): State<AppState>,
    body: Option<Json<FingerTypeRequest>>,
) -> Result<Json<FingerTypeResult>> {
    let mut req = body.map(|Json(r)| r).unwrap_or_default();
    req.finger_type = 3;
    Ok(Json(state.orchestrator.capture_finger_type(&req).await?))
}

async fn right_four_templates(
    State(state): State<AppState>,
    body: Option<Json<TemplateRequest>>,
) -> Result<Json<MultiTemplateResult>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(
        state
            .orchestrator
            .capture_four_templates(HandSide::Right, &req)
            .await?,
    ))
}

async fn left_four_templates(
    State(state): State<AppState>,
    body: Option<Json<TemplateRequest>>,
) -> Result<Json<MultiTemplateResult>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(
        state
            .orchestrator
            .capture_four_templates(HandSide::Left, &req)
            .await?,
    ))
}

async fn full_right_four(
    State(state): State<AppState>,
    body: Option<Json<TemplateRequest>>,
) -> Result<Json<TemplateResult>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(
        state
            .orchestrator
            .capture_full_four(HandSide::Right, &req)
            .await?,
    ))
}

async fn full_left_four(
    State(state): State<AppState>,
    body: Option<Json<TemplateRequest>>,
) -> Result<Json<TemplateResult>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(
        state
            .orchestrator
            .capture_full_four(HandSide::Left, &req)
            .await?,
    ))
}

async fn set_device_settings(
    State(state): State<AppState>,
    body: Option<Json<DeviceSettingsRequest>>,
) -> Result<Json<ControlResult>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(state.orchestrator.set_device_settings(&req).await?))
}

async fn play_beep(
    State(state): State<AppState>,
    Path(beep_type): Path<i32>,
) -> Result<Json<ControlResult>> {
    Ok(Json(state.orchestrator.play_beep(beep_type).await?))
}

async fn set_led(
    State(state): State<AppState>,
    Path(image_index): Path<i32>,
) -> Result<Json<ControlResult>> {
    Ok(Json(state.orchestrator.set_led(image_index).await?))
}

async fn set_lcd(
    State(state): State<AppState>,
    Path(image_index): Path<i32>,
) -> Result<Json<ControlResult>> {
    Ok(Json(state.orchestrator.set_lcd(image_index).await?))
}

async fn set_dry_wet(
    State(state): State<AppState>,
    Path(level): Path<i32>,
) -> Result<Json<ControlResult>> {
    Ok(Json(state.orchestrator.set_dry_wet(level).await?))
}

async fn store_template(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
    Json(req): Json<StoreTemplateRequest>,
) -> Json<ApiResponse<serde_json::Value>> {
    state.store.store(&template_id, req.template);
    Json(ApiResponse::success(json!({ "id": template_id })))
}

async fn fetch_template(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>> {
    let template = state.store.fetch(&template_id)?;
    Ok(Json(ApiResponse::success(json!({
        "id": template_id,
        "template": template,
    }))))
}

async fn clear_templates(State(state): State<AppState>) -> Json<ApiResponse<serde_json::Value>> {
    let cleared = state.store.len();
    state.store.clear();
    Json(ApiResponse::success(json!({ "cleared": cleared })))
}

async fn preview_start(State(state): State<AppState>) -> Result<Json<ApiResponse<serde_json::Value>>> {
    state.session.ensure_ready()?;
    let started = state.preview.start();
    Ok(Json(ApiResponse::success(json!({
        "started": started,
        "active": state.preview.is_active(),
    }))))
}

async fn preview_stop(State(state): State<AppState>) -> Json<ApiResponse<serde_json::Value>> {
    let stopped = state.preview.stop();
    Json(ApiResponse::success(json!({
        "stopped": stopped,
        "active": state.preview.is_active(),
    })))
}

async fn preview_status(State(state): State<AppState>) -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::success(json!({
        "active": state.preview.is_active(),
        "fps": state.preview.current_fps(),
        "connectedClients": state.registry.client_count(),
    })))
}

async fn websocket_upgrade(
    websocket: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    websocket.on_upgrade(move |socket| ws::handle_socket(socket, addr, state))
}
