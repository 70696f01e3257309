use crate::{AppState, ApiDoc, models::PingResponse};
use axum::{Json, Router, routing::get};
use chrono::Utc;
use utoipa::OpenApi;

/// Public Router Module
///
/// Endpoints that sit outside every handler group and never touch storage.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /api/ping
        // Liveness check for monitors and load balancers. Answers even when storage is down.
        .route("/api/ping", get(ping))
        // GET /api/openapi.json
        // Machine-readable description of the core endpoints and envelopes.
        .route("/api/openapi.json", get(openapi))
}

/// ping
///
/// Returns `{status: "ok", time}` with the current UTC time.
#[utoipa::path(
    get,
    path = "/api/ping",
    responses((status = 200, description = "Server is up", body = PingResponse))
)]
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        status: "ok".to_string(),
        time: Utc::now(),
    })
}

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
