use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, Request},
    middleware::{from_fn, from_fn_with_state},
};
use utoipa::OpenApi;

use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod fallback;
pub mod middleware;
pub mod models;
pub mod repository;

// Sub-Router Registry: handler groups and public endpoints.
pub mod routes;

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use repository::{RepositoryState, SqliteRepository};
pub use routes::{HandlerGroup, RouteTable};

/// ApiDoc
///
/// OpenAPI description of the endpoints this crate owns and of the envelopes every client
/// can receive. Served at `/api/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(routes::public::ping, routes::users::get_user),
    components(schemas(
        models::PingResponse,
        models::AccountProfile,
        models::ErrorEnvelope,
        models::ApiMissResponse,
    )),
    tags((name = "medrecord", description = "MedRecord HTTP entry point"))
)]
pub struct ApiDoc;

/// AppState
///
/// The single, immutable container shared by every request: the storage handle and the
/// loaded configuration. Constructed once in `main`; there are no process-wide singletons.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: SQLite-backed account storage.
    pub repo: RepositoryState,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the full request pipeline around the route table. Layers added later wrap the
/// earlier ones, so the order below reads innermost to outermost. A request meets them as:
///
/// 1. CORS (pre-flight `OPTIONS` requests stop here)
/// 2. Request id generation, echoed on every response built below it
/// 3. Panic capture (Error Boundary for panics)
/// 4. Body decoding
/// 5. Tracing span and access log
/// 6. Routing, then the Fallback Dispatcher
pub fn create_router(state: AppState, table: RouteTable) -> Router {
    let x_request_id = HeaderName::from_static("x-request-id");

    table
        .into_router()
        .layer(from_fn(middleware::access_log))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace_span_logger)
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(tower_http::LatencyUnit::Millis),
                ),
        )
        .layer(from_fn_with_state(state.clone(), middleware::decode_body))
        .layer(CatchPanicLayer::custom(error::panic_response))
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .layer(middleware::cors_layer())
        .with_state(state)
}

/// trace_span_logger
///
/// Span for one request: method, URI, request id, and the handler group that owns the path
/// (if any), so every log line of a request can be correlated.
fn trace_span_logger<B>(request: &Request<B>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");
    let group = RouteTable::resolve(request.uri().path())
        .map(HandlerGroup::prefix)
        .unwrap_or("-");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
        group = %group,
    )
}
