use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use crate::{AppState, error::AppError};

/// cors_layer
///
/// Cross-origin policy: the caller's origin is reflected back, credentials are allowed, and
/// requested methods / headers are mirrored. Any `OPTIONS` request is answered here with an
/// empty success response, so pre-flights never reach decoding, logging or routing.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// DecodedBody
///
/// Request extension holding the parsed body. Handlers that care can read it with
/// `Extension<DecodedBody>`; the raw bytes remain available as the request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DecodedBody {
    #[default]
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
}

impl BodyKind {
    fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let content_type = headers
            .get(header::CONTENT_TYPE)?
            .to_str()
            .ok()?
            .split(';')
            .next()?
            .trim()
            .to_ascii_lowercase();

        match content_type.as_str() {
            "application/json" => Some(BodyKind::Json),
            "application/x-www-form-urlencoded" => Some(BodyKind::Form),
            _ => None,
        }
    }

    fn decode(self, bytes: &Bytes) -> Result<DecodedBody, AppError> {
        if bytes.is_empty() {
            return Ok(DecodedBody::Empty);
        }
        match self {
            BodyKind::Json => serde_json::from_slice(bytes)
                .map(DecodedBody::Json)
                .map_err(|e| AppError::BodyDecode(e.to_string())),
            BodyKind::Form => Ok(DecodedBody::Form(
                url::form_urlencoded::parse(bytes).into_owned().collect(),
            )),
        }
    }
}

/// decode_body
///
/// Buffers and parses JSON and form-encoded bodies up to the configured limit. Any other
/// content type is streamed through untouched. Failures become `AppError`s and are rendered
/// by the Error Boundary.
pub async fn decode_body(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(kind) = BodyKind::from_headers(request.headers()) else {
        return Ok(next.run(request).await);
    };

    let limit = state.config.body_limit;
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());
    if declared.is_some_and(|length| length > limit) {
        return Err(AppError::BodyTooLarge { limit });
    }

    let (mut parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|_| AppError::BodyTooLarge { limit })?;

    let decoded = kind.decode(&bytes)?;
    parts.extensions.insert(decoded);

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

/// access_log
///
/// One line per request that made it past the cross-origin and decoding layers.
pub async fn access_log(request: Request, next: Next) -> Response {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    tracing::info!(
        target: "access",
        %timestamp,
        method = %request.method(),
        path = %request.uri(),
        "[{}] {} {}",
        timestamp,
        request.method(),
        request.uri()
    );
    next.run(request).await
}
