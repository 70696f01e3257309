//! Fallback Dispatcher.
//!
//! Runs for every request the handler groups did not resolve. Stages are tried in a fixed
//! order and the first one that handles the request answers it:
//!
//! 1. API miss: anything under `/api` gets a JSON 404.
//! 2. Upload miss: anything under `/uploads` is served from the uploads directory or gets a
//!    plain-text 404. Never the SPA shell.
//! 3. Static hit: a file under the static root.
//! 4. SPA fallback: GET navigation gets the SPA entry document.
//! 5. Generic miss: a 404 for everything else.

use std::path::Path;

use axum::{
    Json,
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::{
    AppState,
    error::AppError,
    models::{ApiMissResponse, ErrorEnvelope},
    routes::{API_PREFIX, path_is_under},
};

/// URL namespace for user uploads.
pub const UPLOADS_PREFIX: &str = "/uploads";

/// Outcome of one stage.
pub enum Resolution {
    Handled(Response),
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackStage {
    ApiMiss,
    UploadMiss,
    StaticHit,
    SpaFallback,
    GenericMiss,
}

impl FallbackStage {
    pub const ORDER: [FallbackStage; 5] = [
        FallbackStage::ApiMiss,
        FallbackStage::UploadMiss,
        FallbackStage::StaticHit,
        FallbackStage::SpaFallback,
        FallbackStage::GenericMiss,
    ];

    async fn evaluate(
        self,
        state: &AppState,
        request: &MissedRequest,
    ) -> Result<Resolution, AppError> {
        match self {
            FallbackStage::ApiMiss => Ok(api_miss(request)),
            FallbackStage::UploadMiss => upload_miss(state, request).await,
            FallbackStage::StaticHit => static_hit(state, request).await,
            FallbackStage::SpaFallback => spa_fallback(state, request).await,
            FallbackStage::GenericMiss => {
                generic_miss(state, request).await.map(Resolution::Handled)
            }
        }
    }
}

/// The parts of an unresolved request the stages look at. The body is never needed.
#[derive(Debug)]
struct MissedRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
}

impl MissedRequest {
    fn path(&self) -> &str {
        self.uri.path()
    }

    fn original_url(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| self.uri.path())
    }

    fn is_api(&self) -> bool {
        path_is_under(self.path(), API_PREFIX)
    }

    fn is_read(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }
}

/// dispatch
///
/// Router fallback. Walks the stages in order until one handles the request.
pub async fn dispatch(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, AppError> {
    let (parts, _body) = request.into_parts();
    let missed = MissedRequest {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
    };

    for stage in FallbackStage::ORDER {
        if let Resolution::Handled(response) = stage.evaluate(&state, &missed).await? {
            tracing::debug!(
                ?stage,
                path = missed.path(),
                status = %response.status(),
                "fallback resolved"
            );
            return Ok(response);
        }
    }

    // GenericMiss always handles; kept so exhaustion still answers.
    generic_miss(&state, &missed).await
}

fn api_miss(request: &MissedRequest) -> Resolution {
    if !request.is_api() {
        return Resolution::Unresolved;
    }
    Resolution::Handled(
        (
            StatusCode::NOT_FOUND,
            Json(ApiMissResponse {
                msg: "API endpoint not found".to_string(),
                url: request.original_url().to_string(),
                method: request.method.to_string(),
            }),
        )
            .into_response(),
    )
}

async fn upload_miss(state: &AppState, request: &MissedRequest) -> Result<Resolution, AppError> {
    let Some(rest) = request.path().strip_prefix(UPLOADS_PREFIX) else {
        return Ok(Resolution::Unresolved);
    };
    if !(rest.is_empty() || rest.starts_with('/')) {
        return Ok(Resolution::Unresolved);
    }

    if request.is_read() {
        let response = serve_file(&state.config.uploads_dir, request, rest, false).await?;
        if response.status() != StatusCode::NOT_FOUND {
            return Ok(Resolution::Handled(response));
        }
    }

    Ok(Resolution::Handled(
        (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            "File Not Found",
        )
            .into_response(),
    ))
}

async fn static_hit(state: &AppState, request: &MissedRequest) -> Result<Resolution, AppError> {
    if !request.is_read() || request.is_api() {
        return Ok(Resolution::Unresolved);
    }

    let response = serve_file(&state.config.static_dir, request, request.path(), true).await?;
    if response.status() == StatusCode::NOT_FOUND {
        Ok(Resolution::Unresolved)
    } else {
        Ok(Resolution::Handled(response))
    }
}

async fn spa_fallback(state: &AppState, request: &MissedRequest) -> Result<Resolution, AppError> {
    if request.method != Method::GET || request.is_api() {
        return Ok(Resolution::Unresolved);
    }
    Ok(Resolution::Handled(
        spa_document(&state.config.spa_index, StatusCode::OK).await?,
    ))
}

async fn generic_miss(state: &AppState, request: &MissedRequest) -> Result<Response, AppError> {
    if request.is_api() || request.method != Method::GET {
        return Ok((StatusCode::NOT_FOUND, Json(ErrorEnvelope::new("Not Found"))).into_response());
    }
    // The client application renders its own not-found view.
    spa_document(&state.config.spa_index, StatusCode::NOT_FOUND).await
}

/// Reads the SPA entry document. A missing document is a server failure, not a 404.
async fn spa_document(index: &Path, status: StatusCode) -> Result<Response, AppError> {
    let html = tokio::fs::read(index).await?;
    Ok((status, Html(html)).into_response())
}

/// serve_file
///
/// Hands the request to `ServeDir` rooted at `root`, with the URI path rewritten to
/// `relative`. Conditional and range headers are forwarded. `ServeDir` rejects traversal
/// outside the root and answers 404 for anything it cannot find.
async fn serve_file(
    root: &Path,
    request: &MissedRequest,
    relative: &str,
    index_html: bool,
) -> Result<Response, AppError> {
    let relative = if relative.is_empty() { "/" } else { relative };
    let uri: Uri = match request.uri.query() {
        Some(query) => format!("{relative}?{query}").parse()?,
        None => relative.parse()?,
    };

    let mut file_request = Request::new(Body::empty());
    *file_request.method_mut() = request.method.clone();
    *file_request.uri_mut() = uri;
    *file_request.headers_mut() = request.headers.clone();

    let response = ServeDir::new(root)
        .append_index_html_on_directories(index_html)
        .oneshot(file_request)
        .await
        .unwrap_or_else(|never| match never {});

    Ok(response.into_response())
}
