use crate::{
    AppState,
    error::AppError,
    models::{AccountProfile, ErrorEnvelope},
};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};

/// Users Router Module
///
/// Mounted at `/api/users`. Only read access to account profiles lives here; everything else
/// about user management is left to the collaborator that replaces this group.
pub fn users_routes() -> Router<AppState> {
    Router::new()
        // GET /api/users/{id}
        .route("/{id}", get(get_user))
}

/// get_user
///
/// Looks up one account. A missing account is a normal 404; a storage failure is not handled
/// here and goes to the Error Boundary.
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "Account identifier")),
    responses(
        (status = 200, description = "Account profile", body = AccountProfile),
        (status = 404, description = "No such account", body = ErrorEnvelope),
        (status = 500, description = "Storage failure", body = ErrorEnvelope)
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    match state.repo.find_account(&id).await? {
        Some(account) => Ok(Json(account.profile()).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(ErrorEnvelope::new("User not found")),
        )
            .into_response()),
    }
}
