//! Axum Handlers for the REST API
//!
//! Read-only access to archived voice sessions. Sessions are written by the
//! WebSocket bridge when a conversation ends, never through this API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::{
    models::{ErrorResponse, SessionDetail, SessionSummary},
    state::AppState,
};

pub enum ApiError {
    NotFound(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// List archived voice sessions, most recent first.
#[utoipa::path(
    get,
    path = "/sessions",
    responses(
        (status = 200, description = "Archived sessions", body = [SessionSummary]),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SessionSummary>>, ApiError> {
    let sessions = state.db.list_sessions().await?;
    Ok(Json(sessions))
}

/// Get one archived session with its transcript.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    responses(
        (status = 200, description = "Session with messages", body = SessionDetail),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionDetail>, ApiError> {
    state
        .db
        .get_session(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Session {} not found", id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn not_found_maps_to_404_with_message() {
        let response = ApiError::NotFound("Session x not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"message":"Session x not found"}"#);
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let response = ApiError::from(anyhow::anyhow!("connection refused")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(!String::from_utf8_lossy(&body).contains("refused"));
    }
}
