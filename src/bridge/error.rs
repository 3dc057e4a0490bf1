use axum::response::{IntoResponse, Response};
use http::StatusCode;

/// Reasons a `/send` body cannot be relayed
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("failed to read request body: {0}")]
    Body(axum::Error),
    #[error("message is empty")]
    Empty,
    #[error("message is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::string::FromUtf8Error),
}

impl IntoResponse for SendError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read message: {self}"),
        )
            .into_response()
    }
}
