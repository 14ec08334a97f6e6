//! Server error types with IntoResponse
//!
//! Database failures never reach this type: the index handler renders them
//! into the error view. What is left are failures of the server itself.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("template error: {0}")]
    Render(#[from] minijinja::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        // Log the actual error, return a generic body
        tracing::error!("Server error: {}", self);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}
