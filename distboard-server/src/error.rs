//! Error types for the server

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use distboard::DistError;
use error_stack::Report;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Dashboard(DistError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<Report<DistError>> for ServerError {
    fn from(report: Report<DistError>) -> Self {
        ServerError::Dashboard(report.current_context().clone())
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Dashboard(DistError::Degenerate(_) | DistError::Binding(_)) => {
                StatusCode::BAD_REQUEST
            }
            ServerError::Dashboard(DistError::Domain(_) | DistError::Computation(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let kind = match &self {
            ServerError::Dashboard(e) => e.kind(),
            _ => "server",
        };
        let body = Json(json!({
            "error": self.to_string(),
            "kind": kind,
        }));

        (self.status(), body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
