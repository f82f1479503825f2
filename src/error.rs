use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::payment::ValidationError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Not found")]
    NotFound,
    #[error("Invalid JSON body")]
    MalformedBody,
    #[error("Internal error")]
    Store(#[from] StoreError),
}

#[derive(Serialize)]
struct ErrorBody {
    ok: bool,
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::MalformedBody => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Store(source) => tracing::error!(error = %source, "payment store failure"),
            ApiError::Validation(reason) => tracing::debug!(%reason, "payment rejected"),
            ApiError::MalformedBody => tracing::debug!("request body is not valid JSON"),
            ApiError::NotFound => {}
        }
        let body = Json(ErrorBody {
            ok: false,
            error: self.to_string(),
        });
        (self.status(), body).into_response()
    }
}

#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failures_hide_details() {
        let err = ApiError::from(StoreError::Unavailable("connection refused to 10.0.0.7".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Internal error");
    }

    #[test]
    fn validation_messages_pass_through() {
        let err = ApiError::from(ValidationError::Expiry);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Expiry MM/YY required");
    }
}
