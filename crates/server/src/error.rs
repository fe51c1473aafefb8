use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Clone, Debug, Error)]
pub enum ValidationError {
    #[error("input value is invalid: `{value}`, reason: {reason}")]
    InvalidInput { value: String, reason: String },
    #[error("limit exceeded for {subject}, allowed {limit} {unit}(s), got {attempted}")]
    LimitExceeded {
        subject: String,
        unit: String,
        attempted: usize,
        limit: usize,
    },
}

/// Failures of the backing message and image stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("malformed continuation token")]
    BadToken,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("dynamodb error: {0}")]
    DynamoDb(#[from] aws_sdk_dynamodb::Error),
    #[error("dynamodb request error: {0}")]
    Build(#[from] aws_sdk_dynamodb::error::BuildError),
    #[error("dynamodb left {0} write(s) unprocessed after retries")]
    Unprocessed(usize),
    #[error("dynamodb item error: {0}")]
    Item(#[from] serde_dynamo::Error),
    #[error("s3 error: {0}")]
    S3(#[from] aws_sdk_s3::Error),
    #[error("reader task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Validation(e) => (StatusCode::BAD_REQUEST, json!({ "error": e.to_string() })),
            Self::Store(StoreError::NotFound(what)) => (
                StatusCode::NOT_FOUND,
                json!({ "error": format!("{what} not found.") }),
            ),
            Self::Store(e @ StoreError::BadToken) => {
                (StatusCode::BAD_REQUEST, json!({ "error": e.to_string() }))
            }
            Self::Store(e) => {
                error!("received internal error for user request: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Failed to fetch data", "details": e.to_string() }),
                )
            }
        };
        (status, axum::Json(body)).into_response()
    }
}
