use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Serialize;

#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, DispatchError>;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl DispatchError {
    /// Machine-readable kind sent to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Unauthenticated(_) => "unauthenticated",
            DispatchError::PermissionDenied(_) => "permission-denied",
            DispatchError::InvalidArgument(_) => "invalid-argument",
            DispatchError::NotFound(_) => "not-found",
            DispatchError::Conflict(_) => "conflict",
            DispatchError::FailedPrecondition(_) => "failed-precondition",
            DispatchError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            DispatchError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            DispatchError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            DispatchError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            DispatchError::NotFound(_) => StatusCode::NOT_FOUND,
            DispatchError::Conflict(_) | DispatchError::FailedPrecondition(_) => {
                StatusCode::CONFLICT
            }
            DispatchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Human message; internal details never leave the process.
    pub fn public_message(&self) -> String {
        match self {
            DispatchError::Unauthenticated(m)
            | DispatchError::PermissionDenied(m)
            | DispatchError::InvalidArgument(m)
            | DispatchError::NotFound(m)
            | DispatchError::Conflict(m)
            | DispatchError::FailedPrecondition(m) => m.clone(),
            DispatchError::Internal(_) => "Something went wrong. Please try again".to_string(),
        }
    }

    pub fn into_response(self) -> std::result::Result<Response<Body>, Error> {
        if let DispatchError::Internal(detail) = &self {
            tracing::error!("Internal error: {}", detail);
        } else {
            tracing::warn!("Request rejected ({}): {}", self.kind(), self);
        }

        let error = ErrorResponse {
            error: self.kind().to_string(),
            message: self.public_message(),
        };
        Ok(Response::builder()
            .status(self.status_code())
            .header("Content-Type", "application/json")
            .header("Access-Control-Allow-Origin", "*")
            .body(serde_json::to_string(&error)?.into())
            .map_err(Box::new)?)
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(e: serde_json::Error) -> Self {
        DispatchError::InvalidArgument(format!("Invalid request body: {}", e))
    }
}

impl<E, R> From<aws_sdk_dynamodb::error::SdkError<E, R>> for DispatchError
where
    E: std::fmt::Debug,
    R: std::fmt::Debug,
{
    fn from(e: aws_sdk_dynamodb::error::SdkError<E, R>) -> Self {
        DispatchError::Internal(format!("AWS SDK error: {:?}", e))
    }
}
