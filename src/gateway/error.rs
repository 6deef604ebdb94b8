//! HTTP error types for the gateway.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::context::Interrupted;
use crate::network::ClientError;
use crate::protocol::RpcError;

/// Error wrapper for converting client failures to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    Client(ClientError),
    BadRequest(String),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Client(ClientError::Remote(err)) => match err.code {
                RpcError::NOT_FOUND => StatusCode::NOT_FOUND,
                RpcError::INVALID_ARGUMENT => StatusCode::BAD_REQUEST,
                RpcError::DEADLINE_EXCEEDED => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Client(ClientError::Interrupted(Interrupted::DeadlineExceeded)) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            ApiError::Client(ClientError::Transport(_) | ClientError::UnexpectedReply { .. }) => {
                StatusCode::BAD_GATEWAY
            }
            ApiError::Client(ClientError::Interrupted(Interrupted::Cancelled)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Client(ClientError::Remote(err)) => err.message.clone(),
            ApiError::Client(err) => err.to_string(),
            ApiError::BadRequest(msg) | ApiError::Internal(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({ "message": self.message() });
        (status, Json(body)).into_response()
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        ApiError::Client(err)
    }
}
