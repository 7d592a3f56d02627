//! API error taxonomy surfaced to resource logic.

use reqwest::StatusCode;
use thiserror::Error;

use super::http::ApiResponse;
use crate::compute_env::PollError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Network failure before any response arrived
    #[error("failed to send request: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("invalid request for {operation}: {message}")]
    InvalidRequest {
        operation: &'static str,
        message: String,
    },

    /// Non-2xx response that no hook rewrote
    #[error("API request failed: {}", .0.status)]
    Status(Box<ApiResponse>),

    /// 409 on a create, rewritten into an actionable message
    #[error("{message}")]
    Conflict {
        resource_type: &'static str,
        resource_name: Option<String>,
        workspace: Option<String>,
        message: String,
    },

    /// Create/delete was accepted but never reached the desired state
    #[error("failed to poll compute environment status ({operation}): {source}")]
    ComputeEnv {
        operation: &'static str,
        #[source]
        source: PollError,
    },

    #[error("failed to decode {operation} response: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// HTTP status for response-carrying errors
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status(response) => Some(response.status),
            Self::Conflict { .. } => Some(StatusCode::CONFLICT),
            _ => None,
        }
    }

    /// Response attached to the error, if any
    pub fn response(&self) -> Option<&ApiResponse> {
        match self {
            Self::Status(response) => Some(&**response),
            _ => None,
        }
    }

    /// The caller should drop the resource from managed state
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}
