use std::{borrow::Cow, future::Future};

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use tm_common::{brief::BriefResolutionError, db::ReferenceFetchError};

tokio::task_local! {
    static REQUEST_ID: String;
}

fn sanitize_message(message: &str) -> String {
    const MAX_CHARS: usize = 240;

    let cleaned = message
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .map(|token| {
            if token.contains("://") {
                "[redacted-url]".to_string()
            } else if token.starts_with('/') || token.contains('\\') {
                "[redacted-path]".to_string()
            } else {
                token.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    if cleaned.is_empty() {
        return "unexpected error".to_string();
    }
    if cleaned.chars().count() > MAX_CHARS {
        let mut truncated: String = cleaned.chars().take(MAX_CHARS).collect();
        truncated.push('…');
        return truncated;
    }
    cleaned
}

pub async fn with_request_id<Fut, T>(request_id: Option<String>, fut: Fut) -> T
where
    Fut: Future<Output = T>,
{
    match request_id {
        Some(request_id) => REQUEST_ID.scope(request_id, fut).await,
        None => fut.await,
    }
}

pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(|value| value.clone()).ok()
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid brief ({facet}): {message}")]
    InvalidBrief {
        facet: &'static str,
        message: String,
    },
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("reference data error: {0}")]
    Reference(String),
    #[error("too many requests: {0}")]
    TooManyRequests(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    facet: Option<&'static str>,
    request_id: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let code = self.code();
        let request_id = current_request_id();

        if status.is_server_error() {
            error!(code, status = %status, request_id = request_id.as_deref().unwrap_or(""), error = %self, "api_error");
        } else {
            warn!(code, status = %status, request_id = request_id.as_deref().unwrap_or(""), error = %self, "api_error");
        }

        let facet = match &self {
            ApiError::InvalidBrief { facet, .. } => Some(*facet),
            _ => None,
        };

        let body = Json(ErrorResponse {
            code,
            message: self.public_message().into_owned(),
            facet,
            request_id,
        });

        (status, body).into_response()
    }
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidBrief { .. } | ApiError::BadRequest(_) => "bad_request",
            ApiError::TooManyRequests(_) => "too_many_requests",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
            ApiError::Reference(_) => "reference_data_error",
            ApiError::Internal(_) => "internal_error",
        }
    }

    fn public_message(&self) -> Cow<'static, str> {
        match self {
            ApiError::InvalidBrief { message, .. } | ApiError::BadRequest(message) => {
                Cow::Owned(sanitize_message(message))
            }
            ApiError::TooManyRequests(_) => Cow::Borrowed("too many requests"),
            ApiError::ServiceUnavailable(_) => Cow::Borrowed("service unavailable"),
            ApiError::Reference(_) | ApiError::Internal(_) => Cow::Borrowed("internal server error"),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidBrief { .. } | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Reference(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BriefResolutionError> for ApiError {
    fn from(value: BriefResolutionError) -> Self {
        ApiError::InvalidBrief {
            facet: value.facet(),
            message: value.to_string(),
        }
    }
}

impl From<ReferenceFetchError> for ApiError {
    fn from(value: ReferenceFetchError) -> Self {
        ApiError::Reference(value.to_string())
    }
}
