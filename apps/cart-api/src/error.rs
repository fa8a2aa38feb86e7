//! API error type: wraps every layer's errors and renders the
//! `{success, code, message, data, operation}` envelope with a nested
//! `userError` on failure.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use cart_core::CoreError;
use cart_events::EventError;
use cart_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error("terminal not opened")]
    TerminalNotOpened,

    #[error("staff not signed in")]
    StaffNotSignedIn,

    #[error("invalid api key")]
    InvalidApiKey,

    #[error("request forbidden: {0}")]
    Forbidden(String),

    #[error("counter allocation failed: {0}")]
    CounterAllocationFailed(String),

    #[error("invalid request: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Core(err) => core_status_and_code(err),
            ApiError::Store(StoreError::NotFound { .. }) => (StatusCode::NOT_FOUND, "300101"),
            ApiError::Store(StoreError::ConcurrencyRetryExhausted { .. }) => (StatusCode::CONFLICT, "300102"),
            ApiError::Store(StoreError::CircuitOpen { .. }) => (StatusCode::SERVICE_UNAVAILABLE, "300103"),
            ApiError::Store(StoreError::Core(err)) => core_status_and_code(err),
            ApiError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "300199"),
            ApiError::Event(_) => (StatusCode::INTERNAL_SERVER_ERROR, "400101"),
            ApiError::TerminalNotOpened => (StatusCode::FORBIDDEN, "500101"),
            ApiError::StaffNotSignedIn => (StatusCode::FORBIDDEN, "500102"),
            ApiError::InvalidApiKey => (StatusCode::UNAUTHORIZED, "500103"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "500104"),
            ApiError::CounterAllocationFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "600101"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "500199"),
        }
    }
}

fn core_status_and_code(err: &CoreError) -> (StatusCode, &'static str) {
    let code = cart_core::error::codes::for_error(err);
    let status = match err {
        CoreError::InvalidCartState { .. } => StatusCode::CONFLICT,
        CoreError::TransactionAlreadyVoided { .. } | CoreError::AlreadyRefunded { .. } => StatusCode::CONFLICT,
        CoreError::NotSameTerminal | CoreError::NotSameStore => StatusCode::FORBIDDEN,
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_REQUEST,
    };
    (status, code)
}

#[derive(Serialize)]
struct UserError {
    code: &'static str,
    message: String,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    success: bool,
    code: u16,
    message: String,
    data: Option<()>,
    operation: Option<String>,
    #[serde(rename = "userError")]
    user_error: UserError,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = self.to_string();

        let body = ErrorEnvelope {
            success: false,
            code: status.as_u16(),
            message: message.clone(),
            data: None,
            operation: None,
            user_error: UserError { code, message },
        };

        (status, Json(body)).into_response()
    }
}
