pub mod check_access;
pub mod group_members;
pub mod health;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gardengate_core::{AccessError, VerifiedIdentity};
use gardengate_telegram::InitDataVerifier;
use serde_json::json;
use tracing::{debug, error, warn};

/// Error reply for the API routes: `{ "hasAccess": false, "error": "..." }`.
///
/// Only a short fixed message reaches the client; the full error is logged.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl ApiError {
    pub fn bad_request(message: &'static str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        let (status, message) = match &err {
            AccessError::MalformedToken(_) => (StatusCode::BAD_REQUEST, "malformed initData"),
            AccessError::InvalidIdentity(_) => (StatusCode::UNAUTHORIZED, "invalid initData"),
            AccessError::BackendUnavailable(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "authorization backend unavailable",
            ),
            AccessError::BackendMisconfigured(_) | AccessError::Config(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "server misconfigured")
            }
            AccessError::Serialization(_) | AccessError::Io(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        };
        if status.is_server_error() {
            error!(
                code = err.code(),
                transient = err.is_transient(),
                error = %err,
                "request failed"
            );
        } else {
            warn!(code = err.code(), error = %err, "request rejected");
        }
        Self { status, message }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(error = %rejection.body_text(), "unparseable request body");
        Self::bad_request("invalid request body")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "hasAccess": false, "error": self.message })),
        )
            .into_response()
    }
}

/// `initData` from a request body; absent and blank are the same mistake.
pub fn require_init_data(init_data: Option<&str>) -> Result<&str, ApiError> {
    init_data
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing initData"))
}

/// Check `initData` against the bot token, logging why a payload failed.
pub fn verify_init_data(
    verifier: &InitDataVerifier,
    init_data: &str,
) -> Result<VerifiedIdentity, ApiError> {
    verifier.verify(init_data).map_err(|err| {
        debug!(code = err.code(), "initData verification failed");
        ApiError::from(AccessError::from(err))
    })
}
