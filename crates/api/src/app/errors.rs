use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use netops_queue::QueueStoreError;
use netops_session::SessionError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn queue_error_to_response(err: QueueStoreError) -> axum::response::Response {
    match err {
        QueueStoreError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        QueueStoreError::InvalidTransition { .. } => {
            json_error(StatusCode::CONFLICT, "conflict", err.to_string())
        }
        QueueStoreError::Storage(_) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", err.to_string())
        }
    }
}

/// Authorization failures deliberately collapse into one generic denial so a
/// probing client cannot distinguish "wrong key" from "wrong owner".
pub fn session_error_to_response(err: SessionError) -> axum::response::Response {
    match err {
        SessionError::NotFound | SessionError::DeviceNotFound => {
            json_error(StatusCode::NOT_FOUND, "not_found", "not found")
        }
        SessionError::Denied | SessionError::Expired | SessionError::AlreadyAttached => {
            json_error(StatusCode::FORBIDDEN, "forbidden", "forbidden")
        }
        SessionError::CredentialsMissing => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "credentials_missing",
            "device has no resolvable credentials",
        ),
        SessionError::Connect(msg) => json_error(StatusCode::BAD_GATEWAY, "connect_failed", msg),
        SessionError::Transcript(_) | SessionError::Storage(_) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "internal error",
        ),
    }
}
