//! Tagged response contract returned by every public operation
//!
//! Transport layers (REST, GraphQL) map `StatusKind` to their own wire codes;
//! this crate never touches HTTP types directly.

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::types::KoinoniaError;

/// Outcome taxonomy mirrored by the error type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusKind {
    Ok,
    Created,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    InternalServerError,
}

impl StatusKind {
    /// Numeric HTTP-style code for transport layers
    pub fn code(&self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Created => 201,
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::InternalServerError => 500,
        }
    }
}

/// Tagged outcome envelope: `{ success, status, message, data? }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiOutcome<T> {
    pub success: bool,
    pub status: StatusKind,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiOutcome<T> {
    /// Successful outcome with payload
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            status: StatusKind::Ok,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Successful creation outcome with payload
    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            status: StatusKind::Created,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Failure outcome from an error. Store-level failures log the original
    /// message for operators and return a generic message to the caller.
    pub fn failure(err: KoinoniaError) -> Self {
        let (status, message) = match &err {
            KoinoniaError::BadRequest(m) => (StatusKind::BadRequest, m.clone()),
            KoinoniaError::Unauthorized(m) => (StatusKind::Unauthorized, m.clone()),
            KoinoniaError::Forbidden(m) => (StatusKind::Forbidden, m.clone()),
            KoinoniaError::NotFound(m) => (StatusKind::NotFound, m.clone()),
            KoinoniaError::Conflict(m) => (StatusKind::Conflict, m.clone()),
            KoinoniaError::Database(m) | KoinoniaError::Internal(m) | KoinoniaError::Config(m) => {
                error!("internal failure surfaced to caller: {}", m);
                (
                    StatusKind::InternalServerError,
                    "internal server error".to_string(),
                )
            }
        };

        Self {
            success: false,
            status,
            message,
            data: None,
        }
    }
}

impl<T> From<KoinoniaError> for ApiOutcome<T> {
    fn from(err: KoinoniaError) -> Self {
        Self::failure(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(StatusKind::Ok.code(), 200);
        assert_eq!(StatusKind::Created.code(), 201);
        assert_eq!(StatusKind::Conflict.code(), 409);
        assert_eq!(StatusKind::Forbidden.code(), 403);
        assert_eq!(StatusKind::InternalServerError.code(), 500);
    }

    #[test]
    fn test_failure_preserves_client_errors() {
        let outcome: ApiOutcome<()> =
            ApiOutcome::failure(KoinoniaError::Conflict("already connected".into()));
        assert!(!outcome.success);
        assert_eq!(outcome.status, StatusKind::Conflict);
        assert_eq!(outcome.message, "already connected");
    }

    #[test]
    fn test_failure_masks_internal_detail() {
        let outcome: ApiOutcome<()> =
            ApiOutcome::failure(KoinoniaError::Database("connection pool exhausted".into()));
        assert_eq!(outcome.status, StatusKind::InternalServerError);
        assert_eq!(outcome.message, "internal server error");
    }

    #[test]
    fn test_serializes_camel_case() {
        let outcome = ApiOutcome::ok("ok", serde_json::json!({"id": 1}));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["success"], true);
    }
}
