use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::store::StoreError;

/// Failure taxonomy of the booking core. Handlers return this directly; the
/// response mapping keeps the kind visible to callers so a `Conflict` ("try
/// another slot") is distinguishable from a system failure.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            // a write lost the race against a concurrent committer
            StoreError::SlotTaken => DomainError::Conflict(
                "the requested time window was just booked by someone else".to_string(),
            ),
            StoreError::Backend(e) => DomainError::Internal(e),
        }
    }
}

impl IntoResponse for DomainError {
    fn into_response(self) -> Response {
        let status = match &self {
            DomainError::Validation(_) => StatusCode::BAD_REQUEST,
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::Conflict(_) => StatusCode::CONFLICT,
            DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
            DomainError::Internal(e) => {
                tracing::error!("internal error: {:#}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn store_race_surfaces_as_conflict() {
        let err = DomainError::from(StoreError::SlotTaken);
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn status_codes_follow_the_error_kind() {
        let cases = [
            (DomainError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (DomainError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (DomainError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (DomainError::Forbidden("x".into()), StatusCode::FORBIDDEN),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
