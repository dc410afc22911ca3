use async_trait::async_trait;
use axum_core::{
    body,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use http_body::Full;

use crate::user::Identity;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("authentication required")]
    MissingCredential,
    #[error("invalid or expired credential")]
    InvalidCredential,
    #[error("{0}")]
    Forbidden(String),
    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}

/// Contract for the external identity collaborator: a bearer credential in,
/// a (subject id, role) pair out. Callers trust the resolved identity.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn verify_bearer(&self, token: &str) -> Result<Identity, AuthError>;
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::MissingCredential | AuthError::InvalidCredential => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthError::Provider(e) => {
                tracing::error!("auth provider error: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = match self {
            AuthError::Provider(_) => "auth provider error".to_string(),
            other => other.to_string(),
        };
        Response::builder()
            .status(status)
            .body(body::boxed(Full::from(message)))
            .unwrap()
    }
}
