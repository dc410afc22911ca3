use std::sync::Arc;

use async_trait::async_trait;
use axum_core::extract::{FromRef, FromRequestParts};
use http::{header, request::Parts};

use crate::{
    provider::{AuthError, AuthProvider},
    user::{Identity, Role},
};

/// A request identity proven to carry the staff role.
#[derive(Debug, Clone)]
pub struct StaffIdentity(pub Identity);

/// A request identity proven to carry the customer role.
#[derive(Debug, Clone)]
pub struct CustomerIdentity(pub Identity);

async fn authenticate<S>(parts: &mut Parts, state: &S) -> Result<Identity, AuthError>
where
    Arc<dyn AuthProvider>: FromRef<S>,
{
    let token = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AuthError::MissingCredential)?;

    let provider = Arc::<dyn AuthProvider>::from_ref(state);
    provider.verify_bearer(token).await
}

#[async_trait]
impl<S> FromRequestParts<S> for StaffIdentity
where
    S: Send + Sync,
    Arc<dyn AuthProvider>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = authenticate(parts, state).await?;
        if identity.role != Role::Staff {
            return Err(AuthError::Forbidden("staff role required".to_string()));
        }
        Ok(StaffIdentity(identity))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CustomerIdentity
where
    S: Send + Sync,
    Arc<dyn AuthProvider>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = authenticate(parts, state).await?;
        if identity.role != Role::Customer {
            return Err(AuthError::Forbidden("customer role required".to_string()));
        }
        Ok(CustomerIdentity(identity))
    }
}
