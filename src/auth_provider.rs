use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use bearer_auth_middleware::{AuthError, AuthProvider, Identity, Role};
use serde::Deserialize;
use uuid::Uuid;

use crate::store::ProfileStore;

#[derive(Deserialize)]
struct VerifiedUser {
    id: Uuid,
}

/// Verifies bearer tokens against the external identity service, then
/// resolves the role from the local profile row. A token the service accepts
/// but with no profile behind it still gets rejected.
pub struct RemoteAuthProvider {
    http: reqwest::Client,
    verify_url: String,
    profiles: Arc<dyn ProfileStore>,
}

impl RemoteAuthProvider {
    pub fn new(verify_url: String, profiles: Arc<dyn ProfileStore>) -> RemoteAuthProvider {
        RemoteAuthProvider {
            http: reqwest::Client::new(),
            verify_url,
            profiles,
        }
    }
}

#[async_trait]
impl AuthProvider for RemoteAuthProvider {
    async fn verify_bearer(&self, token: &str) -> Result<Identity, AuthError> {
        let response = self
            .http
            .get(&self.verify_url)
            .bearer_auth(token)
            .send()
            .await
            .context("identity service is unreachable")?;
        if !response.status().is_success() {
            return Err(AuthError::InvalidCredential);
        }

        let user: VerifiedUser = response
            .json()
            .await
            .context("identity service returned a malformed user")?;

        let profile = self
            .profiles
            .find(user.id)
            .context("profile lookup failed")?
            .ok_or_else(|| AuthError::Forbidden("no profile for this account".to_string()))?;

        let role: Role = profile
            .role
            .parse()
            .map_err(|_| AuthError::Forbidden(format!("unknown role {:?}", profile.role)))?;

        Ok(Identity {
            user_id: user.id,
            role,
        })
    }
}
