//! Broker and admin authentication
//!
//! Brokers authenticate with a bearer API key. Only the SHA-256 digest is
//! ever stored; lookup goes through the engine's in-memory hash map, so
//! the store is never touched on the request path.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use sha2::{Digest, Sha256};

use types::ids::BrokerId;

use crate::error::ApiError;
use crate::state::AppState;

/// Hex-encoded SHA-256 digest of an API key
pub fn hash_api_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Compare a provided admin key against the configured one
///
/// Comparing digests rather than the raw strings keeps the comparison
/// independent of where the first mismatching byte falls.
pub fn verify_admin_key(provided: &str, configured: &str) -> bool {
    if configured.is_empty() {
        return false;
    }
    Sha256::digest(provided.as_bytes()) == Sha256::digest(configured.as_bytes())
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;
    let value = header
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Invalid Authorization header".to_string()))?;
    value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Expected bearer token".to_string()))
}

/// A broker resolved from its API key
pub struct AuthenticatedBroker {
    pub broker_id: BrokerId,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedBroker {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let key_hash = hash_api_key(token);

        let engine = state.engine.lock().await;
        let broker_id = engine
            .authenticate(&key_hash)
            .ok_or_else(|| ApiError::Unauthorized("Invalid API key".to_string()))?;
        Ok(AuthenticatedBroker { broker_id })
    }
}

/// Marker extractor for admin-gated routes
pub struct AdminAuth;

#[async_trait]
impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        if state.config.admin_api_key.is_empty() {
            return Err(ApiError::ServiceUnavailable(
                "Admin API key not configured".to_string(),
            ));
        }
        if !verify_admin_key(token, &state.config.admin_api_key) {
            return Err(ApiError::Unauthorized("Invalid admin API key".to_string()));
        }
        Ok(AdminAuth)
    }
}
