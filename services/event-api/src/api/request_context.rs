//! Request-scoped context extracted from HTTP requests.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use evauth_id::RequestId;
use sha2::{Digest, Sha256};

use crate::api::error::ApiError;

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorType {
    User,
    ServicePrincipal,
    /// No credentials were presented.
    Anonymous,
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub actor_type: ActorType,
    /// Name the actor's grants are keyed by.
    pub actor_id: String,
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn actor_from_authorization_header(
    headers: &HeaderMap,
    request_id: &str,
) -> Result<Option<(ActorType, String)>, ApiError> {
    let Some(auth_value) = header_string(headers, AUTHORIZATION_HEADER) else {
        return Ok(None);
    };

    let auth_value = auth_value.trim();
    let Some(token) = auth_value.strip_prefix("Bearer ") else {
        return Err(ApiError::unauthorized(
            "invalid_authorization",
            "Authorization must be a Bearer token",
        )
        .with_request_id(request_id.to_string()));
    };

    let token = token.trim();
    if token.is_empty() {
        return Err(ApiError::unauthorized(
            "invalid_authorization",
            "Authorization Bearer token cannot be empty",
        )
        .with_request_id(request_id.to_string()));
    }

    // `user:<name>` names a user, `sp:<id>` a service principal. Anything
    // else is opaque and maps to a stable hashed id; it is never logged.
    if let Some(name) = token.strip_prefix("user:") {
        let name = name.trim();
        if name.is_empty() || name.len() > 320 {
            return Err(ApiError::unauthorized(
                "invalid_token",
                "user token must be in the form 'user:<name>'",
            )
            .with_request_id(request_id.to_string()));
        }
        return Ok(Some((ActorType::User, name.to_string())));
    }

    if let Some(sp_id) = token.strip_prefix("sp:") {
        let sp_id = sp_id.trim();
        if sp_id.is_empty() {
            return Err(ApiError::unauthorized(
                "invalid_token",
                "service principal token must be in the form 'sp:<id>'",
            )
            .with_request_id(request_id.to_string()));
        }
        return Ok(Some((ActorType::ServicePrincipal, sp_id.to_string())));
    }

    let digest = Sha256::digest(token.as_bytes());
    let hex = format!("{:x}", digest);
    let short = hex.get(..32).unwrap_or(&hex);

    Ok(Some((ActorType::User, format!("tok_{short}"))))
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = header_string(&parts.headers, REQUEST_ID_HEADER)
            .unwrap_or_else(|| RequestId::new().to_string());

        let (actor_type, actor_id) = actor_from_authorization_header(&parts.headers, &request_id)?
            .unwrap_or((ActorType::Anonymous, String::new()));

        Ok(Self {
            request_id,
            actor_type,
            actor_id,
        })
    }
}
