//! Caller identity from a verified EdDSA bearer token.
//!
//! Tokens are issued by the identity collaborator; this service only
//! verifies them. The `sub` claim is the acting actor's id.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use referline_core::models::actor::ActorRole;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;

/// JWT claims carried by caller tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerClaims {
    /// Subject — actor ID (UUID string).
    pub sub: String,
    pub role: ActorRole,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// The authenticated actor behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub actor_id: Uuid,
    pub role: ActorRole,
}

#[derive(Clone)]
pub struct CallerVerifier {
    key: DecodingKey,
    issuer: String,
}

impl CallerVerifier {
    /// Build a verifier from a PEM-encoded Ed25519 public key.
    pub fn from_ed_pem(
        public_key_pem: &str,
        issuer: impl Into<String>,
    ) -> Result<Self, jsonwebtoken::errors::Error> {
        Ok(Self {
            key: DecodingKey::from_ed_pem(public_key_pem.as_bytes())?,
            issuer: issuer.into(),
        })
    }

    /// Check signature, expiry and issuer, then resolve the caller.
    pub fn verify(&self, token: &str) -> Result<Caller, ApiError> {
        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["sub", "exp", "iat", "iss"]);

        let claims = jsonwebtoken::decode::<CallerClaims>(token, &self.key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    ApiError::Unauthorized("token has expired".into())
                }
                _ => ApiError::Unauthorized(format!("invalid token: {e}")),
            })?;

        let actor_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ApiError::Unauthorized("token subject is not an actor id".into()))?;

        Ok(Caller {
            actor_id,
            role: claims.role,
        })
    }
}

/// Middleware: reject requests without a valid bearer token and expose
/// the [`Caller`] to handlers as a request extension.
pub async fn require_caller(
    State(verifier): State<Arc<CallerVerifier>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))?;

    let caller = verifier.verify(token)?;
    debug!(actor_id = %caller.actor_id, role = %caller.role, "Caller authenticated");
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}
