//! Bearer-token authentication for the HTTP and WebSocket surfaces.
//!
//! Tokens are HS256 JWTs issued by the account service. The numeric user id
//! travels in the `uid` claim.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use postpilot_core::{PostpilotError, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::app::AppState;
use crate::http::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account e-mail or username.
    pub sub: String,
    pub uid: UserId,
    pub exp: usize,
}

pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, PostpilotError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| PostpilotError::AuthFailed(e.to_string()))
    }
}

/// Authenticated caller, extracted from `Authorization: Bearer <jwt>`.
pub struct AuthUser(pub UserId);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| {
                PostpilotError::AuthFailed(
                    "Set 'Authorization: Bearer <your-token>' header.".to_string(),
                )
            })?;
        let claims = state.tokens.verify(token)?;
        Ok(AuthUser(claims.uid))
    }
}

#[cfg(test)]
pub(crate) fn issue_token(secret: &str, uid: UserId) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = Claims {
        sub: format!("user{uid}@example.com"),
        uid,
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_token_yields_user_id() {
        let verifier = TokenVerifier::new("s3cret");
        let claims = verifier.verify(&issue_token("s3cret", 77)).unwrap();
        assert_eq!(claims.uid, 77);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let verifier = TokenVerifier::new("s3cret");
        let err = verifier.verify(&issue_token("other", 77)).unwrap_err();
        assert_eq!(err.code(), "AUTH_FAILED");
        assert!(verifier.verify("not-a-jwt").is_err());
    }
}
