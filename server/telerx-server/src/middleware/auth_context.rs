//! Authentication context extraction for provider and admin endpoints.
//!
//! Handlers take an [`AuthContext`] argument and get the caller's identity
//! decoded from the `Authorization: Bearer` JWT automatically. Patient
//! payment pages and the machine-to-machine webhooks do not use this; they
//! authenticate by link token, shared secret or signature instead.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderMap};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::server::TelerxServer;

/// Role claim that unlocks the pharmacy backend admin endpoints.
pub const ROLE_ADMIN: &str = "admin";
/// Role claim carried by prescribing providers.
pub const ROLE_PROVIDER: &str = "provider";

/// Authenticated caller identity extracted from a JWT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub roles: Vec<String>,
    pub email: Option<String>,
}

impl AuthContext {
    /// Create a new AuthContext (for testing/mocking)
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            roles: Vec::new(),
            email: None,
        }
    }

    /// Create with roles
    pub fn with_roles(user_id: Uuid, roles: Vec<String>) -> Self {
        Self {
            user_id,
            roles,
            email: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|role| role == ROLE_ADMIN)
    }

    /// Reject callers without the admin role.
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::authorization("Admin role required"))
        }
    }
}

/// JWT Claims structure (internal)
#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
    sub: Uuid,
    roles: Option<Vec<String>>,
    email: Option<String>,
    exp: i64,
}

/// Extract the bearer token from the Authorization header.
fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::authentication("Missing Authorization header"))?;

    auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        ApiError::authentication("Invalid Authorization header format. Expected: Bearer <token>")
    })
}

/// Validate the token signature and expiry and return its claims.
fn decode_claims(token: &str, secret: &str) -> Result<JwtClaims, ApiError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let token_data = decode::<JwtClaims>(token, &decoding_key, &Validation::default())
        .map_err(|e| ApiError::authentication(format!("Invalid token: {e}")))?;
    Ok(token_data.claims)
}

#[async_trait]
impl FromRequestParts<TelerxServer> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &TelerxServer,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let claims = decode_claims(token, &state.config.jwt_secret)?;

        Ok(AuthContext {
            user_id: claims.sub,
            roles: claims.roles.unwrap_or_default(),
            email: claims.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-jwt-secret";

    fn mint(claims: &JwtClaims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_decodes_claims() {
        let user_id = Uuid::new_v4();
        let token = mint(
            &JwtClaims {
                sub: user_id,
                roles: Some(vec![ROLE_PROVIDER.to_string()]),
                email: Some("dr@clinic.test".to_string()),
                exp: chrono::Utc::now().timestamp() + 3600,
            },
            SECRET,
        );

        let claims = decode_claims(&token, SECRET).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.roles, Some(vec![ROLE_PROVIDER.to_string()]));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = mint(
            &JwtClaims {
                sub: Uuid::new_v4(),
                roles: None,
                email: None,
                exp: chrono::Utc::now().timestamp() - 3600,
            },
            SECRET,
        );

        assert!(decode_claims(&token, SECRET).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = mint(
            &JwtClaims {
                sub: Uuid::new_v4(),
                roles: None,
                email: None,
                exp: chrono::Utc::now().timestamp() + 3600,
            },
            "other-secret",
        );

        assert!(decode_claims(&token, SECRET).is_err());
    }

    #[test]
    fn bearer_token_requires_scheme() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc123");
    }

    #[test]
    fn admin_role_check() {
        let admin = AuthContext::with_roles(Uuid::new_v4(), vec![ROLE_ADMIN.to_string()]);
        assert!(admin.is_admin());
        assert!(admin.require_admin().is_ok());

        let provider = AuthContext::with_roles(Uuid::new_v4(), vec![ROLE_PROVIDER.to_string()]);
        assert!(!provider.is_admin());
        assert!(provider.require_admin().is_err());
    }
}
