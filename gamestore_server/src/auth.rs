//! Access token verification.
//!
//! Tokens are HS256 JWTs issued by the account service. The storefront only verifies them. The `sub` claim is the
//! buyer id, and `roles` lists what the bearer may do.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, http::header::HeaderMap, FromRequest, HttpMessage, HttpRequest};
use gamestore_engine::db_types::Role;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The buyer id
    pub sub: i64,
    #[serde(default)]
    pub roles: Vec<Role>,
    pub exp: i64,
}

impl JwtClaims {
    pub fn buyer_id(&self) -> i64 {
        self.sub
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

/// Claims are placed in the request extensions by [`crate::middleware::JwtAuthMiddlewareFactory`]. Handlers that
/// take `JwtClaims` as an argument are only reachable with a valid token.
impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned();
        ready(claims.ok_or(ServerError::AuthenticationError(AuthError::MissingToken)))
    }
}

pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let key = DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self { key, validation }
    }

    pub fn verify(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                AuthError::PoorlyFormattedToken(e.to_string())
            },
            _ => AuthError::ValidationError(e.to_string()),
        })?;
        trace!("🔑️ Access token verified for buyer #{}", data.claims.sub);
        Ok(data.claims)
    }

    /// Verifies the bearer token in the `Authorization` header.
    pub fn verify_headers(&self, headers: &HeaderMap) -> Result<JwtClaims, AuthError> {
        let token = bearer_token(headers)?;
        self.verify(token)
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers.get("Authorization").ok_or(AuthError::MissingToken)?;
    let value = value.to_str().map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::PoorlyFormattedToken("Expected 'Bearer <token>'".to_string()))
}
