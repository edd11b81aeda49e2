//! Binds a verified bearer-token identity to the request.
//!
//! [`require_auth`] runs [`authenticate`] once per request and stores the
//! resulting [`AuthUser`] in the request extensions. Handlers read it back
//! with the [`AuthUser`] extractor, which rejects with 401 instead of
//! panicking when the middleware was not applied.

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use thiserror::Error;
use tracing::warn;

use super::claims::ClaimsError;
use super::jwt::{JwtKeys, TokenError};
use crate::{error::ApiError, state::AppState};

/// Identity of the caller, derived from a validated token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
}

/// Why the gate turned a request away. The display text is what the client sees.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("missing authorization header")]
    MissingHeader,
    #[error("invalid authorization header format")]
    InvalidFormat,
    #[error("missing token")]
    MissingToken,
    #[error("invalid or expired token")]
    InvalidToken(#[source] TokenError),
    #[error("invalid user ID in token")]
    InvalidSubject,
    #[error("invalid email in token")]
    InvalidEmail,
}

impl GateError {
    fn client_message(&self) -> &'static str {
        match self {
            GateError::MissingHeader => "missing authorization header",
            GateError::InvalidFormat => "invalid authorization header format",
            GateError::MissingToken => "missing token",
            GateError::InvalidToken(_) => "invalid or expired token",
            GateError::InvalidSubject => "invalid user ID in token",
            GateError::InvalidEmail => "invalid email in token",
        }
    }
}

impl From<GateError> for ApiError {
    fn from(e: GateError) -> Self {
        ApiError::Unauthenticated(e.client_message())
    }
}

/// Single pass from raw headers to a bound identity.
pub fn authenticate(headers: &HeaderMap, keys: &JwtKeys) -> Result<AuthUser, GateError> {
    let header = headers.get(AUTHORIZATION).ok_or(GateError::MissingHeader)?;
    let header = header.to_str().map_err(|_| GateError::InvalidFormat)?;

    // exactly "Bearer <token>"
    let mut parts = header.split(' ');
    let (scheme, token) = match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) => (scheme, token),
        _ => return Err(GateError::InvalidFormat),
    };
    if scheme != "Bearer" {
        return Err(GateError::InvalidFormat);
    }
    if token.is_empty() {
        return Err(GateError::MissingToken);
    }

    let claims = keys.validate_token(token).map_err(|e| match e {
        TokenError::Claims(ClaimsError::Subject(_)) => GateError::InvalidSubject,
        TokenError::Claims(ClaimsError::Email) => GateError::InvalidEmail,
        other => GateError::InvalidToken(other),
    })?;

    Ok(AuthUser {
        user_id: claims.user_id,
        email: claims.email,
    })
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match authenticate(request.headers(), &state.jwt) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            Ok(next.run(request).await)
        }
        Err(e) => {
            warn!(error = ?e, "token validation failed");
            Err(e.into())
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(ApiError::Unauthenticated("unauthorized"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::TokenClaims;
    use crate::config::JwtConfig;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use time::OffsetDateTime;

    fn keys() -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: "gate-secret".into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            ttl_minutes: 5,
        })
    }

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn missing_header() {
        let err = authenticate(&HeaderMap::new(), &keys()).unwrap_err();
        assert!(matches!(err, GateError::MissingHeader));
    }

    #[test]
    fn wrong_scheme_or_shape() {
        for value in ["Basic abc", "Bearer", "bearer abc", "Bearer a b", "Token"] {
            let err = authenticate(&headers(value), &keys()).unwrap_err();
            assert!(matches!(err, GateError::InvalidFormat), "{value}");
        }
    }

    #[test]
    fn empty_token() {
        let err = authenticate(&headers("Bearer "), &keys()).unwrap_err();
        assert!(matches!(err, GateError::MissingToken));
    }

    #[test]
    fn garbage_token() {
        let err = authenticate(&headers("Bearer not.a.jwt"), &keys()).unwrap_err();
        assert!(matches!(err, GateError::InvalidToken(_)));
        assert_eq!(ApiError::from(err).user_message(), "invalid or expired token");
    }

    #[test]
    fn valid_token_binds_identity() {
        let keys = keys();
        let token = keys.issue(5, "five@example.com").unwrap();
        let user = authenticate(&headers(&format!("Bearer {token}")), &keys).unwrap();
        assert_eq!(
            user,
            AuthUser {
                user_id: 5,
                email: "five@example.com".into()
            }
        );
    }

    #[test]
    fn expired_token_is_invalid() {
        let keys = keys();
        let mut claims = TokenClaims::new(5, "five@example.com", "iss", "aud", time::Duration::hours(1));
        claims.issued_at -= time::Duration::hours(2);
        claims.not_before = claims.issued_at;
        claims.expires_at = claims.issued_at + time::Duration::minutes(30);
        let token = keys.generate_token(&claims).unwrap();
        let err = authenticate(&headers(&format!("Bearer {token}")), &keys).unwrap_err();
        assert!(matches!(err, GateError::InvalidToken(_)));
    }

    fn signed(payload: serde_json::Value) -> String {
        encode(
            &Header::default(),
            &payload,
            &EncodingKey::from_secret(b"gate-secret"),
        )
        .unwrap()
    }

    #[test]
    fn mistyped_subject_and_email_get_specific_errors() {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let base = json!({
            "iss": "iss", "aud": "aud", "iat": now, "nbf": now, "exp": now + 60,
        });

        let mut bad_sub = base.clone();
        bad_sub["uid"] = json!("not-a-number");
        bad_sub["email"] = json!("x@example.com");
        let err = authenticate(&headers(&format!("Bearer {}", signed(bad_sub))), &keys()).unwrap_err();
        assert!(matches!(err, GateError::InvalidSubject));

        let mut bad_email = base;
        bad_email["uid"] = json!(3);
        bad_email["email"] = json!(false);
        let err = authenticate(&headers(&format!("Bearer {}", signed(bad_email))), &keys()).unwrap_err();
        assert!(matches!(err, GateError::InvalidEmail));
    }
}
