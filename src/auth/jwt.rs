use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use time::Duration;
use tracing::debug;

use super::claims::{ClaimsError, TokenClaims, WireClaims};
use crate::config::JwtConfig;

/// The single signing algorithm accepted.
const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("jwt sign failed: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),

    /// Signature, algorithm, time window, issuer or audience check failed.
    #[error("jwt rejected: {0}")]
    Rejected(#[source] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Claims(#[from] ClaimsError),
}

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl JwtKeys {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            ttl: Duration::minutes(config.ttl_minutes),
        }
    }

    /// Signs `claims` as an HS256 JWT.
    pub fn generate_token(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        if claims.expires_at <= claims.issued_at {
            return Err(ClaimsError::Window.into());
        }
        let token = encode(
            &Header::new(ALGORITHM),
            &WireClaims::from(claims),
            &self.encoding,
        )
        .map_err(TokenError::Sign)?;
        debug!(user_id = claims.user_id, "jwt signed");
        Ok(token)
    }

    /// Issues an access token for `user_id` with this authenticator's issuer, audience and TTL.
    pub fn issue(&self, user_id: i64, email: &str) -> Result<String, TokenError> {
        let claims = TokenClaims::new(user_id, email, &self.issuer, &self.audience, self.ttl);
        self.generate_token(&claims)
    }

    /// Verifies signature and registered claims, then narrows the payload.
    ///
    /// Only HS256 is allow-listed, so `none`, other HMAC sizes and any
    /// asymmetric algorithm are rejected before the key is used. `exp`, `nbf`,
    /// `iss` and `aud` must all be present and there is no clock leeway.
    pub fn validate_token(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let data = decode::<WireClaims>(token, &self.decoding, &self.validation())
            .map_err(TokenError::Rejected)?;
        let claims = TokenClaims::try_from(data.claims)?;
        debug!(user_id = claims.user_id, "jwt verified");
        Ok(claims)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        // exp must lie strictly after now
        validation.reject_tokens_expiring_in_less_than = 1;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "aud"]);
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation
    }
}
