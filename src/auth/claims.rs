use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

/// Largest integer an IEEE-754 double represents exactly (2^53 - 1).
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_991.0;

/// Verified claim set carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub user_id: i64,
    pub email: String,
    pub issuer: String,
    pub audience: Vec<String>,
    pub issued_at: OffsetDateTime,
    pub not_before: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl TokenClaims {
    /// Claims valid from `now` until `now + ttl`.
    pub fn new(
        user_id: i64,
        email: impl Into<String>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        // JWT timestamps have second precision
        let now = OffsetDateTime::now_utc();
        let now = now.replace_nanosecond(0).unwrap_or(now);
        Self {
            user_id,
            email: email.into(),
            issuer: issuer.into(),
            audience: vec![audience.into()],
            issued_at: now,
            not_before: now,
            expires_at: now + ttl,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubjectError {
    #[error("subject claim is missing")]
    Missing,
    #[error("subject claim has the wrong type")]
    Mistyped,
    #[error("subject claim is not an integer")]
    NonIntegral,
    #[error("subject claim is out of range")]
    OutOfRange,
    #[error("sub and uid claims disagree")]
    Mismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimsError {
    #[error("invalid user ID in token: {0}")]
    Subject(#[from] SubjectError),
    #[error("invalid email in token")]
    Email,
    #[error("expiry does not follow issued-at")]
    Window,
    #[error("timestamp claim out of range")]
    Timestamp,
}

/// `aud` may be a single string or an array on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn into_vec(self) -> Vec<String> {
        match self {
            Audience::One(a) => vec![a],
            Audience::Many(list) => list,
        }
    }
}

/// JSON shape of the token payload. Subject and email are kept loosely typed
/// here and narrowed exactly once, when converted into [`TokenClaims`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<Value>,
    pub iss: String,
    pub aud: Audience,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

impl From<&TokenClaims> for WireClaims {
    fn from(c: &TokenClaims) -> Self {
        let aud = match c.audience.as_slice() {
            [single] => Audience::One(single.clone()),
            many => Audience::Many(many.to_vec()),
        };
        Self {
            sub: Some(Value::String(c.user_id.to_string())),
            uid: Some(Value::from(c.user_id)),
            email: Some(Value::String(c.email.clone())),
            iss: c.issuer.clone(),
            aud,
            iat: c.issued_at.unix_timestamp(),
            nbf: c.not_before.unix_timestamp(),
            exp: c.expires_at.unix_timestamp(),
        }
    }
}

impl TryFrom<WireClaims> for TokenClaims {
    type Error = ClaimsError;

    fn try_from(w: WireClaims) -> Result<Self, Self::Error> {
        let user_id = resolve_subject(w.sub.as_ref(), w.uid.as_ref())?;

        let email = match w.email {
            Some(Value::String(e)) if !e.trim().is_empty() => e,
            _ => return Err(ClaimsError::Email),
        };

        if w.exp <= w.iat {
            return Err(ClaimsError::Window);
        }

        Ok(Self {
            user_id,
            email,
            issuer: w.iss,
            audience: w.aud.into_vec(),
            issued_at: timestamp(w.iat)?,
            not_before: timestamp(w.nbf)?,
            expires_at: timestamp(w.exp)?,
        })
    }
}

fn timestamp(secs: i64) -> Result<OffsetDateTime, ClaimsError> {
    OffsetDateTime::from_unix_timestamp(secs).map_err(|_| ClaimsError::Timestamp)
}

/// `uid` wins when present, but must agree with `sub` if both are set.
fn resolve_subject(sub: Option<&Value>, uid: Option<&Value>) -> Result<i64, SubjectError> {
    match (uid, sub) {
        (Some(uid), Some(sub)) => {
            let id = subject_id(uid)?;
            if subject_id(sub)? != id {
                return Err(SubjectError::Mismatch);
            }
            Ok(id)
        }
        (Some(only), None) | (None, Some(only)) => subject_id(only),
        (None, None) => Err(SubjectError::Missing),
    }
}

/// Narrows a JSON subject to a positive `i64` without ever truncating.
pub fn subject_id(value: &Value) -> Result<i64, SubjectError> {
    let id = match value {
        Value::Number(n) => {
            if let Some(id) = n.as_i64() {
                id
            } else if n.is_u64() {
                return Err(SubjectError::OutOfRange);
            } else {
                let f = n.as_f64().ok_or(SubjectError::Mistyped)?;
                if !f.is_finite() || f.fract() != 0.0 {
                    return Err(SubjectError::NonIntegral);
                }
                if f.abs() > MAX_EXACT_FLOAT_INT {
                    return Err(SubjectError::OutOfRange);
                }
                f as i64
            }
        }
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| SubjectError::Mistyped)?,
        _ => return Err(SubjectError::Mistyped),
    };
    if id <= 0 {
        return Err(SubjectError::OutOfRange);
    }
    Ok(id)
}
