use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;

use super::dto::{LoginRequest, RegisterRequest, UpdateProfileRequest};
use super::password::Credential;
use crate::error::ApiError;

pub const MAX_USERNAME_LEN: usize = 50;
pub const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.is_empty() {
        return Err(ApiError::validation("username is required"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ApiError::validation(format!(
            "username cannot be greater than {MAX_USERNAME_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.is_empty() {
        return Err(ApiError::validation("email is required"));
    }
    if !is_valid_email(email) {
        return Err(ApiError::validation("invalid email format"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.is_empty() {
        return Err(ApiError::validation("password is required"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Trims and lowercases in place, then checks every field.
pub fn validate_register(req: &mut RegisterRequest) -> Result<(), ApiError> {
    req.username = req.username.trim().to_string();
    req.email = normalize_email(&req.email);
    validate_username(&req.username)?;
    validate_email(&req.email)?;
    validate_password(&req.password)
}

pub fn validate_login(req: &mut LoginRequest) -> Result<(), ApiError> {
    req.username = req.username.trim().to_string();
    if req.username.is_empty() {
        return Err(ApiError::validation("username is required"));
    }
    if req.password.is_empty() {
        return Err(ApiError::validation("password is required"));
    }
    Ok(())
}

pub fn validate_profile_update(req: &mut UpdateProfileRequest) -> Result<(), ApiError> {
    if let Some(username) = req.username.as_mut() {
        *username = username.trim().to_string();
        validate_username(username)?;
    }
    if let Some(email) = req.email.as_mut() {
        *email = normalize_email(email);
        validate_email(email)?;
    }
    if let Some(password) = req.password.as_deref() {
        validate_password(password)?;
    }
    Ok(())
}

/// Hashes on the blocking pool.
pub async fn hash_password(plain: String) -> anyhow::Result<Credential> {
    let credential = tokio::task::spawn_blocking(move || Credential::set(&plain))
        .await
        .context("hash task panicked")??;
    Ok(credential)
}

lazy_static! {
    /// Hash checked when the username is unknown, so both login failures cost one Argon2 verify.
    static ref DECOY_CREDENTIAL: Option<Credential> =
        Credential::set("decoy-password-that-never-matches").ok();
}

/// Runs a full verify against the decoy hash and always reports a mismatch.
pub async fn verify_decoy(plain: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || match DECOY_CREDENTIAL.as_ref() {
        Some(decoy) => decoy.matches(&plain).map(|_| false),
        None => Ok(false),
    })
    .await
    .context("decoy verify task panicked")??;
    Ok(false)
}

/// `Ok(false)` is a wrong password; `Err` is an internal failure.
pub async fn verify_password(credential: Credential, plain: String) -> anyhow::Result<bool> {
    let ok = tokio::task::spawn_blocking(move || credential.matches(&plain))
        .await
        .context("verify task panicked")??;
    Ok(ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            bio: None,
        }
    }

    #[test]
    fn email_regex() {
        assert!(is_valid_email("runner@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.io"));
        assert!(!is_valid_email("no-at-sign.example.com"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@example.com"));
    }

    #[test]
    fn register_normalizes_email() {
        let mut req = register(" alice ", "  Alice@Example.COM ", "password123");
        validate_register(&mut req).expect("valid");
        assert_eq!(req.username, "alice");
        assert_eq!(req.email, "alice@example.com");
    }

    #[test]
    fn register_rejects_each_bad_field() {
        let cases = [
            (register("", "a@b.io", "password123"), "username is required"),
            (register(&"x".repeat(51), "a@b.io", "password123"), "username cannot be greater than 50 characters"),
            (register("al", "", "password123"), "email is required"),
            (register("al", "not-an-email", "password123"), "invalid email format"),
            (register("al", "a@b.io", ""), "password is required"),
            (register("al", "a@b.io", "short"), "password must be at least 8 characters"),
        ];
        for (mut req, expected) in cases {
            let err = validate_register(&mut req).unwrap_err();
            assert_eq!(err.user_message(), expected);
        }
    }

    #[test]
    fn profile_update_only_checks_present_fields() {
        let mut req = UpdateProfileRequest {
            bio: Some("hi".into()),
            ..Default::default()
        };
        assert!(validate_profile_update(&mut req).is_ok());

        let mut req = UpdateProfileRequest {
            password: Some("short".into()),
            ..Default::default()
        };
        assert!(validate_profile_update(&mut req).is_err());
    }

    #[tokio::test]
    async fn blocking_hash_and_verify() {
        let credential = hash_password("blocking-pool-pw".into()).await.unwrap();
        assert!(verify_password(credential.clone(), "blocking-pool-pw".into()).await.unwrap());
        assert!(!verify_password(credential, "wrong-password".into()).await.unwrap());
    }

    #[tokio::test]
    async fn decoy_never_matches() {
        assert!(DECOY_CREDENTIAL.is_some());
        assert!(!verify_decoy("decoy-password-that-never-matches".into()).await.unwrap());
        assert!(!verify_decoy("anything".into()).await.unwrap());
    }
}
