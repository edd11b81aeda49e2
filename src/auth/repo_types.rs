use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

use super::password::Credential;

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, never exposed in JSON
    pub bio: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn credential(&self) -> Credential {
        Credential::from_stored(self.password_hash.clone())
    }
}

/// Fields accepted when creating a user.
#[derive(Debug)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub credential: &'a Credential,
    pub bio: Option<&'a str>,
}

/// Profile changes; `credential` is set only when the password is being re-hashed.
#[derive(Debug)]
pub struct UserChanges<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub bio: Option<&'a str>,
    pub credential: Option<&'a Credential>,
}
