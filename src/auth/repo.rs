use sqlx::PgPool;

use crate::auth::repo_types::{NewUser, User, UserChanges};
use crate::db::RepoError;

const USER_COLUMNS: &str = "id, username, email, password_hash, bio, created_at, updated_at";

impl User {
    /// Find a user by username.
    pub async fn find_by_username(db: &PgPool, username: &str) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user with an already hashed password.
    pub async fn create(db: &PgPool, new: &NewUser<'_>) -> Result<User, RepoError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, bio)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(new.username)
        .bind(new.email)
        .bind(new.credential.as_str())
        .bind(new.bio)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Updates the profile; the stored hash is replaced only when `changes.credential` is set.
    pub async fn update(db: &PgPool, id: i64, changes: &UserChanges<'_>) -> Result<User, RepoError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = $1,
                email = $2,
                bio = $3,
                password_hash = COALESCE($4, password_hash),
                updated_at = NOW()
            WHERE id = $5
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(changes.username)
        .bind(changes.email)
        .bind(changes.bio)
        .bind(changes.credential.map(|c| c.as_str()))
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(RepoError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::Credential;

    async fn seed(db: &PgPool, username: &str) -> User {
        let credential = Credential::set("password123").unwrap();
        User::create(
            db,
            &NewUser {
                username,
                email: &format!("{username}@example.com"),
                credential: &credential,
                bio: None,
            },
        )
        .await
        .expect("create user")
    }

    #[sqlx::test]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn create_then_find_by_username(pool: PgPool) {
        let created = seed(&pool, "alice").await;
        let found = User::find_by_username(&pool, "alice")
            .await
            .unwrap()
            .expect("user exists");
        assert_eq!(found.id, created.id);
        assert!(found.credential().matches("password123").unwrap());
        assert!(User::find_by_username(&pool, "nobody").await.unwrap().is_none());
    }

    #[sqlx::test]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn duplicate_username_is_a_conflict(pool: PgPool) {
        seed(&pool, "bob").await;
        let credential = Credential::set("password123").unwrap();
        let err = User::create(
            &pool,
            &NewUser {
                username: "bob",
                email: "other@example.com",
                credential: &credential,
                bio: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RepoError::Conflict("username")));
    }

    #[sqlx::test]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn update_keeps_hash_unless_rehashed(pool: PgPool) {
        let user = seed(&pool, "carol").await;

        let updated = User::update(
            &pool,
            user.id,
            &UserChanges {
                username: "carol",
                email: "carol@example.org",
                bio: Some("lifts"),
                credential: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.password_hash, user.password_hash);
        assert_eq!(updated.bio.as_deref(), Some("lifts"));

        let rehashed = Credential::set("new-password-456").unwrap();
        let updated = User::update(
            &pool,
            user.id,
            &UserChanges {
                username: "carol",
                email: "carol@example.org",
                bio: None,
                credential: Some(&rehashed),
            },
        )
        .await
        .unwrap();
        assert!(updated.credential().matches("new-password-456").unwrap());
        assert!(!updated.credential().matches("password123").unwrap());
    }
}
