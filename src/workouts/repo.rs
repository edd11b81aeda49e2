//! Owner-scoped persistence of the workout aggregate.
//!
//! Every query is filtered on both the workout id and the owning user id, so
//! a workout that belongs to someone else looks exactly like a missing one.
//! Create and update run in a single transaction; an early return drops the
//! transaction, which rolls it back.

use sqlx::{PgPool, Postgres, Transaction};

use super::repo_types::{EntryDraft, Workout, WorkoutDraft, WorkoutEntry, WorkoutRow};
use crate::db::RepoError;

const ENTRY_COLUMNS: &str = "id, exercise_name, sets, reps, duration_seconds, weight, notes, \
                             order_index, created_at, updated_at";

/// Inserts entries in submitted order; `order_index` is the position in `entries`.
async fn insert_entries_tx(
    tx: &mut Transaction<'_, Postgres>,
    workout_id: i64,
    entries: &[EntryDraft],
) -> Result<Vec<WorkoutEntry>, RepoError> {
    let sql = format!(
        r#"
        INSERT INTO workout_entries
            (workout_id, exercise_name, sets, reps, duration_seconds, weight, notes, order_index)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {ENTRY_COLUMNS}
        "#
    );

    let mut inserted = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let order_index = i32::try_from(index)
            .map_err(|_| sqlx::Error::Protocol("too many workout entries".into()))?;
        let row = sqlx::query_as::<_, WorkoutEntry>(&sql)
            .bind(workout_id)
            .bind(&entry.exercise_name)
            .bind(entry.sets)
            .bind(entry.reps)
            .bind(entry.duration_seconds)
            .bind(entry.weight)
            .bind(entry.notes.as_deref())
            .bind(order_index)
            .fetch_one(&mut **tx)
            .await?;
        inserted.push(row);
    }
    Ok(inserted)
}

/// Creates the header and all entries atomically.
pub async fn create(db: &PgPool, user_id: i64, draft: &WorkoutDraft) -> Result<Workout, RepoError> {
    let mut tx = db.begin().await?;

    let header = sqlx::query_as::<_, WorkoutRow>(
        r#"
        INSERT INTO workouts (user_id, title, description, duration_minutes, calories_burned)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, user_id, title, description, duration_minutes, calories_burned,
                  created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(&draft.title)
    .bind(&draft.description)
    .bind(draft.duration_minutes)
    .bind(draft.calories_burned)
    .fetch_one(&mut *tx)
    .await?;

    let entries = insert_entries_tx(&mut tx, header.id, &draft.entries).await?;
    tx.commit().await?;

    Ok(header.with_entries(entries))
}

/// Header and entries read from one snapshot.
pub async fn get_by_id_and_user(db: &PgPool, id: i64, user_id: i64) -> Result<Workout, RepoError> {
    let mut tx = db.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *tx)
        .await?;

    let header = sqlx::query_as::<_, WorkoutRow>(
        r#"
        SELECT id, user_id, title, description, duration_minutes, calories_burned,
               created_at, updated_at
        FROM workouts
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(RepoError::NotFound)?;

    let entries = sqlx::query_as::<_, WorkoutEntry>(&format!(
        r#"
        SELECT {ENTRY_COLUMNS}
        FROM workout_entries
        WHERE workout_id = $1
        ORDER BY order_index
        "#
    ))
    .bind(header.id)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(header.with_entries(entries))
}

/// Rewrites the header and replaces the whole entry list.
///
/// The header `UPDATE` locks the row until commit, so concurrent updates of
/// one workout apply one after another and the last commit wins.
pub async fn update(
    db: &PgPool,
    id: i64,
    user_id: i64,
    draft: &WorkoutDraft,
) -> Result<Workout, RepoError> {
    let mut tx = db.begin().await?;

    let header = sqlx::query_as::<_, WorkoutRow>(
        r#"
        UPDATE workouts
        SET title = $1,
            description = $2,
            duration_minutes = $3,
            calories_burned = $4,
            updated_at = NOW()
        WHERE id = $5 AND user_id = $6
        RETURNING id, user_id, title, description, duration_minutes, calories_burned,
                  created_at, updated_at
        "#,
    )
    .bind(&draft.title)
    .bind(&draft.description)
    .bind(draft.duration_minutes)
    .bind(draft.calories_burned)
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(RepoError::NotFound)?;

    sqlx::query("DELETE FROM workout_entries WHERE workout_id = $1")
        .bind(header.id)
        .execute(&mut *tx)
        .await?;

    let entries = insert_entries_tx(&mut tx, header.id, &draft.entries).await?;
    tx.commit().await?;

    Ok(header.with_entries(entries))
}

/// Entries go with it through `ON DELETE CASCADE`.
pub async fn delete_by_id_and_user(db: &PgPool, id: i64, user_id: i64) -> Result<(), RepoError> {
    let result = sqlx::query("DELETE FROM workouts WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound);
    }
    Ok(())
}
