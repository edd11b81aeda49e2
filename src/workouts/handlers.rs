use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderName, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::{CreateWorkoutRequest, UpdateWorkoutRequest, WorkoutEnvelope},
    repo,
    repo_types::WorkoutDraft,
    services::{draft_from_create, merge_update},
};
use crate::{
    auth::{extractors::AuthUser, handlers::payload},
    db::RepoError,
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Requires the auth gate to be layered on by the caller.
pub fn workout_routes() -> Router<AppState> {
    Router::new()
        .route("/workouts", post(create_workout))
        .route(
            "/workouts/:id",
            get(get_workout).put(update_workout).delete(delete_workout),
        )
}

pub(crate) fn parse_id(raw: &str) -> ApiResult<i64> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::validation("invalid workout id")),
    }
}

/// Absent and foreign-owned workouts both surface as the same 404.
fn workout_error(e: RepoError) -> ApiError {
    match e {
        RepoError::NotFound => ApiError::NotFound("workout not found"),
        other => other.into(),
    }
}

#[instrument(skip(state, body))]
pub async fn create_workout(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Result<Json<CreateWorkoutRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, [(HeaderName, String); 1], Json<WorkoutEnvelope>)> {
    let draft = draft_from_create(payload(body)?)?;

    let workout = repo::create(&state.db, auth.user_id, &draft)
        .await
        .map_err(workout_error)?;

    info!(
        user_id = auth.user_id,
        workout_id = workout.id,
        entries = workout.entries.len(),
        "workout created"
    );
    let location = format!("/workouts/{}", workout.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(WorkoutEnvelope { workout }),
    ))
}

#[instrument(skip(state))]
pub async fn get_workout(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<WorkoutEnvelope>> {
    let id = parse_id(&raw_id)?;
    let workout = repo::get_by_id_and_user(&state.db, id, auth.user_id)
        .await
        .map_err(workout_error)?;
    Ok(Json(WorkoutEnvelope { workout }))
}

#[instrument(skip(state, body))]
pub async fn update_workout(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(raw_id): Path<String>,
    body: Result<Json<UpdateWorkoutRequest>, JsonRejection>,
) -> ApiResult<Json<WorkoutEnvelope>> {
    let id = parse_id(&raw_id)?;
    let req = payload(body)?;

    let current = repo::get_by_id_and_user(&state.db, id, auth.user_id)
        .await
        .map_err(workout_error)?;
    let draft = merge_update(WorkoutDraft::from(current), req)?;

    let workout = repo::update(&state.db, id, auth.user_id, &draft)
        .await
        .map_err(|e| {
            warn!(error = %e, workout_id = id, "update workout failed");
            workout_error(e)
        })?;

    info!(
        user_id = auth.user_id,
        workout_id = id,
        entries = workout.entries.len(),
        "workout updated"
    );
    Ok(Json(WorkoutEnvelope { workout }))
}

#[instrument(skip(state))]
pub async fn delete_workout(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(raw_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&raw_id)?;
    repo::delete_by_id_and_user(&state.db, id, auth.user_id)
        .await
        .map_err(workout_error)?;
    info!(user_id = auth.user_id, workout_id = id, "workout deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_accepts_positive_integers_only() {
        assert_eq!(parse_id("42").unwrap(), 42);
        for raw in ["0", "-3", "abc", "1.5", "", "99999999999999999999"] {
            assert!(parse_id(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn not_found_gets_workout_message() {
        let err = workout_error(RepoError::NotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.user_message(), "workout not found");
    }
}
