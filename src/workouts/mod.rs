pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
mod services;

use crate::state::AppState;
use axum::Router;

/// Workout CRUD; every route expects an authenticated caller.
pub fn router() -> Router<AppState> {
    handlers::workout_routes()
}
