use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;

/// Public routes: register and login.
pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
