use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, RegisterRequest, UpdateProfileRequest, UserEnvelope},
        extractors::AuthUser,
        repo_types::{NewUser, User, UserChanges},
        services::{
            hash_password, validate_login, validate_profile_update, validate_register, verify_decoy,
            verify_password,
        },
    },
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Requires the auth gate to be layered on by the caller.
pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me).put(update_me))
}

pub(crate) fn payload<T>(body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    body.map(|Json(v)| v).map_err(|e| {
        warn!(error = %e, "rejected request payload");
        ApiError::validation("invalid request payload")
    })
}

#[instrument(skip(state, body))]
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let mut req = payload(body)?;
    validate_register(&mut req)?;

    let credential = hash_password(std::mem::take(&mut req.password))
        .await
        .map_err(|e| {
            error!(error = %e, "hash_password failed");
            ApiError::Internal(e)
        })?;

    let bio = req.bio.as_deref().map(str::trim).filter(|b| !b.is_empty());
    let user = User::create(
        &state.db,
        &NewUser {
            username: &req.username,
            email: &req.email,
            credential: &credential,
            bio,
        },
    )
    .await
    .map_err(|e| {
        warn!(error = %e, username = %req.username, "create user failed");
        ApiError::from(e)
    })?;

    let token = state.jwt.issue(user.id, &user.email).map_err(|e| {
        error!(error = %e, "jwt sign failed");
        ApiError::Internal(e.into())
    })?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: user.into(),
            token,
        }),
    ))
}

#[instrument(skip(state, body))]
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<AuthResponse>> {
    let mut req = payload(body)?;
    validate_login(&mut req)?;

    let user = match User::find_by_username(&state.db, &req.username).await? {
        Some(u) => u,
        None => {
            warn!(username = %req.username, "login unknown username");
            verify_decoy(std::mem::take(&mut req.password))
                .await
                .map_err(ApiError::Internal)?;
            return Err(ApiError::Unauthenticated("invalid credentials"));
        }
    };

    let ok = verify_password(user.credential(), std::mem::take(&mut req.password))
        .await
        .map_err(|e| {
            error!(error = %e, user_id = user.id, "verify_password failed");
            ApiError::Internal(e)
        })?;

    if !ok {
        warn!(user_id = user.id, "login invalid password");
        return Err(ApiError::Unauthenticated("invalid credentials"));
    }

    let token = state.jwt.issue(user.id, &user.email).map_err(|e| {
        error!(error = %e, "jwt sign failed");
        ApiError::Internal(e.into())
    })?;

    info!(user_id = user.id, "user logged in");
    Ok(Json(AuthResponse {
        user: user.into(),
        token,
    }))
}

/// Re-reads the user: a valid token does not prove the account still exists.
#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<UserEnvelope>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| {
            warn!(user_id = auth.user_id, "token subject no longer exists");
            ApiError::Unauthenticated("user not found")
        })?;
    Ok(Json(UserEnvelope { user: user.into() }))
}

#[instrument(skip(state, body))]
pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> ApiResult<Json<UserEnvelope>> {
    let mut req = payload(body)?;
    validate_profile_update(&mut req)?;

    let current = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or(ApiError::Unauthenticated("user not found"))?;

    let credential = match req.password.take() {
        Some(plain) => Some(hash_password(plain).await.map_err(ApiError::Internal)?),
        None => None,
    };

    let bio = match req.bio.as_deref() {
        Some(b) if b.trim().is_empty() => None,
        Some(b) => Some(b.trim()),
        None => current.bio.as_deref(),
    };
    let changes = UserChanges {
        username: req.username.as_deref().unwrap_or(&current.username),
        email: req.email.as_deref().unwrap_or(&current.email),
        bio,
        credential: credential.as_ref(),
    };

    let user = User::update(&state.db, auth.user_id, &changes).await?;
    info!(
        user_id = user.id,
        password_changed = changes.credential.is_some(),
        "profile updated"
    );
    Ok(Json(UserEnvelope { user: user.into() }))
}
