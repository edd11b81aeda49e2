use std::time::Instant;

mod app;
mod auth;
mod config;
mod db;
mod error;
mod rate_limit;
mod state;
mod workouts;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "workout_tracker=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = AppState::init().await?;
    db::migrate(&app_state.db).await?;

    // idle clients would otherwise keep their (empty) windows forever
    let limiter = app_state.limiter.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(limiter.window());
        loop {
            tick.tick().await;
            limiter.prune(Instant::now());
            tracing::debug!(clients = limiter.tracked_clients(), "rate limiter pruned");
        }
    });

    let host = app_state.config.host.clone();
    let port = app_state.config.port;
    app::serve(app::build_app(app_state), &host, port).await
}
