use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, patch, post},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/login", post(handlers::login))
        .route("/api/athletes", get(handlers::list_athletes))
        .route("/api/athletes/:athlete_id", get(handlers::get_dashboard))
        .route("/api/athletes/:athlete_id/public", patch(handlers::set_public))
        .route("/api/athletes/:athlete_id/export.csv", get(handlers::export_csv))
        .route(
            "/api/athletes/:athlete_id/weeks/:week_id",
            patch(handlers::update_week).delete(handlers::delete_week),
        )
        .route(
            "/api/athletes/:athlete_id/weeks/:week_id/validation",
            get(handlers::validate_week),
        )
        .route(
            "/api/athletes/:athlete_id/weeks/:week_id/complete",
            post(handlers::complete_week),
        )
        .with_state(state)
}
