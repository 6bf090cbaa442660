//! Route table.

use axum::Router;
use axum::routing::{delete, get, post};

use crate::state::AppState;
use crate::{events, handlers};

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route(
            "/containers",
            get(handlers::list_containers).post(handlers::create_container),
        )
        .route("/containers/{id}", delete(handlers::delete_container))
        .route("/containers/{id}/start", post(handlers::start_container))
        .route("/containers/{id}/stop", post(handlers::stop_container))
        .route("/containers/{id}/stats", get(handlers::container_stats))
        .route("/containers/{id}/logs", get(handlers::container_logs))
        .route("/images", get(handlers::list_images))
        .route("/images/{id}", delete(handlers::delete_image))
        .route("/logs", get(handlers::audit_log))
        .route("/events", get(events::stream));

    Router::new()
        .nest("/api", api)
        .route("/healthz", get(handlers::healthz))
        .with_state(state)
}
