pub mod categories;
pub mod fetcher;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod persistence;
pub mod query;
pub mod repository;
pub mod schemas;
pub mod session;
pub mod state;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::utilities::app_state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/explore", get(handlers::explore_handler))
        .route(
            "/api/v1/explore/filters",
            patch(handlers::update_filters_handler),
        )
        .route(
            "/api/v1/explore/filters/reset",
            post(handlers::reset_filters_handler),
        )
        .route("/api/v1/explore/retry", post(handlers::retry_handler))
        .route("/api/v1/categories", get(handlers::categories_handler))
        // Cascading location selects
        .route("/api/v1/locations/states", get(handlers::states_handler))
        .route(
            "/api/v1/locations/states/{state_id}/cities",
            get(handlers::cities_handler),
        )
        .route(
            "/api/v1/locations/cities/{city_id}/condominiums",
            get(handlers::condominiums_handler),
        )
}
