pub mod features;
pub mod services;
pub mod utilities;

use axum::{Router, http::HeaderValue};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    trace::TraceLayer,
};

use crate::utilities::app_state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = match state.config.frontend_endpoint.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true),
        Err(_) => CorsLayer::new(),
    };

    Router::new()
        .merge(features::explore::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
