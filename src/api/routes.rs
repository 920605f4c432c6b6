use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::registry::LinkRegistry;

use super::handlers::{create_link, get_link_data, health_check, track_visit, AppState};

pub fn create_router(registry: Arc<LinkRegistry>, public_base_url: Option<String>) -> Router {
    let state = Arc::new(AppState {
        registry,
        public_base_url,
    });

    Router::new()
        .route("/health", get(health_check))
        .route("/create", post(create_link))
        .route("/track/{id}", get(track_visit))
        .route("/data/{id}", get(get_link_data))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
