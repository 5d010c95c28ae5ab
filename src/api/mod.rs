//! HTTP control API.
//!
//! Thin axum controllers over [`services::PlaybackService`], mounted under `/v1`.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod handlers;
pub mod services;

use services::PlaybackService;

pub struct ApiState {
    pub services: Arc<dyn PlaybackService>,
}

pub fn router(services: Arc<dyn PlaybackService>) -> Router {
    let state = Arc::new(ApiState { services });

    let v1 = Router::new()
        .route("/queue", get(handlers::get_queue))
        .route("/pause", post(handlers::pause_queue))
        .route("/resume", post(handlers::resume_queue))
        .route("/clear", post(handlers::clear_queue))
        .route("/join", post(handlers::join_channel))
        .route("/skip", post(handlers::skip_song))
        .route("/add", post(handlers::add_song))
        .with_state(state);

    Router::new()
        .nest("/v1", v1)
        .layer(TraceLayer::new_for_http())
}
