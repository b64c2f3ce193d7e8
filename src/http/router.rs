use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::types::AppState;
use crate::http::{cors, error};

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(handlers::tasks::router())
        .merge(handlers::teachers::router())
        .merge(handlers::interviews::router())
        .merge(handlers::goals::router())
        .merge(handlers::knowledge::router())
        .merge(handlers::activity::router());

    Router::new()
        .route("/health", get(handlers::core::health))
        .nest("/api", api)
        .fallback(cors::not_found)
        .layer(middleware::from_fn(error::log_failures))
        .layer(cors::allow_any_origin())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
