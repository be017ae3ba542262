use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::handlers;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/hotels", get(handlers::hotels::list_hotels))
        .route("/api/hotels/:hotel_id/beds", get(handlers::hotels::list_beds))
        .route("/api/customers", post(handlers::stays::check_in))
        .route("/api/customers/checkout", post(handlers::stays::check_out))
        .route("/api/ledger/audit", get(handlers::ledger::audit))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    // A timed-out request drops its handler future, which cancels any
    // in-flight ledger transaction before it commits.
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/auth/login", post(handlers::auth::login))
        .merge(protected)
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
