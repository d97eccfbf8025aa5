pub mod coordinator;
pub mod embed;
pub mod error;
pub mod identity;
pub mod listener;
pub mod routes;
pub mod state;

pub use coordinator::{Coordinator, Timings};

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Build the axum Router with every route and middleware.
/// Used by the coordinator and available for integration testing.
pub fn build_router(state: state::AppState) -> Router {
    Router::new()
        .route("/", get(routes::front::front_page))
        .route("/activate", post(routes::activate::activate))
        .route("/static/{*path}", get(embed::static_handler))
        .fallback(routes::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
