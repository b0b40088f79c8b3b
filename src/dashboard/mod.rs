//! Read-only JSON status API over the incident log.

use axum::Router;
use axum::routing::get;
use std::sync::Arc;

pub mod handlers;
pub mod responses;
pub mod status;

pub use handlers::DashboardContext;

pub fn router(context: Arc<DashboardContext>) -> Router {
    Router::new()
        .route("/api/dashboard", get(handlers::get_dashboard))
        .route("/api/health", get(handlers::get_health))
        .with_state(context)
}
