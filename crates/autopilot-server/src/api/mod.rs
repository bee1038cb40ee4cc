pub mod ai;
pub mod workflows;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router with all sub-routes.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/api/ai", ai::router())
        .nest("/api/workflows", workflows::router())
}
