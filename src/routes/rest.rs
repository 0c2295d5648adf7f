//! REST routes: every configured resource hangs off the same three paths;
//! the handlers resolve the route by path segment and dispatch per method.

use crate::handlers::rest::{collection, item, model_structure};
use crate::state::AppState;
use axum::{
    routing::{any, get},
    Router,
};

pub fn rest_routes(state: AppState) -> Router {
    Router::new()
        .route("/:path_segment", any(collection))
        .route("/:path_segment/structure", get(model_structure))
        .route("/:path_segment/:id", any(item))
        .with_state(state)
}
