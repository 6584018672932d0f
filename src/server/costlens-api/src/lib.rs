//! # Costlens API
//!
//! REST layer between the cost dashboard and Azure.
//!
//! ## Endpoints
//!
//! Every route requires an Entra ID bearer token.
//!
//! - `GET /api/subscriptions` - Subscriptions visible to the server identity
//! - `GET /api/resource-groups` - Resource groups of a subscription
//! - `GET /api/costs` - Cost per resource group
//! - `GET /api/resources` - Cost per resource within a resource group

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::http::header::InvalidHeaderValue;
use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use state::AppState;

/// Builds the API router. All routes sit behind [`middleware::require_auth`].
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/subscriptions", get(handlers::subscriptions))
        .route("/api/resource-groups", get(handlers::resource_groups))
        .route("/api/costs", get(handlers::costs))
        .route("/api/resources", get(handlers::resources))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the single dashboard origin; any method and header.
pub fn cors_layer(origin: &str) -> Result<CorsLayer, InvalidHeaderValue> {
    let origin = HeaderValue::from_str(origin.trim_end_matches('/'))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any))
}
