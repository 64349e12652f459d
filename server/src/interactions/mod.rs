//! Interactions Module
//!
//! HTTP adapter between the chat platform and the dispatcher. The gateway
//! forwards interaction payloads here, reads the command projection for
//! registration, and pushes role positions for the role-rank cache.

pub mod error;
pub mod handlers;
pub mod types;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::Router;

use crate::api::AppState;

pub use error::InteractionError;

/// Create the interactions router.
pub fn router(state: AppState) -> Router<AppState> {
    let gateway_routes = Router::new()
        .route("/interactions", post(handlers::receive))
        .route(
            "/api/guilds/{guild_id}/roles",
            put(handlers::update_role_positions),
        )
        .route_layer(from_fn_with_state(state, handlers::require_gateway_token));

    Router::new()
        .merge(gateway_routes)
        .route("/api/commands", get(handlers::list_commands))
}
