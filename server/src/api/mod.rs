//! API Router and Application State
//!
//! Central routing configuration and shared state.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use sqlx::PgPool;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    commands::{CommandTree, Dispatcher},
    config::Config,
    interactions,
    permissions::{GrantStore, PermissionResolver, RoleRankCache},
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,
    /// Server configuration
    pub config: Arc<Config>,
    /// Grant store read by the permission resolver
    pub grants: Arc<dyn GrantStore>,
    /// Role positions pushed by the gateway
    pub roles: Arc<RoleRankCache>,
    /// Immutable command tree and its dispatcher
    pub dispatcher: Dispatcher<AppState>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        db: PgPool,
        config: Config,
        grants: Arc<dyn GrantStore>,
        tree: CommandTree<Self>,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            grants,
            roles: Arc::new(RoleRankCache::new()),
            dispatcher: Dispatcher::new(tree),
        }
    }

    /// Permission resolver over this state's grant store and role cache.
    #[must_use]
    pub fn resolver(&self) -> PermissionResolver<'_> {
        PermissionResolver::new(self.grants.as_ref(), self.roles.as_ref())
    }
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Interactions, command projection and role feed
        .merge(interactions::router(state.clone()))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // State
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    /// Service status
    status: &'static str,
    /// Registered top-level commands
    commands: usize,
    /// Guilds with cached role positions
    role_guilds: usize,
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        commands: state.dispatcher.tree().len(),
        role_guilds: state.roles.guild_count(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use super::AppState;
    use crate::config::Config;
    use crate::permissions::GrantStore;

    /// State over a pool that never connects. Anything that reaches the
    /// database fails after the acquire timeout.
    pub(crate) fn test_state(grants: Arc<dyn GrantStore>) -> AppState {
        let config = Config::default_for_test();
        let db = crate::db::pool_options(1)
            .acquire_timeout(std::time::Duration::from_millis(50))
            .connect_lazy(&config.database_url)
            .expect("valid database url");
        let tree = crate::economy::build_tree().expect("command tree");
        AppState::new(db, config, grants, tree)
    }
}
