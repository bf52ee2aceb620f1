// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use blockshop_config::GatewayConfig;
use blockshop_core::BlockshopError;
use blockshop_delivery::DeliveryQueue;
use blockshop_rcon::CommandDispatcher;
use blockshop_store::PurchaseOrchestrator;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub orchestrator: Arc<PurchaseOrchestrator>,
    pub queue: Arc<DeliveryQueue>,
    pub dispatcher: Arc<CommandDispatcher>,
    pub auth: AuthConfig,
    /// Process start time for uptime calculation.
    pub start_time: Instant,
}

impl GatewayState {
    pub fn new(
        orchestrator: Arc<PurchaseOrchestrator>,
        dispatcher: Arc<CommandDispatcher>,
        auth: AuthConfig,
    ) -> Self {
        Self {
            queue: Arc::clone(orchestrator.queue()),
            orchestrator,
            dispatcher,
            auth,
            start_time: Instant::now(),
        }
    }
}

/// Address and credentials the gateway binds with.
#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub bearer_token: Option<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

impl From<&GatewayConfig> for ServerConfig {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            bearer_token: config.bearer_token.clone(),
        }
    }
}

/// All gateway routes.
///
/// Public: health, catalog, purchase creation and purchase listing.
/// Everything under delivery, server, and purchase retry/deliver needs the bearer token.
pub fn router(state: GatewayState) -> Router {
    let auth_state = state.auth.clone();

    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/v1/store/items", get(handlers::list_items))
        .route("/v1/store/items/{id}", get(handlers::get_item))
        .route("/v1/store/purchase", post(handlers::create_purchase))
        .route("/v1/store/purchases", get(handlers::list_purchases))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/delivery/status", get(handlers::delivery_status))
        .route(
            "/v1/delivery/tasks",
            get(handlers::delivery_tasks).delete(handlers::clear_tasks),
        )
        .route("/v1/delivery/tasks/{id}", delete(handlers::cancel_task))
        .route("/v1/delivery/tasks/{id}/retry", post(handlers::retry_task))
        .route(
            "/v1/store/purchases/{id}/retry",
            post(handlers::retry_purchase),
        )
        .route(
            "/v1/store/purchases/{id}/deliver",
            post(handlers::deliver_purchase),
        )
        .route("/v1/server/status", get(handlers::server_status))
        .route("/v1/server/rcon", post(handlers::execute_rcon))
        .route("/v1/server/rcon/reconnect", post(handlers::reconnect_rcon))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// Binds `host:port` and serves until `cancel` fires.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), BlockshopError> {
    if config.bearer_token.is_none() {
        tracing::warn!("no gateway bearer token configured, operator routes will reject every request");
    }
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BlockshopError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| BlockshopError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_debug_redacts_token() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            bearer_token: Some("hunter2".to_string()),
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("127.0.0.1"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn server_config_from_gateway_config() {
        let config = ServerConfig::from(&GatewayConfig::default());
        assert_eq!(config.port, 8080);
        assert!(config.bearer_token.is_none());
    }
}
