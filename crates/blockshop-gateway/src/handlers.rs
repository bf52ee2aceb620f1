// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers.
//!
//! Every response uses the `{ success, data?, error?, message? }` envelope.

use std::str::FromStr;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use blockshop_config::OfflinePolicy;
use blockshop_core::{
    BlockshopError, Command, DeliveryOutcome, DeliveryTask, QueueStatus, RconConnectionState,
    TaskId,
};
use blockshop_delivery::DeliverySettings;
use blockshop_rcon::{CommandId, DispatcherSettings, TransportInfo};
use blockshop_store::{ItemCategory, Purchase, PurchaseId, PurchaseStatus, StoreItem};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::server::GatewayState;

/// Response envelope shared by every route.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// A failed request: status code plus the envelope's `error` text.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<BlockshopError> for ApiError {
    fn from(err: BlockshopError) -> Self {
        let status = match &err {
            BlockshopError::NotFound { .. } => StatusCode::NOT_FOUND,
            BlockshopError::InvalidState(_) | BlockshopError::Config(_) => StatusCode::BAD_REQUEST,
            BlockshopError::NotConnected { .. } => StatusCode::SERVICE_UNAVAILABLE,
            BlockshopError::CommandExecution { .. } | BlockshopError::TaskAborted { .. } => {
                StatusCode::BAD_GATEWAY
            }
            BlockshopError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            BlockshopError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.message),
            message: None,
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

fn parse_id<T: FromStr>(kind: &str, raw: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("invalid {kind} id: {raw}")))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub console_connected: bool,
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> ApiResponse<HealthResponse> {
    ApiResponse::ok(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.start_time.elapsed().as_secs(),
        console_connected: state.dispatcher.get_connection_status(),
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemsQuery {
    pub category: Option<String>,
    pub popular: Option<String>,
}

/// GET /v1/store/items
pub async fn list_items(
    State(state): State<GatewayState>,
    Query(query): Query<ItemsQuery>,
) -> ApiResult<Vec<StoreItem>> {
    let category = query
        .category
        .as_deref()
        .filter(|c| !c.is_empty())
        .map(|c| {
            c.parse::<ItemCategory>()
                .map_err(|_| ApiError::bad_request(format!("unknown category: {c}")))
        })
        .transpose()?;
    let popular_only = query.popular.as_deref() == Some("true");

    let items = state
        .orchestrator
        .catalog()
        .list(category, popular_only)
        .into_iter()
        .cloned()
        .collect();
    Ok(ApiResponse::ok(items))
}

/// GET /v1/store/items/{id}
pub async fn get_item(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<StoreItem> {
    state
        .orchestrator
        .catalog()
        .get(&id)
        .cloned()
        .map(ApiResponse::ok)
        .ok_or_else(|| BlockshopError::not_found("store item", &id).into())
}

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    #[serde(alias = "itemId")]
    pub item_id: String,
    #[serde(alias = "playerId")]
    pub player_id: String,
    #[serde(alias = "playerUsername", alias = "username")]
    pub player_username: String,
}

/// POST /v1/store/purchase
pub async fn create_purchase(
    State(state): State<GatewayState>,
    Json(body): Json<PurchaseRequest>,
) -> ApiResult<Purchase> {
    let purchase = state
        .orchestrator
        .purchase(&body.item_id, &body.player_id, &body.player_username)
        .await?;
    Ok(ApiResponse::ok(purchase).with_message("Purchase created successfully"))
}

#[derive(Debug, Default, Deserialize)]
pub struct PurchasesQuery {
    #[serde(alias = "playerId")]
    pub player_id: Option<String>,
    pub status: Option<String>,
}

/// GET /v1/store/purchases
pub async fn list_purchases(
    State(state): State<GatewayState>,
    Query(query): Query<PurchasesQuery>,
) -> ApiResult<Vec<Purchase>> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<PurchaseStatus>()
                .map_err(|_| ApiError::bad_request(format!("unknown purchase status: {s}")))
        })
        .transpose()?;
    let player = query.player_id.as_deref().filter(|p| !p.is_empty());
    Ok(ApiResponse::ok(
        state.orchestrator.list_purchases(player, status).await,
    ))
}

/// POST /v1/store/purchases/{id}/retry
pub async fn retry_purchase(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<Purchase> {
    let id: PurchaseId = parse_id("purchase", &id)?;
    let purchase = state.orchestrator.retry_purchase(id).await?;
    Ok(ApiResponse::ok(purchase).with_message("Delivery retry initiated"))
}

#[derive(Debug, Serialize)]
pub struct ManualDeliveryResponse {
    pub purchase: Purchase,
    pub outcome: DeliveryOutcome,
}

/// POST /v1/store/purchases/{id}/deliver
pub async fn deliver_purchase(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<ManualDeliveryResponse> {
    let id: PurchaseId = parse_id("purchase", &id)?;
    let (purchase, outcome) = state.orchestrator.manual_delivery(id).await?;
    let message = if outcome.success {
        "Delivery completed"
    } else {
        "Delivery failed"
    };
    Ok(ApiResponse::ok(ManualDeliveryResponse { purchase, outcome }).with_message(message))
}

/// GET /v1/delivery/status
pub async fn delivery_status(State(state): State<GatewayState>) -> ApiResponse<QueueStatus> {
    ApiResponse::ok(state.queue.get_queue_status().await)
}

/// GET /v1/delivery/tasks
pub async fn delivery_tasks(State(state): State<GatewayState>) -> ApiResponse<Vec<DeliveryTask>> {
    ApiResponse::ok(state.queue.get_queue_items().await)
}

/// POST /v1/delivery/tasks/{id}/retry
pub async fn retry_task(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<DeliveryTask> {
    let id: TaskId = parse_id("task", &id)?;
    if state.queue.get_task(id).await.is_none() {
        return Err(BlockshopError::not_found("delivery task", id).into());
    }
    if !state.queue.retry_delivery(id).await {
        return Err(BlockshopError::InvalidState(format!(
            "delivery task {id} is being processed"
        ))
        .into());
    }
    let task = state
        .queue
        .get_task(id)
        .await
        .ok_or_else(|| BlockshopError::not_found("delivery task", id))?;
    Ok(ApiResponse::ok(task).with_message("Delivery retry scheduled"))
}

/// DELETE /v1/delivery/tasks/{id}
pub async fn cancel_task(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id: TaskId = parse_id("task", &id)?;
    if !state.queue.cancel_delivery(id).await {
        return Err(BlockshopError::not_found("delivery task", id).into());
    }
    Ok(ApiResponse::ok(()).with_message("Delivery cancelled"))
}

#[derive(Debug, Serialize)]
pub struct ClearedResponse {
    pub removed: usize,
}

/// DELETE /v1/delivery/tasks
pub async fn clear_tasks(State(state): State<GatewayState>) -> ApiResponse<ClearedResponse> {
    let removed = state.queue.clear_queue().await;
    ApiResponse::ok(ClearedResponse { removed }).with_message("Delivery queue cleared")
}

#[derive(Debug, Serialize)]
pub struct ServerStatusResponse {
    pub connection: RconConnectionState,
    pub transport: TransportInfo,
    pub command_queue_depth: usize,
    pub console_settings: ConsoleSettingsView,
    pub delivery: QueueStatus,
    pub delivery_settings: DeliverySettingsView,
}

/// Effective dispatcher timings.
#[derive(Debug, Serialize)]
pub struct ConsoleSettingsView {
    pub max_connection_attempts: u32,
    pub reconnect_delay_secs: u64,
    pub heartbeat_interval_secs: u64,
    pub command_timeout_secs: u64,
    pub queue_tick_ms: u64,
}

impl From<&DispatcherSettings> for ConsoleSettingsView {
    fn from(settings: &DispatcherSettings) -> Self {
        Self {
            max_connection_attempts: settings.max_connection_attempts,
            reconnect_delay_secs: settings.reconnect_delay.as_secs(),
            heartbeat_interval_secs: settings.heartbeat_interval.as_secs(),
            command_timeout_secs: settings.command_timeout.as_secs(),
            queue_tick_ms: u64::try_from(settings.queue_tick.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Effective delivery retry policy.
#[derive(Debug, Serialize)]
pub struct DeliverySettingsView {
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    pub batch_size: usize,
    pub offline_policy: OfflinePolicy,
}

impl From<&DeliverySettings> for DeliverySettingsView {
    fn from(settings: &DeliverySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            retry_delay_secs: settings.retry_delay.as_secs(),
            batch_size: settings.batch_size,
            offline_policy: settings.offline_policy,
        }
    }
}

/// GET /v1/server/status
pub async fn server_status(State(state): State<GatewayState>) -> ApiResponse<ServerStatusResponse> {
    ApiResponse::ok(ServerStatusResponse {
        connection: state.dispatcher.connection_state(),
        transport: state.dispatcher.transport_info().await,
        command_queue_depth: state.dispatcher.get_queue_depth(),
        console_settings: ConsoleSettingsView::from(state.dispatcher.settings()),
        delivery: state.queue.get_queue_status().await,
        delivery_settings: DeliverySettingsView::from(state.queue.settings()),
    })
}

#[derive(Debug, Deserialize)]
pub struct RconRequest {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub queued: bool,
    #[serde(default)]
    pub priority: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct RconResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_id: Option<CommandId>,
    pub timestamp: DateTime<Utc>,
}

/// Priority for operator commands sent through the queue without one.
const OPERATOR_PRIORITY: i32 = 5;

/// POST /v1/server/rcon
pub async fn execute_rcon(
    State(state): State<GatewayState>,
    Json(body): Json<RconRequest>,
) -> ApiResult<RconResponse> {
    let name = body.command.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(ApiError::bad_request(
            "command must be a single word; pass parameters in args",
        ));
    }
    let command = Command::new(name, body.args);
    tracing::info!(command = %command, queued = body.queued, "operator console command");

    if body.queued {
        let id = state.dispatcher.enqueue_command(
            &command,
            body.priority.unwrap_or(OPERATOR_PRIORITY),
            None,
        );
        return Ok(ApiResponse::ok(RconResponse {
            success: true,
            output: None,
            command_id: Some(id),
            timestamp: Utc::now(),
        })
        .with_message("Command queued"));
    }

    let output = state.dispatcher.execute_immediate(&command, None).await?;
    Ok(ApiResponse::ok(RconResponse {
        success: true,
        output: Some(output),
        command_id: None,
        timestamp: Utc::now(),
    }))
}

#[derive(Debug, Serialize)]
pub struct ReconnectResponse {
    pub connected: bool,
}

/// POST /v1/server/rcon/reconnect
pub async fn reconnect_rcon(State(state): State<GatewayState>) -> ApiResponse<ReconnectResponse> {
    let connected = state.dispatcher.connect().await;
    let message = if connected {
        "Console connected"
    } else {
        "Console reconnect failed"
    };
    ApiResponse::ok(ReconnectResponse { connected }).with_message(message)
}
