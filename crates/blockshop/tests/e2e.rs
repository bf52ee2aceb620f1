// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests: gateway requests flowing through the background
//! dispatcher, delivery tick and purchase event consumer.

use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use blockshop_config::{DeliveryMode, OfflinePolicy};
use blockshop_core::TransportError;
use blockshop_delivery::DeliverySettings;
use blockshop_gateway::{AuthConfig, GatewayState, router};
use blockshop_store::StoreSettings;
use blockshop_test_utils::TestHarness;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

const TOKEN: &str = "e2e-operator";

struct Running {
    harness: TestHarness,
    app: Router,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl Running {
    async fn start(delivery: DeliverySettings) -> Self {
        let harness = TestHarness::builder()
            .with_delivery_settings(delivery)
            .with_store_settings(StoreSettings {
                delivery_mode: DeliveryMode::Queued,
                queue_on_immediate_failure: true,
            })
            .build()
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let workers = vec![
            tokio::spawn(harness.dispatcher.clone().run(cancel.clone())),
            harness
                .queue
                .spawn_processing(Duration::from_secs(1), cancel.clone()),
            harness.orchestrator.spawn_event_consumer(cancel.clone()),
        ];

        let state = GatewayState::new(
            harness.orchestrator.clone(),
            harness.dispatcher.clone(),
            AuthConfig {
                bearer_token: Some(TOKEN.to_string()),
            },
        );
        Self {
            harness,
            app: router(state),
            cancel,
            workers,
        }
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"));
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn purchases_of(&self, player_id: &str) -> Vec<Value> {
        let uri = format!("/v1/store/purchases?player_id={player_id}");
        let (_, body) = self.send(Method::GET, &uri, None).await;
        body["data"].as_array().cloned().unwrap_or_default()
    }

    async fn stop(self) {
        self.cancel.cancel();
        for worker in self.workers {
            worker.await.unwrap();
        }
    }
}

fn settings() -> DeliverySettings {
    DeliverySettings {
        offline_policy: OfflinePolicy::Ignore,
        ..DeliverySettings::default()
    }
}

fn buy(item: &str, player_id: &str, username: &str) -> Value {
    json!({ "item_id": item, "player_id": player_id, "player_username": username })
}

#[tokio::test(start_paused = true)]
async fn queued_rank_purchase_is_delivered_in_the_background() {
    let running = Running::start(settings()).await;

    let (status, body) = running
        .send(
            Method::POST,
            "/v1/store/purchase",
            Some(buy("vip-rank", "uuid-steve", "Steve")),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "processing");
    assert!(body["data"]["delivery_task_id"].is_string());

    tokio::time::sleep(Duration::from_secs(10)).await;

    let purchases = running.purchases_of("uuid-steve").await;
    assert_eq!(purchases.len(), 1);
    assert_eq!(purchases[0]["status"], "completed");
    assert!(purchases[0]["delivered_at"].is_string());

    let lines = running.harness.console_lines().await;
    assert!(lines.contains(&"lp user Steve parent set vip".to_string()));
    assert!(lines.contains(&"broadcast Steve has been promoted to VIP!".to_string()));
    assert!(lines.contains(&"give Steve diamond 16".to_string()));

    let (_, body) = running.send(Method::GET, "/v1/delivery/status", None).await;
    assert_eq!(body["data"]["total"], 0);

    running.stop().await;
}

#[tokio::test(start_paused = true)]
async fn failed_delivery_can_be_retried_by_an_operator() {
    let running = Running::start(DeliverySettings {
        max_attempts: 2,
        retry_delay: Duration::ZERO,
        ..settings()
    })
    .await;
    running
        .harness
        .transport
        .fail_verb("broadcast", TransportError::Rejected("unknown command".into()))
        .await;

    let (_, body) = running
        .send(
            Method::POST,
            "/v1/store/purchase",
            Some(buy("vip-rank", "uuid-alex", "Alex")),
        )
        .await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    tokio::time::sleep(Duration::from_secs(10)).await;

    let purchases = running.purchases_of("uuid-alex").await;
    assert_eq!(purchases[0]["status"], "failed");
    assert!(
        purchases[0]["failure_reason"]
            .as_str()
            .unwrap()
            .contains("broadcast Alex has been promoted")
    );
    let (_, body) = running.send(Method::GET, "/v1/delivery/status", None).await;
    assert_eq!(body["data"]["failed"], 1);

    running.harness.transport.clear_failures().await;
    let uri = format!("/v1/store/purchases/{id}/retry");
    let (status, body) = running.send(Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "processing");

    tokio::time::sleep(Duration::from_secs(10)).await;

    let purchases = running.purchases_of("uuid-alex").await;
    assert_eq!(purchases[0]["status"], "completed");
    let (_, body) = running.send(Method::GET, "/v1/delivery/status", None).await;
    assert_eq!(body["data"]["total"], 0);

    running.stop().await;
}

#[tokio::test(start_paused = true)]
async fn queued_operator_command_is_drained_by_the_dispatcher() {
    let running = Running::start(settings()).await;

    let (status, body) = running
        .send(
            Method::POST,
            "/v1/server/rcon",
            Some(json!({ "command": "say", "args": ["restart", "in", "5"], "queued": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["command_id"].is_u64());

    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(running.harness.dispatcher.get_queue_depth(), 0);
    assert!(
        running
            .harness
            .console_lines()
            .await
            .contains(&"say restart in 5".to_string())
    );

    running.stop().await;
}
