//! Shared fixtures for the generation integration tests.
//!
//! A single [`MockServer`] stands in for the task API, the data backend
//! and the webhook service.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nymia_backend::BackendConfig;
use nymia_core::credits::CostQuote;
use nymia_core::store::Store;
use nymia_generation::{Confirmation, GenerationFlow};
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ASSET_BASE: &str = "https://cdn.test";
pub const USER_ID: i64 = 17;

pub fn user_uuid() -> Uuid {
    Uuid::from_u128(0x5eed)
}

pub fn config(server: &MockServer) -> BackendConfig {
    BackendConfig {
        api_url: server.uri(),
        data_url: server.uri(),
        asset_base_url: ASSET_BASE.into(),
        webhook_url: Some(server.uri()),
        api_token: "test-token".into(),
        request_timeout: Duration::from_secs(5),
        max_poll_errors: 0,
    }
}

/// A flow with a short poll interval, not yet signed in.
pub fn flow(server: &MockServer) -> GenerationFlow {
    GenerationFlow::new(&config(server), Arc::new(Store::new()))
        .expect("flow should build")
        .with_poll_interval(Duration::from_millis(10))
}

pub async fn mount_user(server: &MockServer, credits: f64) {
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(query_param("uuid", format!("eq.{}", user_uuid())))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": USER_ID, "uuid": user_uuid(), "credits": credits}
        ])))
        .mount(server)
        .await;
}

pub async fn mount_gems(server: &MockServer, gems: f64) {
    Mock::given(method("POST"))
        .and(path("/getgems"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"gems": gems})))
        .mount(server)
        .await;
}

/// Answer the next `times` polls for `task_id` with `rows`.
pub async fn mount_poll(server: &MockServer, task_id: &str, rows: Value, times: u64) {
    Mock::given(method("GET"))
        .and(path("/generated_images"))
        .and(query_param("task_id", format!("eq.{task_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .up_to_n_times(times)
        .expect(times)
        .mount(server)
        .await;
}

pub fn processing_row(task_id: &str) -> Value {
    json!([{"task_id": task_id, "generation_status": "processing"}])
}

pub fn completed_row(task_id: &str, system_filename: &str) -> Value {
    json!([{
        "task_id": task_id,
        "generation_status": "completed",
        "system_filename": system_filename,
        "user_filename": null,
        "file_path": format!("u1/output/{system_filename}"),
    }])
}

/// Confirmation that always says no.
pub struct Decline;

#[async_trait]
impl Confirmation for Decline {
    async fn confirm(&self, _quote: &CostQuote, _balance: f64) -> bool {
        false
    }
}
