//! Credit gate behaviour: nothing is submitted unless the balance covers
//! the quoted cost and the user confirms it.

mod common;

use assert_matches::assert_matches;
use common::*;
use nymia_backend::BackendError;
use nymia_core::error::CoreError;
use nymia_core::generation::TaskRequest;
use nymia_generation::{AutoConfirm, GenerationError};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn forbid_create_task(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/createtask"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .expect(0)
        .mount(server)
        .await;
}

/// A balance below the quote aborts with a purchase link.
#[tokio::test]
async fn insufficient_balance_offers_purchase_link() {
    let server = MockServer::start().await;
    mount_user(&server, 1.0).await;
    mount_gems(&server, 2.0).await;
    forbid_create_task(&server).await;
    Mock::given(method("POST"))
        .and(path("/webhook/v1/create_purchase_link"))
        .and(body_json(json!({"user_uuid": user_uuid(), "prod_id": "gems_100"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"url": "https://pay.test/checkout"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let flow = flow(&server).with_purchase_product("gems_100");
    flow.sign_in(user_uuid()).await.expect("sign in should succeed");

    let err = flow
        .generate(TaskRequest::face_swap("A", "B"), 1, &AutoConfirm)
        .await
        .unwrap_err();

    assert_matches!(
        err,
        GenerationError::InsufficientCredits { required, balance, purchase_url: Some(ref url) }
            if required == 2.0 && balance == 1.0 && url == "https://pay.test/checkout"
    );
}

/// Declining the confirmation submits nothing.
#[tokio::test]
async fn declined_confirmation_submits_nothing() {
    let server = MockServer::start().await;
    mount_user(&server, 100.0).await;
    mount_gems(&server, 2.0).await;
    forbid_create_task(&server).await;

    let flow = flow(&server);
    flow.sign_in(user_uuid()).await.expect("sign in should succeed");

    let err = flow
        .generate(TaskRequest::face_swap("A", "B"), 1, &Decline)
        .await
        .unwrap_err();
    assert_matches!(err, GenerationError::Declined);
    assert!(flow.store().read(|s| s.results.is_empty()).await);
}

/// A failed cost estimate aborts; there is no default cost.
#[tokio::test]
async fn cost_estimation_failure_aborts() {
    let server = MockServer::start().await;
    mount_user(&server, 100.0).await;
    Mock::given(method("POST"))
        .and(path("/getgems"))
        .respond_with(ResponseTemplate::new(500).set_body_string("pricing down"))
        .mount(&server)
        .await;
    forbid_create_task(&server).await;

    let flow = flow(&server);
    flow.sign_in(user_uuid()).await.expect("sign in should succeed");

    let err = flow
        .generate(TaskRequest::face_swap("A", "B"), 1, &AutoConfirm)
        .await
        .unwrap_err();
    assert_matches!(err, GenerationError::Backend(BackendError::Api { status: 500, .. }));
}

/// Generating without a session fails before any request.
#[tokio::test]
async fn generation_requires_a_session() {
    let server = MockServer::start().await;
    forbid_create_task(&server).await;

    let err = flow(&server)
        .generate(TaskRequest::face_swap("A", "B"), 1, &AutoConfirm)
        .await
        .unwrap_err();
    assert_matches!(err, GenerationError::Core(CoreError::InvalidState(_)));
}
