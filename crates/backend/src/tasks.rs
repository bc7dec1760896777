//! Client for the task API: task creation and gem cost estimation.

use std::fmt;

use nymia_core::generation::TaskType;
use nymia_core::types::{TaskId, UserId};
use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::http::{build_client, parse_response};

/// HTTP client for the task API.
#[derive(Clone)]
pub struct TaskApi {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl fmt::Debug for TaskApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskApi")
            .field("api_url", &self.api_url)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// Response of `POST /createtask`.
#[derive(Debug, Deserialize)]
struct CreateTaskResponse {
    id: TaskId,
}

#[derive(Debug, Serialize)]
struct GemsRequest<'a> {
    item: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
}

/// Response of `POST /getgems`: per-unit cost of `item`.
#[derive(Debug, Deserialize)]
struct GemsResponse {
    gems: f64,
}

impl TaskApi {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        Ok(Self::with_client(build_client(config)?, config))
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: &BackendConfig) -> Self {
        Self {
            client,
            api_url: config.api_url.clone(),
            token: config.api_token.clone(),
        }
    }

    /// Create a task and return its server-assigned id.
    ///
    /// Sends `POST /createtask?userid=<id>&type=<type>` with the
    /// parameter payload as the JSON body. No retry is attempted.
    pub async fn create_task(
        &self,
        user_id: &UserId,
        task_type: TaskType,
        parameters: &serde_json::Value,
    ) -> Result<TaskId, BackendError> {
        let response = self
            .client
            .post(format!("{}/createtask", self.api_url))
            .bearer_auth(&self.token)
            .query(&[("userid", user_id.as_str()), ("type", task_type.as_str())])
            .json(parameters)
            .send()
            .await?;

        let created: CreateTaskResponse = parse_response("createtask", response).await?;

        tracing::info!(
            task_id = %created.id,
            task_type = %task_type,
            user_id = %user_id,
            "Task created",
        );

        Ok(created.id)
    }

    /// Per-unit gem cost of `item`.
    ///
    /// Sends `POST /getgems` with `{ item, user_id? }`.
    pub async fn get_gems(
        &self,
        item: &str,
        user_id: Option<&UserId>,
    ) -> Result<f64, BackendError> {
        let body = GemsRequest {
            item,
            user_id: user_id.map(UserId::as_str),
        };

        let response = self
            .client
            .post(format!("{}/getgems", self.api_url))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let gems: GemsResponse = parse_response("getgems", response).await?;
        tracing::debug!(item, gems = gems.gems, "Fetched gem cost");
        Ok(gems.gems)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config(server: &MockServer) -> BackendConfig {
        BackendConfig {
            api_url: server.uri(),
            data_url: server.uri(),
            asset_base_url: "https://cdn.test".into(),
            webhook_url: None,
            api_token: "token-1".into(),
            request_timeout: Duration::from_secs(5),
            max_poll_errors: 0,
        }
    }

    #[tokio::test]
    async fn create_task_sends_user_type_and_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/createtask"))
            .and(query_param("userid", "17"))
            .and(query_param("type", "faceswap"))
            .and(header("authorization", "Bearer token-1"))
            .and(body_json(serde_json::json!({"reference_image": "a", "face_image": "b"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 42})))
            .expect(1)
            .mount(&server)
            .await;

        let api = TaskApi::new(&config(&server)).unwrap();
        let id = api
            .create_task(
                &UserId::new("17"),
                TaskType::FaceSwap,
                &serde_json::json!({"reference_image": "a", "face_image": "b"}),
            )
            .await
            .unwrap();
        assert_eq!(id, TaskId::new("42"));
    }

    #[tokio::test]
    async fn create_task_surfaces_non_2xx() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/createtask"))
            .respond_with(ResponseTemplate::new(500).set_body_string("queue down"))
            .mount(&server)
            .await;

        let api = TaskApi::new(&config(&server)).unwrap();
        let err = api
            .create_task(&UserId::new("1"), TaskType::Image, &serde_json::json!({"a": 1}))
            .await
            .unwrap_err();
        assert_matches!(err, BackendError::Api { status: 500, ref body } if body == "queue down");
    }

    #[tokio::test]
    async fn create_task_without_id_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/createtask"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let api = TaskApi::new(&config(&server)).unwrap();
        let err = api
            .create_task(&UserId::new("1"), TaskType::Image, &serde_json::json!({"a": 1}))
            .await
            .unwrap_err();
        assert_matches!(err, BackendError::Decode { endpoint: "createtask", .. });
    }

    #[tokio::test]
    async fn get_gems_omits_absent_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/getgems"))
            .and(body_json(serde_json::json!({"item": "nymia_image"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"gems": 4})))
            .expect(1)
            .mount(&server)
            .await;

        let api = TaskApi::new(&config(&server)).unwrap();
        assert_eq!(api.get_gems("nymia_image", None).await.unwrap(), 4.0);
    }
}
