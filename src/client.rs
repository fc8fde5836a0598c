//! HTTP client for the collaborator that supervises the training process.

use crate::model::{Game, LogsResponse, ModelsResponse, RunConfig, StatusResponse};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("collaborator answered {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("unexpected response shape: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct PanelClient {
    http: reqwest::Client,
    base_url: String,
}

impl PanelClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(format!("rl-run-panel/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn status(&self) -> Result<StatusResponse, ClientError> {
        self.get_json("/status", &[]).await
    }

    pub async fn logs(&self) -> Result<Vec<String>, ClientError> {
        let r: LogsResponse = self.get_json("/logs", &[]).await?;
        Ok(r.lines)
    }

    /// Checkpoint filenames saved for `game`.
    pub async fn models(&self, game: Game) -> Result<Vec<String>, ClientError> {
        let r: ModelsResponse = self.get_json("/models", &[("game", game.id())]).await?;
        Ok(r.files)
    }

    /// Submit a launch request. The reply is returned uninterpreted.
    pub async fn start(&self, cfg: &RunConfig) -> Result<serde_json::Value, ClientError> {
        self.post_json("/run", cfg).await
    }

    pub async fn stop(&self) -> Result<serde_json::Value, ClientError> {
        self.post_json("/stop", &serde_json::json!({})).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let resp = self.http.get(self.url(path)).query(query).send().await?;
        let body = read_success_body(resp).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &B,
    ) -> Result<serde_json::Value, ClientError> {
        // `.json()` sets `Content-Type: application/json`.
        let resp = self.http.post(self.url(path)).json(payload).send().await?;
        let body = read_success_body(resp).await?;
        Ok(serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body)))
    }
}

async fn read_success_body(resp: reqwest::Response) -> Result<String, ClientError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(ClientError::Status { status, body });
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{build_run_config, FormState};
    use crate::model::{RunState, Task};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> PanelClient {
        PanelClient::new(&server.uri(), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn fetches_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"state": "exit(-1)", "command": "python eval.py"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let s = client(&server).status().await.unwrap();
        assert_eq!(s.state, RunState::Exited { code: "-1".into() });
        assert_eq!(s.command.as_deref(), Some("python eval.py"));
    }

    #[tokio::test]
    async fn fetches_logs_and_models_for_game() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/logs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"lines": ["a", "b"]})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .and(query_param("game", "pong"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"files": ["pong_dqn.zip"]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let c = client(&server);
        assert_eq!(c.logs().await.unwrap(), vec!["a", "b"]);
        assert_eq!(c.models(Game::Pong).await.unwrap(), vec!["pong_dqn.zip"]);
    }

    #[tokio::test]
    async fn malformed_body_is_reported_as_shape_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/logs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rows": []})))
            .mount(&server)
            .await;

        let err = client(&server).logs().await.unwrap_err();
        assert!(matches!(err, ClientError::Malformed(_)), "{err}");
    }

    #[tokio::test]
    async fn start_posts_the_run_config_as_json() {
        let server = MockServer::start().await;
        let mut form = FormState::for_game(Game::Pong);
        form.task = Task::Evaluate;
        form.model = Some("pong_dqn.zip".into());
        let cfg = build_run_config(&form);

        Mock::given(method("POST"))
            .and(path("/run"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({
                "task": "eval",
                "game": "pong",
                "run_name": "pong_dqn",
                "device": "auto",
                "verbose": 0,
                "episodes": 3,
                "eval_device": "auto",
                "model_path": "models/pong_dqn.zip",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client(&server).start(&cfg).await.unwrap();
        assert_eq!(reply, json!({"ok": true}));
    }

    #[tokio::test]
    async fn rejected_start_surfaces_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/run"))
            .respond_with(
                ResponseTemplate::new(409).set_body_json(json!({"error": "process already running"})),
            )
            .mount(&server)
            .await;

        let cfg = build_run_config(&FormState::default());
        match client(&server).start(&cfg).await {
            Err(ClientError::Status { status, body }) => {
                assert_eq!(status, StatusCode::CONFLICT);
                assert!(body.contains("already running"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stop_sends_empty_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/stop"))
            .and(body_json(json!({})))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client(&server).stop().await.unwrap();
        assert_eq!(reply, json!("ok"));
    }

    #[tokio::test]
    async fn unreachable_collaborator_is_a_transport_error() {
        let c = PanelClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let err = c.status().await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)), "{err}");
    }
}
