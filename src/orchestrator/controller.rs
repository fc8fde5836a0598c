//! Run lifecycle controller.
//!
//! Owns the three periodic pollers and the start/stop actions, and emits
//! events for presentation layers. Every request runs in its own task so a
//! slow collaborator never delays the next tick or a user action.

use crate::client::PanelClient;
use crate::model::{Game, PanelEvent, Region, RunConfig};
use crate::settings::PanelSettings;
use anyhow::Result;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Start(RunConfig),
    Stop,
    /// The form switched environment; checkpoint listings follow it.
    SetGame(Game),
    Quit,
}

pub(crate) async fn refresh_status(client: &PanelClient, event_tx: &UnboundedSender<PanelEvent>) {
    match client.status().await {
        Ok(status) => {
            debug!(state = %status.state, "status refreshed");
            let _ = event_tx.send(PanelEvent::Status(status));
        }
        Err(e) => report_failure(event_tx, Region::Status, e),
    }
}

pub(crate) async fn refresh_logs(client: &PanelClient, event_tx: &UnboundedSender<PanelEvent>) {
    match client.logs().await {
        Ok(lines) => {
            debug!(lines = lines.len(), "logs refreshed");
            let _ = event_tx.send(PanelEvent::Logs(lines));
        }
        Err(e) => report_failure(event_tx, Region::Logs, e),
    }
}

pub(crate) async fn refresh_models(
    client: &PanelClient,
    game: Game,
    event_tx: &UnboundedSender<PanelEvent>,
) {
    match client.models(game).await {
        Ok(files) => {
            debug!(%game, files = files.len(), "models refreshed");
            let _ = event_tx.send(PanelEvent::Models { game, files });
        }
        Err(e) => report_failure(event_tx, Region::Models, e),
    }
}

fn report_failure(
    event_tx: &UnboundedSender<PanelEvent>,
    region: Region,
    e: crate::client::ClientError,
) {
    warn!(%region, error = %e, "poll failed");
    let _ = event_tx.send(PanelEvent::PollFailed {
        region,
        error: e.to_string(),
    });
}

/// Submit a launch request, then refresh status right away. Running state is
/// only shown once the collaborator reports it.
pub(crate) async fn start_run(
    client: &PanelClient,
    cfg: RunConfig,
    event_tx: &UnboundedSender<PanelEvent>,
) {
    info!(task = %cfg.task, game = %cfg.game, run_name = %cfg.run_name, "starting run");
    let msg = match client.start(&cfg).await {
        Ok(_) => format!("Start requested: {} {} ({})", cfg.task, cfg.game, cfg.run_name),
        Err(e) => {
            warn!(error = %e, "start rejected");
            format!("Start failed: {e}")
        }
    };
    let _ = event_tx.send(PanelEvent::Info(msg));
    refresh_status(client, event_tx).await;
}

/// Submit a stop request, then refresh status right away. Stopping an idle
/// collaborator is fine; it owns idempotency.
pub(crate) async fn stop_run(client: &PanelClient, event_tx: &UnboundedSender<PanelEvent>) {
    info!("stopping run");
    let msg = match client.stop().await {
        Ok(_) => "Stop requested".to_string(),
        Err(e) => {
            warn!(error = %e, "stop failed");
            format!("Stop failed: {e}")
        }
    };
    let _ = event_tx.send(PanelEvent::Info(msg));
    refresh_status(client, event_tx).await;
}

/// Poll the collaborator on fixed periods and execute UI commands until quit.
pub(crate) async fn run_controller(
    client: PanelClient,
    settings: &PanelSettings,
    initial_game: Game,
    event_tx: UnboundedSender<PanelEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut game = initial_game;
    let mut status_tick = tokio::time::interval(settings.status_interval);
    let mut logs_tick = tokio::time::interval(settings.logs_interval);
    let mut models_tick = tokio::time::interval(settings.models_interval);
    for tick in [&mut status_tick, &mut logs_tick, &mut models_tick] {
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    }

    // In-flight requests. Dropping the set on quit abandons them.
    let mut tasks: JoinSet<()> = JoinSet::new();

    info!(base_url = client.base_url(), %game, "controller started");

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Start(cfg)) => {
                        let (client, tx) = (client.clone(), event_tx.clone());
                        tasks.spawn(async move { start_run(&client, cfg, &tx).await });
                    }
                    Some(UiCommand::Stop) => {
                        let (client, tx) = (client.clone(), event_tx.clone());
                        tasks.spawn(async move { stop_run(&client, &tx).await });
                    }
                    Some(UiCommand::SetGame(g)) => {
                        game = g;
                        let (client, tx) = (client.clone(), event_tx.clone());
                        tasks.spawn(async move { refresh_models(&client, g, &tx).await });
                    }
                    Some(UiCommand::Quit) | None => break,
                }
            }
            _ = status_tick.tick() => {
                let (client, tx) = (client.clone(), event_tx.clone());
                tasks.spawn(async move { refresh_status(&client, &tx).await });
            }
            _ = logs_tick.tick() => {
                let (client, tx) = (client.clone(), event_tx.clone());
                tasks.spawn(async move { refresh_logs(&client, &tx).await });
            }
            _ = models_tick.tick() => {
                let (client, tx) = (client.clone(), event_tx.clone());
                tasks.spawn(async move { refresh_models(&client, game, &tx).await });
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    warn!(error = %e, "refresh task failed");
                }
            }
        }
    }

    debug!(in_flight = tasks.len(), "controller stopping");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{build_run_config, FormState};
    use crate::model::RunState;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_settings(base_url: String) -> PanelSettings {
        PanelSettings {
            base_url,
            status_interval: Duration::from_millis(50),
            logs_interval: Duration::from_millis(50),
            models_interval: Duration::from_secs(60),
            request_timeout: Duration::from_secs(2),
        }
    }

    async fn mount_pollers(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"state": "running", "command": "python train.py"})),
            )
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/logs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"lines": ["step 1"]})))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .and(query_param("game", "lunarlander"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"files": ["ll.zip"]})))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .and(query_param("game", "pong"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"files": ["pong_dqn.zip"]})))
            .mount(server)
            .await;
    }

    async fn next_matching<F>(rx: &mut mpsc::UnboundedReceiver<PanelEvent>, mut f: F) -> PanelEvent
    where
        F: FnMut(&PanelEvent) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let ev = rx.recv().await.expect("controller closed the channel");
                if f(&ev) {
                    return ev;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    #[tokio::test]
    async fn polls_every_region() {
        let server = MockServer::start().await;
        mount_pollers(&server).await;
        let settings = fast_settings(server.uri());
        let client = PanelClient::new(&settings.base_url, settings.request_timeout).unwrap();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            run_controller(client, &settings, Game::LunarLander, event_tx, cmd_rx).await
        });

        let ev = next_matching(&mut event_rx, |e| matches!(e, PanelEvent::Status(_))).await;
        match ev {
            PanelEvent::Status(s) => assert_eq!(s.state, RunState::Running),
            _ => unreachable!(),
        }
        next_matching(&mut event_rx, |e| matches!(e, PanelEvent::Logs(l) if l == &["step 1"]))
            .await;
        next_matching(&mut event_rx, |e| {
            matches!(e, PanelEvent::Models { game: Game::LunarLander, files } if files == &["ll.zip"])
        })
        .await;

        // Switching environment lists that environment's checkpoints right away,
        // well before the next periodic model tick.
        cmd_tx.send(UiCommand::SetGame(Game::Pong)).unwrap();
        next_matching(&mut event_rx, |e| {
            matches!(e, PanelEvent::Models { game: Game::Pong, files } if files == &["pong_dqn.zip"])
        })
        .await;

        cmd_tx.send(UiCommand::Quit).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn start_is_followed_by_a_status_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/run"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "running"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = PanelClient::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        start_run(&client, build_run_config(&FormState::default()), &tx).await;

        match rx.recv().await {
            Some(PanelEvent::Info(msg)) => assert!(msg.starts_with("Start requested"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(rx.recv().await, Some(PanelEvent::Status(_))));
    }

    #[tokio::test]
    async fn rejected_start_still_refreshes_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/run"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "Invalid task/game"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "idle"})))
            .mount(&server)
            .await;

        let client = PanelClient::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        start_run(&client, build_run_config(&FormState::default()), &tx).await;

        match rx.recv().await {
            Some(PanelEvent::Info(msg)) => assert!(msg.contains("Invalid task/game"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
        match rx.recv().await {
            Some(PanelEvent::Status(s)) => assert_eq!(s.state, RunState::Idle),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn stop_when_unreachable_reports_without_panicking() {
        let client = PanelClient::new("http://127.0.0.1:9", Duration::from_millis(300)).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        stop_run(&client, &tx).await;

        assert!(matches!(rx.recv().await, Some(PanelEvent::Info(m)) if m.starts_with("Stop failed")));
        assert!(matches!(
            rx.recv().await,
            Some(PanelEvent::PollFailed { region: Region::Status, .. })
        ));
    }
}
