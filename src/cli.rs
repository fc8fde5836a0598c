use crate::client::PanelClient;
use crate::form::{build_run_config, FormState};
use crate::model::{Game, Task, DEVICES, VEC_BACKENDS};
use crate::settings::{self, PanelSettings, SettingsFile};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "rl-run-panel",
    version,
    about = "Control panel for a single RL training/evaluation run"
)]
pub struct Cli {
    /// Base URL of the run server [default: http://127.0.0.1:8000]
    #[arg(long)]
    pub base_url: Option<String>,

    /// Settings file (JSON) [default: <config dir>/rl-run-panel/settings.json]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Status refresh period [default: 1s]
    #[arg(long)]
    pub status_interval: Option<humantime::Duration>,

    /// Log refresh period [default: 1s]
    #[arg(long)]
    pub logs_interval: Option<humantime::Duration>,

    /// Checkpoint list refresh period [default: 5s]
    #[arg(long)]
    pub models_interval: Option<humantime::Duration>,

    /// Per-request timeout [default: 5s]
    #[arg(long)]
    pub request_timeout: Option<humantime::Duration>,

    /// Write diagnostics to this file (filter with RUST_LOG)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Print status as JSON and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Print a text snapshot of status, checkpoints and recent logs and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// List saved checkpoints for --game and exit
    #[arg(long)]
    pub models: bool,

    /// Start a run from the form flags below and exit
    #[arg(long)]
    pub start: bool,

    /// Stop the active run and exit
    #[arg(long)]
    pub stop: bool,

    /// Task to launch (train or evaluate)
    #[arg(long, default_value = "train")]
    pub task: Task,

    /// Environment (lunarlander or pong)
    #[arg(long, default_value = "lunarlander")]
    pub game: Game,

    /// Run name [default: per environment]
    #[arg(long)]
    pub run_name: Option<String>,

    /// Training timesteps [default: per environment]
    #[arg(long)]
    pub timesteps: Option<u64>,

    /// Parallel environments for training [default: per environment]
    #[arg(long)]
    pub n_envs: Option<u32>,

    /// Training device
    #[arg(long, value_parser = DEVICES)]
    pub device: Option<String>,

    /// Evaluation device
    #[arg(long, value_parser = DEVICES)]
    pub eval_device: Option<String>,

    /// Verbosity level passed to the training script
    #[arg(long)]
    pub verbose: Option<i64>,

    /// Vectorization backend (vectorized environments only)
    #[arg(long, value_parser = VEC_BACKENDS)]
    pub vec_env: Option<String>,

    /// Normalize vectorized observations (vectorized environments only)
    #[arg(long)]
    pub vec_normalize: bool,

    /// Evaluation episodes [default: per environment]
    #[arg(long)]
    pub episodes: Option<u32>,

    /// Checkpoint filename to evaluate (from --models)
    #[arg(long)]
    pub model: Option<String>,
}

impl Cli {
    pub fn is_headless(&self) -> bool {
        self.json || self.text || self.models || self.start || self.stop
    }
}

/// Seed the form from presets, then apply any flags given.
pub fn build_form(args: &Cli) -> FormState {
    let mut form = FormState::for_game(args.game);
    form.set_task(args.task);
    if let Some(name) = args.run_name.as_ref() {
        form.run_name = name.clone();
    }
    if let Some(v) = args.timesteps {
        form.timesteps = v.to_string();
    }
    if let Some(v) = args.n_envs {
        form.n_envs = v.to_string();
    }
    if let Some(v) = args.device.as_ref() {
        form.device = v.clone();
    }
    if let Some(v) = args.eval_device.as_ref() {
        form.eval_device = v.clone();
    }
    if let Some(v) = args.verbose {
        form.verbose = v.to_string();
    }
    if let Some(v) = args.vec_env.as_ref() {
        form.vec_env = v.clone();
    }
    form.vec_normalize = args.vec_normalize;
    if let Some(v) = args.episodes {
        form.episodes = v.to_string();
    }
    form.model = args.model.clone();
    form
}

/// Resolve settings from flags, the settings file and defaults.
pub fn resolve_settings(args: &Cli) -> Result<PanelSettings> {
    let file = match args.config.clone().or_else(settings::default_settings_path) {
        Some(path) => settings::load_settings_file(&path)?,
        None => SettingsFile::default(),
    };
    let overrides = SettingsFile {
        base_url: args.base_url.clone(),
        status_interval: args.status_interval.map(Into::into),
        logs_interval: args.logs_interval.map(Into::into),
        models_interval: args.models_interval.map(Into::into),
        request_timeout: args.request_timeout.map(Into::into),
    };
    Ok(PanelSettings::resolve(file, overrides))
}

pub async fn run(args: Cli) -> Result<()> {
    let actions = [args.start, args.stop, args.models]
        .iter()
        .filter(|a| **a)
        .count();
    if actions > 1 {
        return Err(anyhow::anyhow!(
            "--start, --stop and --models are mutually exclusive"
        ));
    }
    if args.json && args.text {
        return Err(anyhow::anyhow!("use either --json or --text, not both"));
    }

    let settings = resolve_settings(&args)?;

    if !args.is_headless() {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args, settings).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_headless(args, settings).await;
        }
    }

    run_headless(args, settings).await
}

async fn run_headless(args: Cli, settings: PanelSettings) -> Result<()> {
    let client = PanelClient::new(&settings.base_url, settings.request_timeout)
        .context("build HTTP client")?;
    let (out_tx, out_handle) = spawn_output_writer();

    let res = headless_action(&args, &client, &out_tx).await;

    drop(out_tx);
    let _ = out_handle.await;
    res
}

async fn headless_action(
    args: &Cli,
    client: &PanelClient,
    out_tx: &mpsc::UnboundedSender<OutputLine>,
) -> Result<()> {
    if args.models {
        let files = client
            .models(args.game)
            .await
            .with_context(|| format!("list checkpoints for {}", args.game))?;
        if args.json {
            let out = serde_json::to_string_pretty(
                &serde_json::json!({ "game": args.game, "files": files }),
            )?;
            let _ = out_tx.send(OutputLine::Stdout(out));
        } else {
            for f in files {
                let _ = out_tx.send(OutputLine::Stdout(f));
            }
        }
        return Ok(());
    }

    // A rejected action still reports the collaborator's current state.
    let mut action_err = None;
    if args.start {
        let cfg = build_run_config(&build_form(args));
        match client.start(&cfg).await {
            Ok(reply) => {
                let _ = out_tx.send(OutputLine::Stderr(format!(
                    "Start requested: {} {} ({}) -> {}",
                    cfg.task, cfg.game, cfg.run_name, reply
                )));
            }
            Err(e) => action_err = Some(anyhow::Error::from(e).context("start run")),
        }
    } else if args.stop {
        match client.stop().await {
            Ok(reply) => {
                let _ = out_tx.send(OutputLine::Stderr(format!("Stop requested -> {reply}")));
            }
            Err(e) => action_err = Some(anyhow::Error::from(e).context("stop run")),
        }
    }

    let snapshot = print_snapshot(args, client, out_tx).await;
    match action_err {
        Some(e) => Err(e),
        None => snapshot,
    }
}

async fn print_snapshot(
    args: &Cli,
    client: &PanelClient,
    out_tx: &mpsc::UnboundedSender<OutputLine>,
) -> Result<()> {
    let status = client.status().await.context("fetch status")?;
    if args.json {
        let _ = out_tx.send(OutputLine::Stdout(serde_json::to_string_pretty(&status)?));
        return Ok(());
    }

    let (models, logs) = if args.text {
        // Snapshot extras are best effort; status already succeeded.
        let (models, logs) = futures::join!(client.models(args.game), client.logs());
        (models.ok(), logs.unwrap_or_default())
    } else {
        (None, Vec::new())
    };
    let summary = crate::text_summary::build_text_summary(
        &status,
        args.game,
        models.as_deref(),
        &logs,
        crate::text_summary::DEFAULT_LOG_TAIL,
    );
    for line in summary.lines {
        let _ = out_tx.send(OutputLine::Stdout(line));
    }
    Ok(())
}
