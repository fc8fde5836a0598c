use serde::{Deserialize, Serialize};
use std::fmt;

/// Directory on the collaborator side that holds saved checkpoints.
pub const CHECKPOINT_DIR: &str = "models";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Task {
    #[serde(rename = "train")]
    Train,
    #[serde(rename = "eval", alias = "evaluate")]
    Evaluate,
}

impl Task {
    pub const ALL: [Task; 2] = [Task::Train, Task::Evaluate];

    pub fn as_str(self) -> &'static str {
        match self {
            Task::Train => "train",
            Task::Evaluate => "evaluate",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Task {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "train" => Ok(Task::Train),
            "eval" | "evaluate" => Ok(Task::Evaluate),
            other => Err(format!("unknown task '{other}' (expected train or evaluate)")),
        }
    }
}

/// Simulated environment a run targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Game {
    #[serde(rename = "lunarlander")]
    LunarLander,
    #[serde(rename = "pong")]
    Pong,
}

impl Game {
    pub const ALL: [Game; 2] = [Game::LunarLander, Game::Pong];

    /// Identifier used on the wire and in default run names.
    pub fn id(self) -> &'static str {
        match self {
            Game::LunarLander => "lunarlander",
            Game::Pong => "pong",
        }
    }

    pub fn preset(self) -> &'static GamePreset {
        match self {
            Game::LunarLander => &LUNARLANDER_PRESET,
            Game::Pong => &PONG_PRESET,
        }
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl std::str::FromStr for Game {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lunarlander" => Ok(Game::LunarLander),
            "pong" => Ok(Game::Pong),
            other => Err(format!("unknown game '{other}' (expected lunarlander or pong)")),
        }
    }
}

/// Per-environment defaults applied to the form.
#[derive(Debug)]
pub struct GamePreset {
    pub run_name: &'static str,
    pub timesteps: u64,
    pub n_envs: u32,
    /// Some presets only support a fixed number of parallel environments.
    pub forced_n_envs: Option<u32>,
    /// Whether the environment supports vectorized parallel simulation.
    pub vectorized: bool,
    pub episodes: u32,
}

static LUNARLANDER_PRESET: GamePreset = GamePreset {
    run_name: "lunarlander_ppo",
    timesteps: 500_000,
    n_envs: 16,
    forced_n_envs: None,
    vectorized: true,
    episodes: 5,
};

static PONG_PRESET: GamePreset = GamePreset {
    run_name: "pong_dqn",
    timesteps: 1_000_000,
    n_envs: 1,
    forced_n_envs: Some(1),
    vectorized: false,
    episodes: 3,
};

pub const DEVICES: [&str; 3] = ["auto", "cpu", "cuda"];
pub const VEC_BACKENDS: [&str; 2] = ["subproc", "dummy"];
pub const VERBOSITY_LEVELS: [&str; 3] = ["0", "1", "2"];

/// Launch request posted to `/run`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunConfig {
    pub task: Task,
    pub game: Game,
    pub run_name: String,
    pub device: String,
    pub verbose: i64,
    #[serde(flatten)]
    pub params: TaskParams,
}

/// Task-specific field group. Only one group is ever sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TaskParams {
    Train {
        timesteps: u64,
        n_envs: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        vec_env: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        vec_normalize: Option<bool>,
    },
    Evaluate {
        episodes: u32,
        eval_device: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        model_path: Option<String>,
    },
}

/// Lifecycle state reported by the collaborator.
///
/// Decoded from the wire string (`idle`, `running`, `exit(<code>)`); any other
/// string is kept verbatim as `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunState {
    Idle,
    Running,
    Exited { code: String },
    Unknown(String),
}

const EXIT_PREFIX: &str = "exit(";
const EXIT_SUFFIX: &str = ")";

impl RunState {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "idle" => RunState::Idle,
            "running" => RunState::Running,
            _ => match raw
                .strip_prefix(EXIT_PREFIX)
                .and_then(|rest| rest.strip_suffix(EXIT_SUFFIX))
            {
                Some(code) => RunState::Exited {
                    code: code.to_string(),
                },
                None => RunState::Unknown(raw.to_string()),
            },
        }
    }

    /// Exit code `0`, compared as a string so `-0` or `00` are not successes.
    pub fn is_success(&self) -> bool {
        matches!(self, RunState::Exited { code } if code == "0")
    }
}

impl From<String> for RunState {
    fn from(raw: String) -> Self {
        RunState::parse(&raw)
    }
}

impl From<RunState> for String {
    fn from(state: RunState) -> Self {
        state.to_string()
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => f.write_str("idle"),
            RunState::Running => f.write_str("running"),
            RunState::Exited { code } => write!(f, "{EXIT_PREFIX}{code}{EXIT_SUFFIX}"),
            RunState::Unknown(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub state: RunState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogsResponse {
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub files: Vec<String>,
}

/// Events emitted by the controller and consumed by presentation layers.
#[derive(Debug, Clone)]
pub enum PanelEvent {
    Status(StatusResponse),
    Logs(Vec<String>),
    Models { game: Game, files: Vec<String> },
    /// A poll failed; the affected region keeps its last content.
    PollFailed { region: Region, error: String },
    Info(String),
}

/// UI region refreshed by one of the pollers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Status,
    Logs,
    Models,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Region::Status => "status",
            Region::Logs => "logs",
            Region::Models => "models",
        })
    }
}
