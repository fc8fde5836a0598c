//! Form snapshot and launch-request builder.
//!
//! `FormState` owns the raw field values the operator edits. Turning it into a
//! `RunConfig` is a pure function so the coercion rules can be tested without
//! a terminal or a collaborator.

use crate::model::{Game, RunConfig, Task, TaskParams, CHECKPOINT_DIR};

const DEFAULT_TIMESTEPS: u64 = 0;
const DEFAULT_COUNT: u32 = 1;
const DEFAULT_VERBOSE: i64 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct FormState {
    pub task: Task,
    pub game: Game,
    pub run_name: String,
    pub timesteps: String,
    pub n_envs: String,
    pub device: String,
    pub verbose: String,
    pub vec_env: String,
    pub vec_normalize: bool,
    pub episodes: String,
    pub eval_device: String,
    /// Checkpoint filename chosen from the listing, without directory.
    pub model: Option<String>,
}

impl Default for FormState {
    fn default() -> Self {
        Self::for_game(Game::LunarLander)
    }
}

impl FormState {
    /// Fresh form populated from the game's preset.
    pub fn for_game(game: Game) -> Self {
        let preset = game.preset();
        Self {
            task: Task::Train,
            game,
            run_name: preset.run_name.to_string(),
            timesteps: preset.timesteps.to_string(),
            n_envs: preset.n_envs.to_string(),
            device: "auto".into(),
            verbose: "0".into(),
            vec_env: "subproc".into(),
            vec_normalize: false,
            episodes: preset.episodes.to_string(),
            eval_device: "auto".into(),
            model: None,
        }
    }

    pub fn set_task(&mut self, task: Task) {
        self.task = task;
    }

    /// Switch environment. Values the operator typed are never replaced; a
    /// field that is empty or still holds a preset default follows the new game.
    pub fn set_game(&mut self, game: Game) {
        if self.game == game {
            return;
        }
        let old = self.game.preset();
        let preset = game.preset();
        if self.run_name.trim().is_empty() || is_default_run_name(&self.run_name) {
            self.run_name = preset.run_name.to_string();
        }
        follow_preset(&mut self.timesteps, old.timesteps, preset.timesteps);
        follow_preset(&mut self.n_envs, old.n_envs, preset.n_envs);
        follow_preset(&mut self.episodes, old.episodes, preset.episodes);
        self.model = None;
        self.game = game;
    }

    /// Whether the form rows for vectorized simulation apply.
    pub fn shows_vectorization(&self) -> bool {
        self.task == Task::Train && self.game.preset().vectorized
    }
}

fn follow_preset<T: ToString>(field: &mut String, old: T, new: T) {
    let current = field.trim();
    if current.is_empty() || current == old.to_string() {
        *field = new.to_string();
    }
}

/// True when `name` equals the default run name of any known game.
pub fn is_default_run_name(name: &str) -> bool {
    Game::ALL.iter().any(|g| g.preset().run_name == name)
}

/// Build the launch request from the current form values.
///
/// No validation beyond coercion: the collaborator is the authority on
/// rejecting a configuration.
pub fn build_run_config(form: &FormState) -> RunConfig {
    let run_name = match form.run_name.trim() {
        "" => format!("{}_run", form.game.id()),
        name => name.to_string(),
    };
    let verbose = form
        .verbose
        .trim()
        .parse::<i64>()
        .unwrap_or(DEFAULT_VERBOSE);

    let (device, params) = match form.task {
        Task::Train => {
            let preset = form.game.preset();
            let n_envs = preset
                .forced_n_envs
                .unwrap_or_else(|| parse_count(&form.n_envs));
            let (vec_env, vec_normalize) = if preset.vectorized {
                (Some(form.vec_env.clone()), Some(form.vec_normalize))
            } else {
                (None, None)
            };
            (
                form.device.clone(),
                TaskParams::Train {
                    timesteps: form
                        .timesteps
                        .trim()
                        .parse::<u64>()
                        .unwrap_or(DEFAULT_TIMESTEPS),
                    n_envs,
                    vec_env,
                    vec_normalize,
                },
            )
        }
        Task::Evaluate => (
            form.eval_device.clone(),
            TaskParams::Evaluate {
                episodes: parse_count(&form.episodes),
                eval_device: form.eval_device.clone(),
                model_path: form
                    .model
                    .as_deref()
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(|f| format!("{CHECKPOINT_DIR}/{f}")),
            },
        ),
    };

    RunConfig {
        task: form.task,
        game: form.game,
        run_name,
        device,
        verbose,
        params,
    }
}

/// Positive integer field; empty, non-numeric or zero becomes 1.
fn parse_count(raw: &str) -> u32 {
    match raw.trim().parse::<u32>() {
        Ok(0) | Err(_) => DEFAULT_COUNT,
        Ok(n) => n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(cfg: &RunConfig) -> Vec<String> {
        let v = serde_json::to_value(cfg).unwrap();
        let mut keys: Vec<String> = v.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    const TRAIN_ONLY: [&str; 4] = ["timesteps", "n_envs", "vec_env", "vec_normalize"];
    const EVAL_ONLY: [&str; 3] = ["episodes", "eval_device", "model_path"];

    #[test]
    fn only_the_matching_field_group_is_sent() {
        for game in Game::ALL {
            for task in Task::ALL {
                let mut form = FormState::for_game(game);
                form.task = task;
                form.model = Some("ckpt.zip".into());
                let keys = keys(&build_run_config(&form));
                let has_train = keys.iter().any(|k| TRAIN_ONLY.contains(&k.as_str()));
                let has_eval = keys.iter().any(|k| EVAL_ONLY.contains(&k.as_str()));
                match task {
                    Task::Train => assert!(has_train && !has_eval, "{game} {task}: {keys:?}"),
                    Task::Evaluate => assert!(has_eval && !has_train, "{game} {task}: {keys:?}"),
                }
            }
        }
    }

    #[test]
    fn train_request_for_lunarlander() {
        let mut form = FormState::for_game(Game::LunarLander);
        form.vec_env = "dummy".into();
        form.vec_normalize = true;
        form.device = "cuda".into();
        let v = serde_json::to_value(build_run_config(&form)).unwrap();
        assert_eq!(
            v,
            json!({
                "task": "train",
                "game": "lunarlander",
                "run_name": "lunarlander_ppo",
                "device": "cuda",
                "verbose": 0,
                "timesteps": 500000,
                "n_envs": 16,
                "vec_env": "dummy",
                "vec_normalize": true,
            })
        );
    }

    #[test]
    fn pong_ignores_vectorization_and_forces_one_env() {
        let mut form = FormState::for_game(Game::Pong);
        form.n_envs = "8".into();
        form.vec_normalize = true;
        let v = serde_json::to_value(build_run_config(&form)).unwrap();
        assert_eq!(v["n_envs"], json!(1));
        assert!(v.get("vec_env").is_none());
        assert!(v.get("vec_normalize").is_none());
    }

    #[test]
    fn evaluate_uses_eval_device_and_prefixes_checkpoint() {
        let mut form = FormState::for_game(Game::Pong);
        form.task = Task::Evaluate;
        form.device = "cuda".into();
        form.eval_device = "cpu".into();
        form.model = Some("pong_dqn.zip".into());
        let cfg = build_run_config(&form);
        assert_eq!(cfg.device, "cpu");
        let v = serde_json::to_value(&cfg).unwrap();
        assert_eq!(v["task"], json!("eval"));
        assert_eq!(v["eval_device"], json!("cpu"));
        assert_eq!(v["model_path"], json!("models/pong_dqn.zip"));
        assert_eq!(v["episodes"], json!(3));
    }

    #[test]
    fn model_path_is_omitted_without_selection() {
        let mut form = FormState::for_game(Game::LunarLander);
        form.task = Task::Evaluate;
        form.model = None;
        let v = serde_json::to_value(build_run_config(&form)).unwrap();
        assert!(v.get("model_path").is_none());

        form.model = Some("  ".into());
        let v = serde_json::to_value(build_run_config(&form)).unwrap();
        assert!(v.get("model_path").is_none());

        // Training never carries a checkpoint even if one is selected.
        form.task = Task::Train;
        form.model = Some("a.zip".into());
        let v = serde_json::to_value(build_run_config(&form)).unwrap();
        assert!(v.get("model_path").is_none());
    }

    #[test]
    fn numeric_fields_coerce_to_defaults() {
        let mut form = FormState::for_game(Game::LunarLander);
        form.timesteps = "".into();
        form.n_envs = "many".into();
        form.verbose = "".into();
        let cfg = build_run_config(&form);
        assert_eq!(cfg.verbose, 1);
        match cfg.params {
            TaskParams::Train {
                timesteps, n_envs, ..
            } => {
                assert_eq!(timesteps, 0);
                assert_eq!(n_envs, 1);
            }
            other => panic!("unexpected params {other:?}"),
        }

        form.task = Task::Evaluate;
        form.episodes = "0".into();
        match build_run_config(&form).params {
            TaskParams::Evaluate { episodes, .. } => assert_eq!(episodes, 1),
            other => panic!("unexpected params {other:?}"),
        }
    }

    #[test]
    fn blank_run_name_falls_back_to_game_run() {
        let mut form = FormState::for_game(Game::Pong);
        assert_eq!(build_run_config(&form).run_name, "pong_dqn");
        form.run_name = "   ".into();
        assert_eq!(build_run_config(&form).run_name, "pong_run");
        form.run_name = " mine ".into();
        assert_eq!(build_run_config(&form).run_name, "mine");
    }

    #[test]
    fn default_run_name_follows_environment() {
        let mut form = FormState::for_game(Game::LunarLander);
        form.set_game(Game::Pong);
        assert_eq!(form.run_name, "pong_dqn");
        assert_eq!(form.n_envs, "1");
        form.set_game(Game::LunarLander);
        assert_eq!(form.run_name, "lunarlander_ppo");
        assert_eq!(form.n_envs, "16");
    }

    #[test]
    fn typed_run_name_survives_environment_change() {
        let mut form = FormState::for_game(Game::LunarLander);
        form.run_name = "my_experiment".into();
        form.set_game(Game::Pong);
        assert_eq!(form.run_name, "my_experiment");
        form.set_game(Game::LunarLander);
        assert_eq!(form.run_name, "my_experiment");
    }

    #[test]
    fn typed_numbers_survive_environment_change() {
        let mut form = FormState::for_game(Game::LunarLander);
        form.timesteps = "12345".into();
        form.episodes = "9".into();
        form.n_envs = "8".into();
        form.set_game(Game::Pong);
        assert_eq!(form.timesteps, "12345");
        assert_eq!(form.episodes, "9");
        assert_eq!(form.n_envs, "8");
        // Pong still launches with its single environment.
        match build_run_config(&form).params {
            TaskParams::Train { n_envs, .. } => assert_eq!(n_envs, 1),
            other => panic!("unexpected params: {other:?}"),
        }

        form.set_game(Game::LunarLander);
        assert_eq!(form.timesteps, "12345");
        assert_eq!(form.episodes, "9");
        assert_eq!(form.n_envs, "8");
    }

    #[test]
    fn blank_numbers_take_the_new_preset() {
        let mut form = FormState::for_game(Game::LunarLander);
        form.timesteps = " ".into();
        form.set_game(Game::Pong);
        assert_eq!(form.timesteps, "1000000");
        assert_eq!(form.episodes, "3");
    }

    #[test]
    fn environment_change_clears_checkpoint() {
        let mut form = FormState::for_game(Game::LunarLander);
        form.model = Some("lunarlander_ppo.zip".into());
        form.set_game(Game::LunarLander);
        assert!(form.model.is_some());
        form.set_game(Game::Pong);
        assert!(form.model.is_none());
    }
}
