use crate::display::{map_status_to_display, LogView, ModelSelector, StatusDisplay, NO_COMMAND};
use crate::form::{build_run_config, FormState};
use crate::model::{Game, PanelEvent, Task, DEVICES, VEC_BACKENDS, VERBOSITY_LEVELS};
use crate::orchestrator::UiCommand;
use crossterm::event::{KeyCode, KeyModifiers};

pub const TAB_DASHBOARD: usize = 0;
pub const TAB_HELP: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Task,
    Game,
    RunName,
    Timesteps,
    NumEnvs,
    Device,
    VecEnv,
    VecNormalize,
    Verbose,
    Episodes,
    EvalDevice,
    Checkpoint,
}

impl FormField {
    pub fn label(self) -> &'static str {
        match self {
            FormField::Task => "Task",
            FormField::Game => "Environment",
            FormField::RunName => "Run name",
            FormField::Timesteps => "Timesteps",
            FormField::NumEnvs => "Parallel envs",
            FormField::Device => "Device",
            FormField::VecEnv => "Vec backend",
            FormField::VecNormalize => "Vec normalize",
            FormField::Verbose => "Verbosity",
            FormField::Episodes => "Episodes",
            FormField::EvalDevice => "Eval device",
            FormField::Checkpoint => "Checkpoint",
        }
    }

    fn is_text(self) -> bool {
        matches!(
            self,
            FormField::RunName | FormField::Timesteps | FormField::NumEnvs | FormField::Episodes
        )
    }
}

/// Rows shown for the current form; train-only and eval-only rows swap with
/// the task, vectorization rows only appear for environments that support it.
pub fn visible_fields(form: &FormState) -> Vec<FormField> {
    let mut fields = vec![FormField::Task, FormField::Game, FormField::RunName];
    match form.task {
        Task::Train => {
            fields.push(FormField::Timesteps);
            if form.game.preset().forced_n_envs.is_none() {
                fields.push(FormField::NumEnvs);
            }
            fields.push(FormField::Device);
            if form.shows_vectorization() {
                fields.push(FormField::VecEnv);
                fields.push(FormField::VecNormalize);
            }
        }
        Task::Evaluate => {
            fields.push(FormField::Episodes);
            fields.push(FormField::EvalDevice);
            fields.push(FormField::Checkpoint);
        }
    }
    fields.push(FormField::Verbose);
    fields
}

/// What the event loop should do after a key press.
#[derive(Debug)]
pub enum KeyOutcome {
    Nothing,
    Send(UiCommand),
    Copy(String),
    Quit,
}

pub struct UiState {
    pub tab: usize,
    pub info: String,
    pub base_url: String,
    pub form: FormState,
    pub focus: FormField,
    /// Edit buffer while a text field is being typed into.
    pub editing: Option<String>,
    pub status: StatusDisplay,
    pub status_updated_at: Option<String>,
    pub logs: LogView,
    pub models: ModelSelector,
    /// Checkpoint requested on the command line, selected once it is listed.
    pub preferred_model: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tab: TAB_DASHBOARD,
            info: String::new(),
            base_url: String::new(),
            form: FormState::default(),
            focus: FormField::Task,
            editing: None,
            status: StatusDisplay::default(),
            status_updated_at: None,
            logs: LogView::default(),
            models: ModelSelector::default(),
            preferred_model: None,
        }
    }
}

fn cycle<'a>(choices: &[&'a str], current: &str, forward: bool) -> &'a str {
    let n = choices.len();
    let idx = choices.iter().position(|c| *c == current).unwrap_or(0);
    let next = if forward { (idx + 1) % n } else { (idx + n - 1) % n };
    choices[next]
}

fn now_hms() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    now.format(time::macros::format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| "now".into())
}

impl UiState {
    pub fn new(form: FormState, base_url: String) -> Self {
        let preferred_model = form.model.clone();
        Self {
            form,
            base_url,
            preferred_model,
            ..Default::default()
        }
    }

    pub fn apply_event(&mut self, ev: PanelEvent) {
        match ev {
            PanelEvent::Status(s) => {
                self.status = map_status_to_display(&s);
                self.status_updated_at = Some(now_hms());
            }
            PanelEvent::Logs(lines) => self.logs = LogView::from_lines(&lines),
            PanelEvent::Models { game, files } => self.apply_models(game, files),
            PanelEvent::PollFailed { region, error } => {
                self.info = format!("{region} refresh failed: {error}");
            }
            PanelEvent::Info(msg) => self.info = msg,
        }
    }

    fn apply_models(&mut self, game: Game, files: Vec<String>) {
        // A listing requested before an environment switch may land late.
        if game != self.form.game {
            tracing::debug!(%game, current = %self.form.game, "dropping stale checkpoint listing");
            return;
        }
        self.models.replace(files);
        if let Some(wanted) = self.preferred_model.as_deref() {
            if self.models.select_by_name(wanted) {
                self.preferred_model = None;
            }
        }
        self.form.model = self.models.selected_file().map(str::to_owned);
    }

    fn move_focus(&mut self, down: bool) {
        let fields = visible_fields(&self.form);
        let idx = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
        let next = if down {
            (idx + 1).min(fields.len() - 1)
        } else {
            idx.saturating_sub(1)
        };
        self.focus = fields[next];
    }

    /// Keep focus on a visible row after the row set changed.
    fn clamp_focus(&mut self) {
        if !visible_fields(&self.form).contains(&self.focus) {
            self.focus = FormField::Task;
        }
    }

    fn text_value(&self, field: FormField) -> String {
        match field {
            FormField::RunName => self.form.run_name.clone(),
            FormField::Timesteps => self.form.timesteps.clone(),
            FormField::NumEnvs => self.form.n_envs.clone(),
            FormField::Episodes => self.form.episodes.clone(),
            _ => String::new(),
        }
    }

    fn commit_text(&mut self, field: FormField, value: String) {
        match field {
            FormField::RunName => self.form.run_name = value,
            FormField::Timesteps => self.form.timesteps = value,
            FormField::NumEnvs => self.form.n_envs = value,
            FormField::Episodes => self.form.episodes = value,
            _ => {}
        }
    }

    /// Display value of a form row.
    pub fn field_value(&self, field: FormField) -> String {
        match field {
            FormField::Task => self.form.task.to_string(),
            FormField::Game => self.form.game.to_string(),
            FormField::Device => self.form.device.clone(),
            FormField::VecEnv => self.form.vec_env.clone(),
            FormField::VecNormalize => {
                let v = if self.form.vec_normalize { "on" } else { "off" };
                v.to_string()
            }
            FormField::Verbose => self.form.verbose.clone(),
            FormField::EvalDevice => self.form.eval_device.clone(),
            FormField::Checkpoint => self
                .models
                .selected_file()
                .unwrap_or("(none)")
                .to_string(),
            text => self.text_value(text),
        }
    }

    fn select_model(&mut self, forward: bool) {
        if forward {
            self.models.select_next();
        } else {
            self.models.select_prev();
        }
        self.preferred_model = None;
        self.form.model = self.models.selected_file().map(str::to_owned);
    }

    /// Change a choice row. Returns a command when the controller must know.
    fn change_choice(&mut self, field: FormField, forward: bool) -> Option<UiCommand> {
        match field {
            FormField::Task => {
                let task = match self.form.task {
                    Task::Train => Task::Evaluate,
                    Task::Evaluate => Task::Train,
                };
                self.form.set_task(task);
            }
            FormField::Game => {
                let all = Game::ALL;
                let idx = all.iter().position(|g| *g == self.form.game).unwrap_or(0);
                let n = all.len();
                let next = all[if forward { (idx + 1) % n } else { (idx + n - 1) % n }];
                self.form.set_game(next);
                // The listing belongs to the old environment.
                self.models.clear();
                self.clamp_focus();
                return Some(UiCommand::SetGame(next));
            }
            FormField::Device => {
                self.form.device = cycle(&DEVICES, &self.form.device, forward).to_string();
            }
            FormField::EvalDevice => {
                self.form.eval_device =
                    cycle(&DEVICES, &self.form.eval_device, forward).to_string();
            }
            FormField::VecEnv => {
                self.form.vec_env = cycle(&VEC_BACKENDS, &self.form.vec_env, forward).to_string();
            }
            FormField::VecNormalize => self.form.vec_normalize = !self.form.vec_normalize,
            FormField::Verbose => {
                self.form.verbose = cycle(&VERBOSITY_LEVELS, &self.form.verbose, forward).to_string();
            }
            FormField::Checkpoint => self.select_model(forward),
            _ => {}
        }
        self.clamp_focus();
        None
    }

    fn on_edit_key(&mut self, modifiers: KeyModifiers, code: KeyCode) {
        match code {
            KeyCode::Enter => {
                if let Some(value) = self.editing.take() {
                    self.commit_text(self.focus, value);
                }
            }
            KeyCode::Esc => self.editing = None,
            KeyCode::Backspace => {
                if let Some(buf) = self.editing.as_mut() {
                    buf.pop();
                }
            }
            KeyCode::Char(c) if !modifiers.contains(KeyModifiers::CONTROL) => {
                if let Some(buf) = self.editing.as_mut() {
                    buf.push(c);
                }
            }
            _ => {}
        }
    }

    pub fn on_key(&mut self, modifiers: KeyModifiers, code: KeyCode) -> KeyOutcome {
        if self.editing.is_some() {
            self.on_edit_key(modifiers, code);
            return KeyOutcome::Nothing;
        }

        match (modifiers, code) {
            (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                return KeyOutcome::Quit;
            }
            (_, KeyCode::Tab) => {
                self.tab = (self.tab + 1) % 2;
            }
            (_, KeyCode::Char('?')) => {
                self.tab = TAB_HELP;
            }
            (_, KeyCode::Esc) if self.tab == TAB_HELP => {
                self.tab = TAB_DASHBOARD;
            }
            _ if self.tab != TAB_DASHBOARD => {}
            (_, KeyCode::Up) | (_, KeyCode::Char('k')) => self.move_focus(false),
            (_, KeyCode::Down) | (_, KeyCode::Char('j')) => self.move_focus(true),
            (_, KeyCode::Left) | (_, KeyCode::Char('h')) => {
                if let Some(cmd) = self.change_choice(self.focus, false) {
                    return KeyOutcome::Send(cmd);
                }
            }
            (_, KeyCode::Right) | (_, KeyCode::Char('l')) => {
                if let Some(cmd) = self.change_choice(self.focus, true) {
                    return KeyOutcome::Send(cmd);
                }
            }
            (_, KeyCode::Enter) => {
                if self.focus.is_text() {
                    self.editing = Some(self.text_value(self.focus));
                } else if let Some(cmd) = self.change_choice(self.focus, true) {
                    return KeyOutcome::Send(cmd);
                }
            }
            (_, KeyCode::Char('[')) => self.select_model(false),
            (_, KeyCode::Char(']')) => self.select_model(true),
            (_, KeyCode::Char('s')) => {
                let cfg = build_run_config(&self.form);
                self.info = format!("Starting {} {} ({})…", cfg.task, cfg.game, cfg.run_name);
                return KeyOutcome::Send(UiCommand::Start(cfg));
            }
            (_, KeyCode::Char('x')) => {
                self.info = "Stop requested…".into();
                return KeyOutcome::Send(UiCommand::Stop);
            }
            (_, KeyCode::Char('y')) => {
                if self.status.command_text != NO_COMMAND {
                    return KeyOutcome::Copy(self.status.command_text.clone());
                }
                self.info = "No command to copy".into();
            }
            _ => {}
        }
        KeyOutcome::Nothing
    }
}
