//! Pure mappings from collaborator payloads to what the panels show.
//!
//! Every refresh builds a fresh value here and the UI replaces its previous
//! one wholesale, so styling from an earlier state never leaks into the next.

use crate::model::{RunState, StatusResponse};

/// Placeholder shown when the collaborator reports no command.
pub const NO_COMMAND: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusStyle {
    Neutral,
    Progress,
    Success,
    Error,
    /// State string did not match any known pattern.
    Unclassified,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusDisplay {
    pub state_text: String,
    pub command_text: String,
    pub style: StatusStyle,
    pub banner: Option<Banner>,
}

impl Default for StatusDisplay {
    fn default() -> Self {
        Self {
            state_text: "-".into(),
            command_text: NO_COMMAND.into(),
            style: StatusStyle::Unclassified,
            banner: None,
        }
    }
}

pub fn map_status_to_display(status: &StatusResponse) -> StatusDisplay {
    let (style, banner) = match &status.state {
        RunState::Running => (StatusStyle::Progress, None),
        RunState::Idle => (StatusStyle::Neutral, None),
        RunState::Exited { code } => {
            if status.state.is_success() {
                (
                    StatusStyle::Success,
                    Some(Banner {
                        success: true,
                        message: "Run finished successfully (exit 0)".into(),
                    }),
                )
            } else {
                (
                    StatusStyle::Error,
                    Some(Banner {
                        success: false,
                        message: format!("Run failed with exit code {code}"),
                    }),
                )
            }
        }
        RunState::Unknown(_) => (StatusStyle::Unclassified, None),
    };

    StatusDisplay {
        state_text: status.state.to_string(),
        command_text: status
            .command
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(NO_COMMAND)
            .to_string(),
        style,
        banner,
    }
}

/// Rendered log buffer. Always replaced in full.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogView {
    pub text: String,
    pub line_count: usize,
}

impl LogView {
    pub fn from_lines(lines: &[String]) -> Self {
        Self {
            text: lines.join("\n"),
            line_count: lines.len(),
        }
    }

    /// Scroll offset that puts the newest line at the bottom of the viewport.
    pub fn max_scroll(&self, viewport_height: usize) -> usize {
        self.line_count.saturating_sub(viewport_height)
    }
}

/// Checkpoint listing with a selection that survives refreshes by value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelSelector {
    files: Vec<String>,
    selected: Option<usize>,
}

impl ModelSelector {
    /// Replace the listing. The previous selection is kept if the same
    /// filename is still present, otherwise the first entry is selected.
    pub fn replace(&mut self, files: Vec<String>) {
        let previous = self.selected_file().map(str::to_owned);
        self.selected = previous
            .and_then(|prev| files.iter().position(|f| *f == prev))
            .or(if files.is_empty() { None } else { Some(0) });
        self.files = files;
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.selected = None;
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_file(&self) -> Option<&str> {
        self.selected
            .and_then(|i| self.files.get(i))
            .map(String::as_str)
    }

    /// Select `name` if it is listed. Returns whether it was found.
    pub fn select_by_name(&mut self, name: &str) -> bool {
        match self.files.iter().position(|f| f == name) {
            Some(i) => {
                self.selected = Some(i);
                true
            }
            None => false,
        }
    }

    pub fn select_next(&mut self) {
        if self.files.is_empty() {
            return;
        }
        self.selected = Some(match self.selected {
            Some(i) => (i + 1).min(self.files.len() - 1),
            None => 0,
        });
    }

    pub fn select_prev(&mut self) {
        if self.files.is_empty() {
            return;
        }
        self.selected = Some(self.selected.map(|i| i.saturating_sub(1)).unwrap_or(0));
    }
}
