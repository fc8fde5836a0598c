//! Text summary builder for CLI output.
//!
//! Formats a status snapshot, optionally with checkpoints and the log tail,
//! into human-readable lines for text mode.

use crate::display::map_status_to_display;
use crate::model::{Game, StatusResponse};

pub(crate) const DEFAULT_LOG_TAIL: usize = 20;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

pub(crate) fn build_text_summary(
    status: &StatusResponse,
    game: Game,
    models: Option<&[String]>,
    logs: &[String],
    log_tail: usize,
) -> TextSummary {
    let display = map_status_to_display(status);
    let mut lines = vec![
        format!("State: {}", display.state_text),
        format!("Command: {}", display.command_text),
    ];
    if let Some(banner) = display.banner.as_ref() {
        lines.push(banner.message.clone());
    }

    if let Some(files) = models {
        if files.is_empty() {
            lines.push(format!("Checkpoints ({game}): none"));
        } else {
            lines.push(format!("Checkpoints ({game}):"));
            lines.extend(files.iter().map(|f| format!("  {f}")));
        }
    }

    if !logs.is_empty() {
        let tail = &logs[logs.len().saturating_sub(log_tail)..];
        lines.push(format!("Logs (last {} of {}):", tail.len(), logs.len()));
        lines.extend(tail.iter().map(|l| format!("  {l}")));
    }

    TextSummary { lines }
}
