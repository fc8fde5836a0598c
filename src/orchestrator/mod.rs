//! Application-level orchestration.
//!
//! This module owns the run lifecycle (start/stop) and the periodic refresh of
//! status, logs and checkpoint listings. UI/CLI layers send commands in and
//! receive `PanelEvent`s back, so neither side touches the other's state.

mod controller;

pub(crate) use controller::{run_controller, UiCommand};
