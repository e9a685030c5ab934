//! Application-level orchestration utilities.
//!
//! This module owns the session lifecycle (start/stop/auto-stop, ticking) and the wiring
//! of preferences and alert channels from CLI arguments. UI/CLI layers talk to it only
//! through command and event channels.

mod controller;
mod setup;

pub(crate) use controller::{run_controller, UiCommand};
pub(crate) use setup::{build_session, inhibit_idle};
