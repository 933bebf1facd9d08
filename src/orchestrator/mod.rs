//! Application-level orchestration.
//!
//! This module owns the filter controller loop: it serializes directory fetches for one
//! lifecycle and forwards edits to the directory. UI/CLI layers talk to it over a command
//! channel and listen to the lifecycle's event channel.

mod controller;

pub use controller::{run_controller, ControllerCommand};
