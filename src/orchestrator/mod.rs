//! Application-level orchestration.
//!
//! Owns the compilation lifecycle so UI layers only send commands and render
//! the events that come back.

mod controller;

pub(crate) use controller::{run_controller, UiCommand};
