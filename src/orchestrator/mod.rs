//! Command orchestration.
//!
//! Owns the single command worker that serializes every device command, the
//! inferred power state, and deferred follow-up work such as the power-on
//! activation press. HTTP handlers only talk to [`ControllerHandle`].

mod controller;
mod scheduler;

pub use controller::{spawn_controller, ControllerHandle};
