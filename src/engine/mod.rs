/*!
Routine execution engine.

This module wires together:
- `routine`: the `Routine` itself, its status machine and scoped group builders
- `runner`: cooperative execution of action groups (timing, cancellation)
- `registry`: process-wide index of live routines + held-input tracking
- `controller`: the facade that creates routines and exposes bulk cancellation

Typical usage:
- Construct a `Controller` with a `Config` and an `Injector`.
- `create_routine` a handle, populate it with `sequential_actions` /
  `parallel_actions` / `add_actions`, then await `run()`.
- From anywhere else, cancel by id/name/category through the controller (or
  the registry it shares), or `emergency_stop()` to also release every input
  still held.
*/

use std::sync::Arc;

use crate::config::Config;
use crate::injector::Injector;

pub mod controller;
pub mod registry;
pub mod routine;
pub mod runner;

pub use controller::Controller;
pub use registry::Registry;
pub use routine::{GroupBuilder, Routine, RoutineHandle, RoutineStatus};

/// Unique identity of a routine, generated by the controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoutineId(pub u64);

impl std::fmt::Display for RoutineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "id={}", self.0)
    }
}

/// Process-wide engine context shared by the controller, every routine, and
/// the runner. Passed explicitly (one instance per process) instead of living
/// in a global.
pub(crate) struct EngineShared {
    pub config: Arc<Config>,
    pub injector: Arc<dyn Injector>,
    pub registry: Arc<Registry>,
}
