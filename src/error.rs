//! Error taxonomy for keyweave.
//!
//! Construction-time errors (`InvalidParameter`) surface synchronously and never
//! register a routine. Execution-time injector failures (`Injection`) transition
//! the owning routine to `Failed` and are reported to whoever awaited `run()`.
//! Cancellation is a normal terminal status, not an error.

use crate::engine::RoutineId;

/// Engine-level errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A caller supplied an invalid parameter (negative duration, non-finite
    /// degrees, empty action group, ...). Rejected before anything executes.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// `run()` was invoked on a routine that is not pending (already running
    /// or already finished).
    #[error("routine {0} is not pending (already running or finished)")]
    AlreadyRunning(RoutineId),

    /// A routine id was already present in the registry. Ids are generated
    /// from a process-wide counter, so this indicates a caller bug.
    #[error("routine {0} is already registered")]
    DuplicateId(RoutineId),

    /// The injector collaborator failed while an action was executing.
    #[error(transparent)]
    Injection(#[from] InjectionError),
}

/// Failure reported by an [`Injector`](crate::injector::Injector)
/// implementation (device unavailable, backend error, unknown key, ...).
#[derive(Debug, thiserror::Error)]
#[error("injection failed: {0}")]
pub struct InjectionError(String);

impl InjectionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Convenient alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;
