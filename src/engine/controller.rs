//! Controller facade.
//!
//! Creates routines (registering them immediately so they are cancellable
//! from anywhere), exposes the cancel-by-selector API, and implements
//! emergency stop: cancel everything, then synthesize a release for every
//! input still tracked as held.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::injector::Injector;

use super::routine::{Routine, RoutineHandle};
use super::{EngineShared, Registry, RoutineId};

/// Facade over the engine: routine creation plus cross-cutting cancellation.
///
/// One controller per process is the intended lifecycle; it owns the shared
/// engine context (config, injector, registry), which stays alive until the
/// process exits.
pub struct Controller {
    shared: Arc<EngineShared>,
    next_id: AtomicU64,
}

impl Controller {
    pub fn new(config: Config, injector: Arc<dyn Injector>) -> Self {
        Self {
            shared: Arc::new(EngineShared {
                config: Arc::new(config),
                injector,
                registry: Arc::new(Registry::new()),
            }),
            next_id: AtomicU64::new(0),
        }
    }

    /// The process-wide registry, shareable with any task that needs to
    /// cancel routines without holding routine handles.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.shared.registry
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Create and register a new routine. The returned handle is shared with
    /// the registry; dropping it does not stop the routine from being
    /// cancellable by id/name/category.
    pub fn create_routine(
        &self,
        name: Option<&str>,
        categories: &[&str],
    ) -> Result<RoutineHandle> {
        let id = RoutineId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let routine = Arc::new(Routine::new(
            id,
            name.map(str::to_string),
            categories.iter().map(|c| (*c).to_string()).collect(),
            self.shared.clone(),
        ));
        self.shared.registry.register(routine.clone())?;
        info!(
            target: "keyweave::engine",
            routine = %routine.label(),
            categories = ?categories,
            "Created routine"
        );
        Ok(routine)
    }

    /// Cancel a specific routine by id. Returns false if the id is unknown.
    pub fn cancel_by_id(&self, id: RoutineId) -> bool {
        self.shared.registry.cancel_by_id(id)
    }

    /// Cancel all routines with the given name. Returns the number cancelled.
    pub fn cancel_by_name(&self, name: &str) -> usize {
        self.shared.registry.cancel_by_name(name)
    }

    /// Cancel all routines holding the given category label.
    pub fn cancel_category(&self, category: &str) -> usize {
        self.shared.registry.cancel_category(category)
    }

    /// Cancel every routine whose categories do not intersect `protected`.
    pub fn cancel_all_except(&self, protected: &[&str]) -> usize {
        self.shared.registry.cancel_all_except(protected)
    }

    /// Cancel every routine and release every input still tracked as held,
    /// including inputs whose owning routine never reached its own release
    /// step. Individual release failures are logged and skipped; the held set
    /// always ends empty. Returns the number of releases issued successfully.
    pub fn emergency_stop(&self) -> usize {
        warn!(target: "keyweave::engine", "EMERGENCY STOP triggered");

        let cancelled = self.shared.registry.cancel_all();
        info!(target: "keyweave::engine", cancelled, "Cancelled all routines");

        let held = self.shared.registry.drain_held();
        let mut released = 0;
        for input in held {
            match self.shared.injector.release(&input) {
                Ok(()) => {
                    debug!(target: "keyweave::engine", %input, "Released held input");
                    released += 1;
                }
                Err(err) => {
                    error!(
                        target: "keyweave::engine",
                        %input, error = %err,
                        "Failed to release held input during emergency stop; continuing"
                    );
                }
            }
        }

        info!(target: "keyweave::engine", released, "Emergency stop completed");
        released
    }
}
