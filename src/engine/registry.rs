//! Process-wide routine registry and held-input tracking.
//!
//! The registry maps routine ids to live routines and keeps derived indices
//! by name and by category so callers can cancel routines they hold no
//! reference to. One mutex guards the primary map and both indices together,
//! so every insert/remove is applied atomically and the indices can never
//! disagree with the primary map.
//!
//! The registry also tracks which inputs are currently held (updated on every
//! press/release dispatch); emergency stop drains this set to synthesize
//! releases for inputs whose owning routine never reached its own release
//! step.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::actions::InputId;
use crate::error::{Error, Result};

use super::routine::Routine;
use super::RoutineId;

#[derive(Default)]
struct Indices {
    by_id: HashMap<RoutineId, Arc<Routine>>,
    by_name: HashMap<String, HashSet<RoutineId>>,
    by_category: HashMap<String, HashSet<RoutineId>>,
}

/// Index of live routines, plus the currently-held input set.
///
/// All operations only flip cancellation flags or update maps; none of them
/// terminates a running routine's call stack directly.
#[derive(Default)]
pub struct Registry {
    inner: Mutex<Indices>,
    held: Mutex<HashSet<InputId>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a routine into the primary map and all relevant indices.
    /// Ids come from a process-wide counter, so a duplicate is a caller bug.
    pub fn register(&self, routine: Arc<Routine>) -> Result<()> {
        let mut inner = self.lock_inner();
        let id = routine.id();
        if inner.by_id.contains_key(&id) {
            return Err(Error::DuplicateId(id));
        }
        if let Some(name) = routine.name() {
            inner
                .by_name
                .entry(name.to_string())
                .or_default()
                .insert(id);
        }
        for category in routine.categories() {
            inner
                .by_category
                .entry(category.clone())
                .or_default()
                .insert(id);
        }
        debug!(target: "keyweave::registry", routine = %routine.label(), "Registered routine");
        inner.by_id.insert(id, routine);
        Ok(())
    }

    /// Remove a routine from the primary map and every index it appears in.
    /// No-op if the id is absent.
    pub fn remove(&self, id: RoutineId) {
        let mut inner = self.lock_inner();
        let Some(routine) = inner.by_id.remove(&id) else {
            return;
        };
        if let Some(name) = routine.name() {
            if let Some(ids) = inner.by_name.get_mut(name) {
                ids.remove(&id);
                if ids.is_empty() {
                    inner.by_name.remove(name);
                }
            }
        }
        for category in routine.categories() {
            if let Some(ids) = inner.by_category.get_mut(category) {
                ids.remove(&id);
                if ids.is_empty() {
                    inner.by_category.remove(category);
                }
            }
        }
        debug!(target: "keyweave::registry", routine = %routine.label(), "Unregistered routine");
    }

    /// Look up a live routine by id.
    pub fn get(&self, id: RoutineId) -> Option<Arc<Routine>> {
        self.lock_inner().by_id.get(&id).cloned()
    }

    /// Number of live (registered) routines.
    pub fn len(&self) -> usize {
        self.lock_inner().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel a specific routine. Returns false (not an error) if the id is
    /// not registered.
    pub fn cancel_by_id(&self, id: RoutineId) -> bool {
        let routine = self.lock_inner().by_id.get(&id).cloned();
        match routine {
            Some(routine) => {
                info!(target: "keyweave::registry", %id, "Cancelling routine by id");
                routine.cancel();
                true
            }
            None => {
                warn!(target: "keyweave::registry", %id, "No routine with this id to cancel");
                false
            }
        }
    }

    /// Cancel every routine with the given name. Returns the number cancelled.
    pub fn cancel_by_name(&self, name: &str) -> usize {
        let routines = self.collect(|inner| inner.by_name.get(name).cloned().unwrap_or_default());
        if routines.is_empty() {
            warn!(target: "keyweave::registry", name, "No routines with this name to cancel");
            return 0;
        }
        info!(target: "keyweave::registry", name, count = routines.len(), "Cancelling routines by name");
        for routine in &routines {
            routine.cancel();
        }
        routines.len()
    }

    /// Cancel every routine holding the given category label.
    pub fn cancel_category(&self, category: &str) -> usize {
        let routines =
            self.collect(|inner| inner.by_category.get(category).cloned().unwrap_or_default());
        if routines.is_empty() {
            warn!(target: "keyweave::registry", category, "No routines in this category to cancel");
            return 0;
        }
        info!(target: "keyweave::registry", category, count = routines.len(), "Cancelling routines by category");
        for routine in &routines {
            routine.cancel();
        }
        routines.len()
    }

    /// Cancel every routine whose category set does not intersect the
    /// protected set.
    pub fn cancel_all_except(&self, protected: &[&str]) -> usize {
        let victims: Vec<Arc<Routine>> = {
            let inner = self.lock_inner();
            inner
                .by_id
                .values()
                .filter(|r| {
                    !r.categories()
                        .iter()
                        .any(|c| protected.contains(&c.as_str()))
                })
                .cloned()
                .collect()
        };
        info!(
            target: "keyweave::registry",
            protected = ?protected,
            count = victims.len(),
            "Cancelling all routines except protected categories"
        );
        for routine in &victims {
            routine.cancel();
        }
        victims.len()
    }

    /// Cancel every registered routine.
    pub fn cancel_all(&self) -> usize {
        let routines: Vec<Arc<Routine>> = self.lock_inner().by_id.values().cloned().collect();
        for routine in &routines {
            routine.cancel();
        }
        routines.len()
    }

    /// Record that an input is now held. Called by the runner on every
    /// successful press dispatch.
    pub(crate) fn note_press(&self, input: InputId) {
        self.lock_held().insert(input);
    }

    /// Record that an input was released (or a release was attempted; the set
    /// is cleared either way so emergency stop never re-releases).
    pub(crate) fn note_release(&self, input: &InputId) {
        self.lock_held().remove(input);
    }

    /// Snapshot of the inputs currently tracked as held.
    pub fn held_inputs(&self) -> Vec<InputId> {
        self.lock_held().iter().cloned().collect()
    }

    /// Take and clear the held-input set.
    pub(crate) fn drain_held(&self) -> Vec<InputId> {
        self.lock_held().drain().collect()
    }

    fn collect<F>(&self, select: F) -> Vec<Arc<Routine>>
    where
        F: FnOnce(&Indices) -> HashSet<RoutineId>,
    {
        let inner = self.lock_inner();
        select(&inner)
            .iter()
            .filter_map(|id| inner.by_id.get(id).cloned())
            .collect()
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, Indices> {
        self.inner.lock().expect("registry lock poisoned")
    }

    fn lock_held(&self) -> std::sync::MutexGuard<'_, HashSet<InputId>> {
        self.held.lock().expect("held-input lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::Controller;
    use crate::injector::RecordingInjector;

    fn controller() -> Controller {
        Controller::new(Config::default(), Arc::new(RecordingInjector::new()))
    }

    #[test]
    fn register_and_remove_keep_indices_consistent() {
        let controller = controller();
        let registry = controller.registry().clone();

        let a = controller
            .create_routine(Some("patrol"), &["movement", "patrol"])
            .unwrap();
        let b = controller.create_routine(Some("patrol"), &["movement"]).unwrap();
        assert_eq!(registry.len(), 2);

        registry.remove(a.id());
        assert_eq!(registry.len(), 1);
        assert!(registry.get(a.id()).is_none());
        // "patrol" name index still resolves routine b.
        assert_eq!(registry.cancel_by_name("patrol"), 1);
        assert!(b.is_cancelled());

        registry.remove(b.id());
        assert!(registry.is_empty());
        // Empty index buckets are dropped, so these report nothing to cancel.
        assert_eq!(registry.cancel_by_name("patrol"), 0);
        assert_eq!(registry.cancel_category("movement"), 0);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let controller = controller();
        let registry = controller.registry().clone();
        let routine = controller.create_routine(None, &[]).unwrap();
        assert!(matches!(
            registry.register(routine.clone()),
            Err(Error::DuplicateId(_))
        ));
    }

    #[test]
    fn cancel_by_id_is_a_no_op_for_unknown_ids() {
        let controller = controller();
        let registry = controller.registry();
        assert!(!registry.cancel_by_id(RoutineId(999)));
        let routine = controller.create_routine(None, &[]).unwrap();
        assert!(registry.cancel_by_id(routine.id()));
        assert!(routine.is_cancelled());
    }

    #[test]
    fn cancel_category_leaves_other_categories_untouched() {
        let controller = controller();
        let walk = controller.create_routine(Some("walk"), &["movement"]).unwrap();
        let aim = controller.create_routine(Some("aim"), &["combat"]).unwrap();
        let scan = controller.create_routine(Some("scan"), &["scanning"]).unwrap();

        assert_eq!(controller.registry().cancel_category("movement"), 1);
        assert!(walk.is_cancelled());
        assert!(!aim.is_cancelled());
        assert!(!scan.is_cancelled());
    }

    #[test]
    fn cancel_all_except_spares_protected_categories() {
        let controller = controller();
        let walk = controller.create_routine(Some("walk"), &["movement"]).unwrap();
        let vitals = controller
            .create_routine(Some("vitals"), &["essential", "scanning"])
            .unwrap();
        let unlabeled = controller.create_routine(None, &[]).unwrap();

        assert_eq!(controller.registry().cancel_all_except(&["essential"]), 2);
        assert!(walk.is_cancelled());
        assert!(unlabeled.is_cancelled());
        assert!(!vitals.is_cancelled());
    }

    #[test]
    fn held_input_tracking() {
        let controller = controller();
        let registry = controller.registry();
        let key = InputId::Key("w".into());

        registry.note_press(key.clone());
        registry.note_press(key.clone());
        assert_eq!(registry.held_inputs(), vec![key.clone()]);

        registry.note_release(&key);
        assert!(registry.held_inputs().is_empty());

        registry.note_press(key);
        assert_eq!(registry.drain_held().len(), 1);
        assert!(registry.held_inputs().is_empty());
    }
}
