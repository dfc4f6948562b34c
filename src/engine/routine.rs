//! Routines: named, categorized, cancellable sequences of action groups.
//!
//! A routine is created by the [`Controller`](super::Controller) (which
//! registers it immediately), populated through the scoped group builders or
//! `add_actions`, and driven to completion by `run()`. Cancellation is a
//! cooperative token trip observed by the runner at group boundaries and
//! inside timed suspensions.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::actions::{Action, ActionGroup, GroupMode, MouseButton};
use crate::error::{Error, Result};

use super::runner::{self, RunContext, StepOutcome};
use super::{EngineShared, RoutineId};

/// Shared handle to a routine. The registry keeps one while the routine is
/// live, so any holder of the controller/registry can cancel it.
pub type RoutineHandle = Arc<Routine>;

/// Lifecycle status of a routine. Exactly one terminal transition happens
/// (Cancelled, Completed or Failed), after which the status never changes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum RoutineStatus {
    Pending = 0,
    Running = 1,
    Cancelled = 2,
    Completed = 3,
    Failed = 4,
}

impl std::fmt::Display for RoutineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RoutineStatus::Pending => "pending",
            RoutineStatus::Running => "running",
            RoutineStatus::Cancelled => "cancelled",
            RoutineStatus::Completed => "completed",
            RoutineStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Atomic status cell enforcing the Pending -> Running -> terminal machine.
struct StatusCell(AtomicU8);

impl StatusCell {
    fn new() -> Self {
        Self(AtomicU8::new(RoutineStatus::Pending as u8))
    }

    fn load(&self) -> RoutineStatus {
        match self.0.load(Ordering::Acquire) {
            0 => RoutineStatus::Pending,
            1 => RoutineStatus::Running,
            2 => RoutineStatus::Cancelled,
            3 => RoutineStatus::Completed,
            _ => RoutineStatus::Failed,
        }
    }

    /// Pending -> Running. Fails if the routine already started or finished.
    fn try_start(&self) -> bool {
        self.0
            .compare_exchange(
                RoutineStatus::Pending as u8,
                RoutineStatus::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Running -> terminal. Only the task that won `try_start` calls this.
    fn finish(&self, terminal: RoutineStatus) {
        let _ = self.0.compare_exchange(
            RoutineStatus::Running as u8,
            terminal as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

/// A named, categorized sequence of action groups with its own cancellation
/// token.
pub struct Routine {
    id: RoutineId,
    name: Option<String>,
    categories: Vec<String>,
    groups: Mutex<Vec<ActionGroup>>,
    cancel: CancellationToken,
    status: StatusCell,
    shared: Arc<EngineShared>,
}

impl Routine {
    pub(crate) fn new(
        id: RoutineId,
        name: Option<String>,
        categories: Vec<String>,
        shared: Arc<EngineShared>,
    ) -> Self {
        Self {
            id,
            name,
            categories,
            groups: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
            status: StatusCell::new(),
            shared,
        }
    }

    pub fn id(&self) -> RoutineId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn status(&self) -> RoutineStatus {
        self.status.load()
    }

    /// Human-readable identifier for logs: the name if there is one, else the id.
    pub fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }

    /// Trip this routine's cancellation flag. Cooperative: the runner observes
    /// it at the next group boundary or timing slice. Safe from any task.
    pub fn cancel(&self) {
        info!(target: "keyweave::engine", routine = %self.label(), "Cancelling routine");
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Number of committed action groups.
    pub fn group_count(&self) -> usize {
        self.lock_groups().len()
    }

    /// Build and commit one sequential group. The closure receives a scoped
    /// [`GroupBuilder`]; on success the accumulated actions are committed as
    /// exactly one group, on error the partial group is discarded.
    pub fn sequential_actions<F>(&self, build: F) -> Result<&Self>
    where
        F: FnOnce(&mut GroupBuilder) -> Result<()>,
    {
        self.scoped_group(GroupMode::Sequential, build)
    }

    /// Build and commit one parallel group. See [`Self::sequential_actions`].
    pub fn parallel_actions<F>(&self, build: F) -> Result<&Self>
    where
        F: FnOnce(&mut GroupBuilder) -> Result<()>,
    {
        self.scoped_group(GroupMode::Parallel, build)
    }

    fn scoped_group<F>(&self, mode: GroupMode, build: F) -> Result<&Self>
    where
        F: FnOnce(&mut GroupBuilder) -> Result<()>,
    {
        let mut builder = GroupBuilder::new();
        build(&mut builder)?;
        let group = ActionGroup::new(builder.actions, mode)?;
        self.lock_groups().push(group);
        Ok(self)
    }

    /// Append a list of predefined actions as one group.
    pub fn add_actions(&self, actions: Vec<Action>, parallel: bool) -> Result<&Self> {
        let mode = if parallel {
            GroupMode::Parallel
        } else {
            GroupMode::Sequential
        };
        let group = ActionGroup::new(actions, mode)?;
        self.lock_groups().push(group);
        Ok(self)
    }

    /// Execute the routine's groups in order.
    ///
    /// Transitions Pending -> Running (failing with `AlreadyRunning` if the
    /// routine is not pending), then to exactly one terminal status. The
    /// registry entry is purged on exit either way.
    pub async fn run(&self) -> Result<RoutineStatus> {
        if !self.status.try_start() {
            return Err(Error::AlreadyRunning(self.id));
        }

        let groups = self.lock_groups().clone();
        info!(
            target: "keyweave::engine",
            routine = %self.label(),
            categories = ?self.categories,
            groups = groups.len(),
            "Starting routine"
        );

        let ctx = RunContext {
            config: self.shared.config.clone(),
            injector: self.shared.injector.clone(),
            registry: self.shared.registry.clone(),
            cancel: self.cancel.clone(),
        };
        let outcome = runner::run_groups(&ctx, &groups).await;

        let status = match &outcome {
            Ok(StepOutcome::Completed) => RoutineStatus::Completed,
            Ok(StepOutcome::Cancelled) => RoutineStatus::Cancelled,
            Err(_) => RoutineStatus::Failed,
        };
        self.status.finish(status);
        self.shared.registry.remove(self.id);

        match outcome {
            Ok(_) => {
                info!(
                    target: "keyweave::engine",
                    routine = %self.label(),
                    %status,
                    "Routine finished"
                );
                Ok(status)
            }
            Err(err) => {
                error!(
                    target: "keyweave::engine",
                    routine = %self.label(),
                    error = %err,
                    "Routine failed"
                );
                Err(err)
            }
        }
    }

    fn lock_groups(&self) -> std::sync::MutexGuard<'_, Vec<ActionGroup>> {
        self.groups.lock().expect("routine groups lock poisoned")
    }
}

/// Scoped accumulator for one action group. Only valid inside the closure
/// passed to `sequential_actions`/`parallel_actions`; the group is finalized
/// exactly once when the closure returns.
#[derive(Default)]
pub struct GroupBuilder {
    actions: Vec<Action>,
}

impl GroupBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Press a key and hold it.
    pub fn press(&mut self, key: impl Into<String>) -> &mut Self {
        self.actions.push(Action::press(key));
        self
    }

    /// Release a previously pressed key.
    pub fn release(&mut self, key: impl Into<String>) -> &mut Self {
        self.actions.push(Action::release(key));
        self
    }

    /// Tap a key (press, hold `duration` seconds, release).
    pub fn tap(&mut self, key: impl Into<String>, duration: f64) -> Result<&mut Self> {
        self.actions.push(Action::tap(key, duration)?);
        Ok(self)
    }

    /// Wait for `duration` seconds.
    pub fn wait(&mut self, duration: f64) -> Result<&mut Self> {
        self.actions.push(Action::wait(duration)?);
        Ok(self)
    }

    /// Turn the camera by `degrees` over `duration` seconds.
    pub fn turn(&mut self, degrees: f64, duration: f64) -> Result<&mut Self> {
        self.actions.push(Action::turn(degrees, duration)?);
        Ok(self)
    }

    /// Move the mouse by a relative amount.
    pub fn mouse_move(&mut self, dx: f64, dy: f64, duration: f64) -> Result<&mut Self> {
        self.actions.push(Action::mouse_move(dx, dy, duration)?);
        Ok(self)
    }

    /// Press a mouse button and hold it.
    pub fn mouse_press(&mut self, button: MouseButton) -> &mut Self {
        self.actions.push(Action::mouse_press(button));
        self
    }

    /// Release a previously pressed mouse button.
    pub fn mouse_release(&mut self, button: MouseButton) -> &mut Self {
        self.actions.push(Action::mouse_release(button));
        self
    }

    /// Click a mouse button (press, hold `duration` seconds, release).
    pub fn mouse_click(&mut self, button: MouseButton, duration: f64) -> Result<&mut Self> {
        self.actions.push(Action::mouse_click(button, duration)?);
        Ok(self)
    }

    /// Append an already-built action, re-validating its parameters.
    pub fn action(&mut self, action: Action) -> Result<&mut Self> {
        action.validate()?;
        self.actions.push(action);
        Ok(self)
    }

    /// Append a list of already-built actions, re-validating each.
    pub fn extend(&mut self, actions: Vec<Action>) -> Result<&mut Self> {
        for action in actions {
            self.action(action)?;
        }
        Ok(self)
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
    fn scoped_builder_commits_one_group() {
        let controller = controller();
        let routine = controller.create_routine(Some("walk"), &["movement"]).unwrap();

        routine
            .sequential_actions(|g| {
                g.press("forward").wait(3.0)?.release("forward");
                Ok(())
            })
            .unwrap();

        assert_eq!(routine.group_count(), 1);
    }

    #[test]
    fn failed_builder_scope_discards_the_partial_group() {
        let controller = controller();
        let routine = controller.create_routine(None, &[]).unwrap();

        let result = routine.sequential_actions(|g| {
            g.press("forward");
            g.wait(-1.0)?; // invalid, aborts the scope
            g.release("forward");
            Ok(())
        });

        assert!(matches!(result, Err(Error::InvalidParameter(_))));
        assert_eq!(routine.group_count(), 0);
    }

    #[test]
    fn empty_scope_is_rejected() {
        let controller = controller();
        let routine = controller.create_routine(None, &[]).unwrap();
        let result = routine.parallel_actions(|_| Ok(()));
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
        assert_eq!(routine.group_count(), 0);
    }

    #[test]
    fn add_actions_validates_members() {
        let controller = controller();
        let routine = controller.create_routine(None, &[]).unwrap();

        routine
            .add_actions(
                vec![Action::press("scan"), Action::release("scan")],
                false,
            )
            .unwrap();
        assert_eq!(routine.group_count(), 1);

        let bad = vec![Action::Wait { duration: f64::NAN }];
        assert!(routine.add_actions(bad, true).is_err());
        assert_eq!(routine.group_count(), 1);
    }

    #[test]
    fn status_starts_pending_and_cancel_flags_are_visible() {
        let controller = controller();
        let routine = controller.create_routine(Some("x"), &[]).unwrap();
        assert_eq!(routine.status(), RoutineStatus::Pending);
        assert!(!routine.is_cancelled());
        routine.cancel();
        assert!(routine.is_cancelled());
        // Cancelling only flips the flag; status moves when run() observes it.
        assert_eq!(routine.status(), RoutineStatus::Pending);
    }
}
