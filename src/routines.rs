//! Prebuilt routines.
//!
//! Thin compositions over the engine: each builds a routine on the given
//! controller, populates it from the scoped builders and the pattern helpers,
//! and awaits it. `run_by_name` is the CLI entry point into this library.

use anyhow::{Result, bail};

use crate::actions::patterns;
use crate::engine::{Controller, RoutineStatus};

/// Names accepted by [`run_by_name`].
pub const AVAILABLE: &[&str] = &["patrol", "scan", "deliver", "combat"];

/// Run a prebuilt routine by name.
pub async fn run_by_name(controller: &Controller, name: &str) -> Result<RoutineStatus> {
    match name {
        "patrol" => patrol(controller).await,
        "scan" => scan_360(controller).await,
        "deliver" => deliver_cargo(controller).await,
        "combat" => combat_sequence(controller).await,
        other => bail!("unknown routine '{other}' (available: {})", AVAILABLE.join(", ")),
    }
}

/// Walk a square: forward leg, 90 degree turn, scan at each corner.
pub async fn patrol(controller: &Controller) -> Result<RoutineStatus> {
    let routine = controller.create_routine(Some("patrol_square"), &["movement", "patrol"])?;

    routine.add_actions(patterns::scan_environment(), false)?;
    for _ in 0..4 {
        routine.sequential_actions(|g| {
            g.press("forward").wait(3.0)?.release("forward");
            Ok(())
        })?;
        routine.sequential_actions(|g| {
            g.turn(90.0, 1.0)?;
            Ok(())
        })?;
        routine.add_actions(patterns::scan_environment(), false)?;
    }

    Ok(routine.run().await?)
}

/// Full 360 degree environmental scan while standing still.
pub async fn scan_360(controller: &Controller) -> Result<RoutineStatus> {
    let routine = controller.create_routine(Some("360_degree_scan"), &["scanning"])?;
    routine.add_actions(patterns::scan_environment(), false)?;
    routine.sequential_actions(|g| {
        g.turn(360.0, 4.0)?;
        Ok(())
    })?;
    Ok(routine.run().await?)
}

/// Approach a drop-off point, hold the action button, step back.
pub async fn deliver_cargo(controller: &Controller) -> Result<RoutineStatus> {
    let routine = controller.create_routine(Some("deliver_cargo"), &["interaction"])?;

    routine.sequential_actions(|g| {
        g.press("forward").wait(2.0)?.release("forward");
        Ok(())
    })?;
    routine.sequential_actions(|g| {
        g.press("action").wait(1.0)?.release("action");
        Ok(())
    })?;
    routine.sequential_actions(|g| {
        g.wait(2.0)?;
        Ok(())
    })?;
    routine.add_actions(patterns::backstep(1.0)?, false)?;

    Ok(routine.run().await?)
}

/// Crouch, aim and fire, reposition under sprint, fire again.
pub async fn combat_sequence(controller: &Controller) -> Result<RoutineStatus> {
    let routine = controller.create_routine(Some("combat_sequence"), &["combat"])?;

    routine.sequential_actions(|g| {
        g.press("crouch").wait(0.5)?;
        Ok(())
    })?;
    routine.add_actions(patterns::aim_and_fire(3, 0.3)?, false)?;
    routine.sequential_actions(|g| {
        g.release("crouch")
            .press("right")
            .press("sprint")
            .wait(1.0)?
            .release("sprint")
            .release("right")
            .press("crouch");
        Ok(())
    })?;
    routine.add_actions(patterns::aim_and_fire(2, 0.3)?, false)?;
    routine.sequential_actions(|g| {
        g.release("crouch");
        Ok(())
    })?;

    Ok(routine.run().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::injector::{InjectionEvent, RecordingInjector};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn deliver_cargo_runs_to_completion_with_no_held_inputs() {
        let injector = Arc::new(RecordingInjector::new());
        let controller = Controller::new(Config::default(), injector.clone());

        let status = deliver_cargo(&controller).await.unwrap();
        assert_eq!(status, RoutineStatus::Completed);
        assert!(controller.registry().is_empty());
        assert!(controller.registry().held_inputs().is_empty());

        // Every press has a matching release.
        let presses = injector
            .events()
            .iter()
            .filter(|e| matches!(e, InjectionEvent::Press(_)))
            .count();
        let releases = injector
            .events()
            .iter()
            .filter(|e| matches!(e, InjectionEvent::Release(_)))
            .count();
        assert_eq!(presses, releases);
    }

    #[tokio::test(start_paused = true)]
    async fn run_by_name_rejects_unknown_routines() {
        let controller = Controller::new(
            Config::default(),
            Arc::new(RecordingInjector::new()),
        );
        assert!(run_by_name(&controller, "nope").await.is_err());
    }
}
