//! Cooperative execution of action groups.
//!
//! The runner drives one routine's groups in order. Sequential groups execute
//! their actions one at a time; parallel groups start every action as a tokio
//! task under a child cancellation token and join on all of them. Timed
//! suspensions race the cancellation token, so a cancel lands well inside the
//! 100ms slice bound instead of waiting for an action boundary.
//!
//! Side-effect contract: an action that already pressed something always
//! issues its matching release, even when cancelled mid-hold. Failures are
//! not rolled back (this is physical input replay); a failing parallel member
//! cancels its siblings' scope and the first error is reported.

use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::actions::{Action, ActionGroup, GroupMode, InputId};
use crate::config::Config;
use crate::error::{Error, InjectionError, Result};
use crate::injector::Injector;

use super::registry::Registry;

/// Everything an executing action needs, cloned freely into parallel tasks.
#[derive(Clone)]
pub(crate) struct RunContext {
    pub config: Arc<Config>,
    pub injector: Arc<dyn Injector>,
    pub registry: Arc<Registry>,
    pub cancel: CancellationToken,
}

/// Result of a step that can be interrupted cooperatively.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    Completed,
    Cancelled,
}

/// Execute all groups in order, honoring cancellation at every boundary.
pub(crate) async fn run_groups(ctx: &RunContext, groups: &[ActionGroup]) -> Result<StepOutcome> {
    for (idx, group) in groups.iter().enumerate() {
        if ctx.cancel.is_cancelled() {
            return Ok(StepOutcome::Cancelled);
        }
        debug!(
            target: "keyweave::engine",
            group = idx,
            mode = ?group.mode,
            actions = group.len(),
            "Executing group"
        );
        let outcome = match group.mode {
            GroupMode::Sequential => run_sequential(ctx, &group.actions).await?,
            GroupMode::Parallel => run_parallel(ctx, &group.actions).await?,
        };
        if outcome == StepOutcome::Cancelled {
            return Ok(StepOutcome::Cancelled);
        }
    }
    Ok(StepOutcome::Completed)
}

async fn run_sequential(ctx: &RunContext, actions: &[Action]) -> Result<StepOutcome> {
    for action in actions {
        if ctx.cancel.is_cancelled() {
            return Ok(StepOutcome::Cancelled);
        }
        if run_action(ctx, &ctx.cancel, action).await? == StepOutcome::Cancelled {
            return Ok(StepOutcome::Cancelled);
        }
    }
    Ok(StepOutcome::Completed)
}

async fn run_parallel(ctx: &RunContext, actions: &[Action]) -> Result<StepOutcome> {
    if ctx.cancel.is_cancelled() {
        return Ok(StepOutcome::Cancelled);
    }

    // All members run under a child token: a member failure cancels the scope
    // so siblings wind down at their next suspension point, without touching
    // the routine-level token.
    let scope = ctx.cancel.child_token();
    let mut set: JoinSet<Result<StepOutcome>> = JoinSet::new();
    for action in actions {
        let ctx = ctx.clone();
        let scope = scope.clone();
        let action = action.clone();
        set.spawn(async move { run_action(&ctx, &scope, &action).await });
    }

    let mut cancelled = false;
    let mut first_err: Option<Error> = None;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(StepOutcome::Completed)) => {}
            Ok(Ok(StepOutcome::Cancelled)) => cancelled = true,
            Ok(Err(err)) => {
                if first_err.is_none() {
                    scope.cancel();
                    first_err = Some(err);
                }
            }
            Err(join_err) => {
                if first_err.is_none() {
                    scope.cancel();
                    first_err = Some(Error::Injection(InjectionError::new(format!(
                        "action task failed: {join_err}"
                    ))));
                }
            }
        }
    }

    if let Some(err) = first_err {
        return Err(err);
    }
    if cancelled || ctx.cancel.is_cancelled() {
        Ok(StepOutcome::Cancelled)
    } else {
        Ok(StepOutcome::Completed)
    }
}

/// Execute a single action. `token` is the routine token for sequential
/// members and the group scope token for parallel members.
async fn run_action(
    ctx: &RunContext,
    token: &CancellationToken,
    action: &Action,
) -> Result<StepOutcome> {
    trace!(target: "keyweave::engine", ?action, "Executing action");
    match action {
        Action::Press { key } => {
            let input = key_input(ctx, key);
            ctx.injector.press(&input)?;
            ctx.registry.note_press(input);
            Ok(StepOutcome::Completed)
        }

        Action::Release { key } => {
            let input = key_input(ctx, key);
            let result = ctx.injector.release(&input);
            ctx.registry.note_release(&input);
            result?;
            Ok(StepOutcome::Completed)
        }

        Action::Tap { key, duration } => {
            let input = key_input(ctx, key);
            hold_and_release(ctx, token, input, *duration).await
        }

        Action::Wait { duration } => Ok(sleep_cancellable(*duration, token).await),

        Action::Turn { degrees, duration } => run_turn(ctx, token, *degrees, *duration).await,

        Action::MouseMove { dx, dy, duration } => {
            ctx.injector
                .move_rel(dx.round() as i32, dy.round() as i32)?;
            Ok(sleep_cancellable(*duration, token).await)
        }

        Action::MousePress { button } => {
            let input = InputId::Button(*button);
            ctx.injector.press(&input)?;
            ctx.registry.note_press(input);
            Ok(StepOutcome::Completed)
        }

        Action::MouseRelease { button } => {
            let input = InputId::Button(*button);
            let result = ctx.injector.release(&input);
            ctx.registry.note_release(&input);
            result?;
            Ok(StepOutcome::Completed)
        }

        Action::MouseClick { button, duration } => {
            hold_and_release(ctx, token, InputId::Button(*button), *duration).await
        }
    }
}

/// Press, hold for `duration`, release. A cancelled hold still releases: no
/// input is ever left half-pressed by its own action.
async fn hold_and_release(
    ctx: &RunContext,
    token: &CancellationToken,
    input: InputId,
    duration: f64,
) -> Result<StepOutcome> {
    ctx.injector.press(&input)?;
    ctx.registry.note_press(input.clone());
    let outcome = sleep_cancellable(duration, token).await;
    let result = ctx.injector.release(&input);
    ctx.registry.note_release(&input);
    result?;
    Ok(outcome)
}

/// Turn the camera by moving the mouse in smoothed steps. Sine-curve
/// weighting accelerates into the turn and decelerates out of it; fractional
/// pixels carry over so the total travel matches `degrees * pixels_per_degree`.
async fn run_turn(
    ctx: &RunContext,
    token: &CancellationToken,
    degrees: f64,
    duration: f64,
) -> Result<StepOutcome> {
    let mouse = &ctx.config.mouse;
    let total_pixels = degrees * mouse.pixels_per_degree;
    let steps = ((duration * f64::from(mouse.steps_per_second)).ceil() as u32).max(1);
    let step_secs = duration / f64::from(steps);

    let weights: Vec<f64> = (0..steps)
        .map(|i| ((f64::from(i) + 0.5) / f64::from(steps) * PI).sin())
        .collect();
    let weight_sum: f64 = weights.iter().sum();

    debug!(
        target: "keyweave::engine",
        degrees, duration, steps, total_pixels,
        "Turning camera"
    );

    let mut carry = 0.0;
    for weight in weights {
        if token.is_cancelled() {
            return Ok(StepOutcome::Cancelled);
        }
        let exact = total_pixels * weight / weight_sum + carry;
        let pixels = exact.round();
        carry = exact - pixels;
        if pixels != 0.0 {
            ctx.injector.move_rel(pixels as i32, 0)?;
        }
        if sleep_cancellable(step_secs, token).await == StepOutcome::Cancelled {
            return Ok(StepOutcome::Cancelled);
        }
    }
    Ok(StepOutcome::Completed)
}

/// Suspend for `seconds`, waking immediately if the token is cancelled.
async fn sleep_cancellable(seconds: f64, token: &CancellationToken) -> StepOutcome {
    if token.is_cancelled() {
        return StepOutcome::Cancelled;
    }
    if seconds <= 0.0 {
        return StepOutcome::Completed;
    }
    tokio::select! {
        () = token.cancelled() => StepOutcome::Cancelled,
        () = sleep(Duration::from_secs_f64(seconds)) => StepOutcome::Completed,
    }
}

fn key_input(ctx: &RunContext, key: &str) -> InputId {
    InputId::Key(ctx.config.resolve_key(key).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::MouseButton;
    use crate::config::Config;
    use crate::engine::{Controller, RoutineStatus};
    use crate::injector::{InjectionEvent, RecordingInjector};
    use tokio::time::Instant;

    fn controller_with_recorder() -> (Controller, Arc<RecordingInjector>) {
        let injector = Arc::new(RecordingInjector::new());
        let controller = Controller::new(Config::default(), injector.clone());
        (controller, injector)
    }

    fn press(key: &str) -> InjectionEvent {
        InjectionEvent::Press(InputId::Key(key.into()))
    }

    fn release(key: &str) -> InjectionEvent {
        InjectionEvent::Release(InputId::Key(key.into()))
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_group_takes_at_least_the_sum_of_waits() {
        let (controller, injector) = controller_with_recorder();
        let routine = controller.create_routine(Some("walk"), &[]).unwrap();
        routine
            .sequential_actions(|g| {
                g.press("forward").wait(0.2)?.wait(0.3)?.release("forward");
                Ok(())
            })
            .unwrap();

        let started = Instant::now();
        let status = routine.run().await.unwrap();
        assert_eq!(status, RoutineStatus::Completed);
        assert!(started.elapsed() >= Duration::from_millis(500));

        // Program order at the injector: press "forward" (resolved to "w")
        // strictly before its release.
        let events = injector.events();
        assert_eq!(events, vec![press("w"), release("w")]);
    }

    #[tokio::test(start_paused = true)]
    async fn parallel_group_completes_in_about_the_max_duration() {
        let (controller, _) = controller_with_recorder();
        let routine = controller.create_routine(None, &[]).unwrap();
        routine
            .parallel_actions(|g| {
                g.wait(0.1)?.wait(0.2)?.wait(0.3)?;
                Ok(())
            })
            .unwrap();

        let started = Instant::now();
        routine.run().await.unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(300));
        // Far short of the 600ms sum.
        assert!(elapsed < Duration::from_millis(450));
    }

    #[tokio::test(start_paused = true)]
    async fn patrol_scenario_orders_presses_before_releases() {
        let (controller, injector) = controller_with_recorder();
        let routine = controller
            .create_routine(Some("patrol"), &["movement"])
            .unwrap();
        routine
            .parallel_actions(|g| {
                g.press("forward").press("sprint");
                Ok(())
            })
            .unwrap();
        routine
            .sequential_actions(|g| {
                g.release("sprint").release("forward");
                Ok(())
            })
            .unwrap();

        let status = routine.run().await.unwrap();
        assert_eq!(status, RoutineStatus::Completed);

        let pressed_forward = injector.position_of(&press("w")).unwrap();
        let pressed_sprint = injector.position_of(&press("shift")).unwrap();
        let released_sprint = injector.position_of(&release("shift")).unwrap();
        let released_forward = injector.position_of(&release("w")).unwrap();

        // Both presses (any relative order) come before release(sprint),
        // which precedes release(forward).
        assert!(pressed_forward < released_sprint);
        assert!(pressed_sprint < released_sprint);
        assert!(released_sprint < released_forward);
        assert!(controller.registry().held_inputs().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_halts_within_one_timing_slice() {
        let (controller, injector) = controller_with_recorder();
        let routine = controller.create_routine(Some("walk"), &["movement"]).unwrap();
        routine
            .sequential_actions(|g| {
                g.press("forward").wait(60.0)?.release("forward");
                Ok(())
            })
            .unwrap();

        let handle = routine.clone();
        let task = tokio::spawn(async move { handle.run().await });
        tokio::time::sleep(Duration::from_millis(200)).await;

        let cancel_at = Instant::now();
        routine.cancel();
        let status = task.await.unwrap().unwrap();

        assert_eq!(status, RoutineStatus::Cancelled);
        assert!(cancel_at.elapsed() <= Duration::from_millis(100));
        // The routine never reached its own release step.
        assert_eq!(injector.events(), vec![press("w")]);
        // Terminal routines are purged from the registry.
        assert!(controller.registry().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_tap_still_releases_its_key() {
        let (controller, injector) = controller_with_recorder();
        let routine = controller.create_routine(None, &[]).unwrap();
        routine
            .sequential_actions(|g| {
                g.tap("jump", 30.0)?;
                Ok(())
            })
            .unwrap();

        let handle = routine.clone();
        let task = tokio::spawn(async move { handle.run().await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        routine.cancel();
        let status = task.await.unwrap().unwrap();

        assert_eq!(status, RoutineStatus::Cancelled);
        // The tap finished its atomic effect: press then release, no
        // half-pressed key left behind.
        assert_eq!(injector.events(), vec![press("space"), release("space")]);
        assert!(controller.registry().held_inputs().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failing_parallel_member_fails_the_routine_and_winds_down_siblings() {
        let (controller, injector) = controller_with_recorder();
        injector.fail_presses_of(InputId::Key("x".into()));

        let routine = controller.create_routine(Some("combat"), &["combat"]).unwrap();
        routine
            .parallel_actions(|g| {
                g.tap("jump", 30.0)?.press("x");
                Ok(())
            })
            .unwrap();

        let result = routine.run().await;
        assert!(matches!(result, Err(Error::Injection(_))));
        assert_eq!(routine.status(), RoutineStatus::Failed);
        assert!(controller.registry().is_empty());

        // The sibling tap observed the scope cancellation and still released.
        let events = injector.events();
        assert!(events.contains(&press("space")));
        assert!(events.contains(&release("space")));
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_failure_stops_later_actions() {
        let (controller, injector) = controller_with_recorder();
        injector.fail_presses_of(InputId::Key("x".into()));

        let routine = controller.create_routine(None, &[]).unwrap();
        routine
            .sequential_actions(|g| {
                g.press("forward").press("x").press("sprint");
                Ok(())
            })
            .unwrap();

        assert!(routine.run().await.is_err());
        assert_eq!(routine.status(), RoutineStatus::Failed);
        // "sprint" never started.
        assert_eq!(injector.events(), vec![press("w")]);
    }

    #[tokio::test(start_paused = true)]
    async fn turn_moves_the_configured_pixel_total() {
        let injector = Arc::new(RecordingInjector::new());
        let config: Config = serde_json::from_str(
            r#"{"mouse":{"pixels_per_degree":2.0,"steps_per_second":10}}"#,
        )
        .unwrap();
        let controller = Controller::new(config, injector.clone());

        let routine = controller.create_routine(None, &[]).unwrap();
        routine
            .sequential_actions(|g| {
                g.turn(90.0, 1.0)?;
                Ok(())
            })
            .unwrap();

        let started = Instant::now();
        routine.run().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(1000));

        let total: i64 = injector
            .events()
            .iter()
            .map(|e| match e {
                InjectionEvent::MoveRel { dx, .. } => i64::from(*dx),
                _ => 0,
            })
            .sum();
        // 90 degrees * 2 px/deg, fractional carry keeps the sum exact.
        assert_eq!(total, 180);
    }

    #[tokio::test(start_paused = true)]
    async fn mouse_click_presses_and_releases_the_button() {
        let (controller, injector) = controller_with_recorder();
        let routine = controller.create_routine(None, &[]).unwrap();
        routine
            .sequential_actions(|g| {
                g.mouse_press(MouseButton::Right)
                    .mouse_click(MouseButton::Left, 0.1)?
                    .mouse_release(MouseButton::Right);
                Ok(())
            })
            .unwrap();

        routine.run().await.unwrap();
        let left = InputId::Button(MouseButton::Left);
        let right = InputId::Button(MouseButton::Right);
        assert_eq!(
            injector.events(),
            vec![
                InjectionEvent::Press(right.clone()),
                InjectionEvent::Press(left.clone()),
                InjectionEvent::Release(left),
                InjectionEvent::Release(right),
            ]
        );
    }
}
