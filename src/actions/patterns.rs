//! Prebuilt action lists for common game maneuvers.
//!
//! Each helper returns a ready-to-commit `Vec<Action>` using logical key names
//! ("forward", "sprint", ...) that resolve through the configured key map.
//! Feed them to `Routine::add_actions` or mix them with the scoped builders.

use crate::actions::{Action, MouseButton};
use crate::error::Result;

/// Sprint forward for the given number of seconds.
pub fn sprint_forward(duration: f64) -> Result<Vec<Action>> {
    Ok(vec![
        Action::press("forward"),
        Action::press("sprint"),
        Action::wait(duration)?,
        Action::release("sprint"),
        Action::release("forward"),
    ])
}

/// Fire the environment scanner once.
pub fn scan_environment() -> Vec<Action> {
    vec![Action::press("scan"), Action::release("scan")]
}

/// Strafe left for the given number of seconds.
pub fn strafe_left(duration: f64) -> Result<Vec<Action>> {
    Ok(vec![
        Action::press("left"),
        Action::wait(duration)?,
        Action::release("left"),
    ])
}

/// Strafe right for the given number of seconds.
pub fn strafe_right(duration: f64) -> Result<Vec<Action>> {
    Ok(vec![
        Action::press("right"),
        Action::wait(duration)?,
        Action::release("right"),
    ])
}

/// Step backward for the given number of seconds.
pub fn backstep(duration: f64) -> Result<Vec<Action>> {
    Ok(vec![
        Action::press("backward"),
        Action::wait(duration)?,
        Action::release("backward"),
    ])
}

/// Aim down sights and fire `shots` shots, `delay` seconds apart.
pub fn aim_and_fire(shots: u32, delay: f64) -> Result<Vec<Action>> {
    let mut actions = vec![Action::mouse_press(MouseButton::Right)];
    for i in 0..shots {
        actions.push(Action::mouse_click(MouseButton::Left, 0.1)?);
        if i + 1 < shots {
            actions.push(Action::wait(delay)?);
        }
    }
    actions.push(Action::mouse_release(MouseButton::Right));
    Ok(actions)
}

/// Toggle crouch.
pub fn crouch_toggle() -> Result<Vec<Action>> {
    Ok(vec![Action::tap("crouch", 0.1)?])
}

/// Perform a jump.
pub fn jump() -> Result<Vec<Action>> {
    Ok(vec![Action::tap("jump", 0.1)?])
}

/// Reload the current weapon.
pub fn reload() -> Result<Vec<Action>> {
    Ok(vec![Action::tap("reload", 0.1)?])
}

/// Interact with the object in front of the player (long press).
pub fn interact() -> Result<Vec<Action>> {
    Ok(vec![Action::tap("action", 0.5)?])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sprint_forward_presses_before_waiting_and_releases_in_reverse() {
        let actions = sprint_forward(2.0).unwrap();
        assert_eq!(
            actions,
            vec![
                Action::press("forward"),
                Action::press("sprint"),
                Action::Wait { duration: 2.0 },
                Action::release("sprint"),
                Action::release("forward"),
            ]
        );
    }

    #[test]
    fn aim_and_fire_counts_clicks_and_delays() {
        let actions = aim_and_fire(3, 0.3).unwrap();
        // aim press + 3 clicks + 2 inter-shot delays + aim release
        assert_eq!(actions.len(), 7);
        assert_eq!(actions[0], Action::mouse_press(MouseButton::Right));
        assert_eq!(
            actions.last().unwrap(),
            &Action::mouse_release(MouseButton::Right)
        );
        let clicks = actions
            .iter()
            .filter(|a| matches!(a, Action::MouseClick { .. }))
            .count();
        assert_eq!(clicks, 3);
        let delays = actions
            .iter()
            .filter(|a| matches!(a, Action::Wait { .. }))
            .count();
        assert_eq!(delays, 2);

        // A single shot has no inter-shot delay.
        assert_eq!(aim_and_fire(1, 0.3).unwrap().len(), 3);
    }

    #[test]
    fn quick_taps_use_expected_keys() {
        assert_eq!(
            jump().unwrap(),
            vec![Action::Tap {
                key: "jump".into(),
                duration: 0.1
            }]
        );
        assert_eq!(
            interact().unwrap(),
            vec![Action::Tap {
                key: "action".into(),
                duration: 0.5
            }]
        );
        assert_eq!(scan_environment().len(), 2);
    }

    #[test]
    fn movement_helpers_reject_bad_durations() {
        assert!(strafe_left(-1.0).is_err());
        assert!(backstep(f64::NAN).is_err());
    }
}
