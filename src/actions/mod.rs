/*!
Action model: the smallest schedulable units and their grouping.

An [`Action`] describes one atomic, time-bounded input operation with no
internal branching. An [`ActionGroup`] is an ordered batch of actions executed
either sequentially or in parallel. Both are plain data; execution lives in
`crate::engine::runner`.

Durations are expressed in seconds (`f64`) and degrees as `f64`, matching the
JSON surface. Use the constructors on [`Action`] to get parameter validation;
values arriving through serde are re-validated when a group is committed.
*/

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub mod patterns;

/// Default hold duration for taps and clicks, in seconds.
fn default_tap_duration() -> f64 {
    0.1
}

/// Default duration for camera turns, in seconds.
fn default_turn_duration() -> f64 {
    1.0
}

/// Mouse button enumeration.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

impl std::fmt::Display for MouseButton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MouseButton::Left => write!(f, "left"),
            MouseButton::Middle => write!(f, "middle"),
            MouseButton::Right => write!(f, "right"),
        }
    }
}

/// Identity of a holdable input: a keyboard key (by concrete name) or a mouse
/// button. This is the unit of held-input tracking and of the injector
/// press/release surface.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InputId {
    Key(String),
    Button(MouseButton),
}

impl std::fmt::Display for InputId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputId::Key(key) => write!(f, "key '{key}'"),
            InputId::Button(button) => write!(f, "mouse button '{button}'"),
        }
    }
}

/// One atomic input operation.
///
/// Key fields hold logical names (e.g. `"forward"`, `"sprint"`) that are
/// resolved through the configured key map at dispatch time; unknown names
/// pass through unchanged so concrete keys (`"w"`, `"shift"`) work directly.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Press a key and keep holding it.
    Press { key: String },

    /// Release a previously pressed key.
    Release { key: String },

    /// Press a key, hold for `duration` seconds, release it.
    Tap {
        key: String,
        #[serde(default = "default_tap_duration")]
        duration: f64,
    },

    /// Suspend for `duration` seconds.
    Wait { duration: f64 },

    /// Turn the camera by `degrees` over `duration` seconds via smoothed
    /// relative mouse movement.
    Turn {
        degrees: f64,
        #[serde(default = "default_turn_duration")]
        duration: f64,
    },

    /// Move the mouse by a relative amount, then hold for `duration` seconds.
    MouseMove {
        dx: f64,
        #[serde(default)]
        dy: f64,
        #[serde(default = "default_tap_duration")]
        duration: f64,
    },

    /// Press a mouse button and keep holding it.
    MousePress { button: MouseButton },

    /// Release a previously pressed mouse button.
    MouseRelease { button: MouseButton },

    /// Press a mouse button, hold for `duration` seconds, release it.
    MouseClick {
        button: MouseButton,
        #[serde(default = "default_tap_duration")]
        duration: f64,
    },
}

impl Action {
    /// Press a key and hold it.
    pub fn press(key: impl Into<String>) -> Self {
        Action::Press { key: key.into() }
    }

    /// Release a previously pressed key.
    pub fn release(key: impl Into<String>) -> Self {
        Action::Release { key: key.into() }
    }

    /// Tap a key (press, hold, release).
    pub fn tap(key: impl Into<String>, duration: f64) -> Result<Self> {
        validate_duration("tap duration", duration)?;
        Ok(Action::Tap {
            key: key.into(),
            duration,
        })
    }

    /// Wait for the given number of seconds.
    pub fn wait(duration: f64) -> Result<Self> {
        validate_duration("wait duration", duration)?;
        Ok(Action::Wait { duration })
    }

    /// Turn the camera by `degrees` over `duration` seconds.
    pub fn turn(degrees: f64, duration: f64) -> Result<Self> {
        if !degrees.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "turn degrees must be finite, got {degrees}"
            )));
        }
        validate_duration("turn duration", duration)?;
        Ok(Action::Turn { degrees, duration })
    }

    /// Move the mouse by a relative amount over `duration` seconds.
    pub fn mouse_move(dx: f64, dy: f64, duration: f64) -> Result<Self> {
        if !dx.is_finite() || !dy.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "mouse deltas must be finite, got dx={dx} dy={dy}"
            )));
        }
        validate_duration("mouse move duration", duration)?;
        Ok(Action::MouseMove { dx, dy, duration })
    }

    /// Press a mouse button and hold it.
    pub fn mouse_press(button: MouseButton) -> Self {
        Action::MousePress { button }
    }

    /// Release a previously pressed mouse button.
    pub fn mouse_release(button: MouseButton) -> Self {
        Action::MouseRelease { button }
    }

    /// Click a mouse button (press, hold, release).
    pub fn mouse_click(button: MouseButton, duration: f64) -> Result<Self> {
        validate_duration("click duration", duration)?;
        Ok(Action::MouseClick { button, duration })
    }

    /// Re-check parameter validity. Used for actions that bypassed the
    /// constructors (struct literals, serde) before a group is committed.
    pub fn validate(&self) -> Result<()> {
        match self {
            Action::Press { .. } | Action::Release { .. } => Ok(()),
            Action::MousePress { .. } | Action::MouseRelease { .. } => Ok(()),
            Action::Tap { duration, .. } => validate_duration("tap duration", *duration),
            Action::Wait { duration } => validate_duration("wait duration", *duration),
            Action::Turn { degrees, duration } => {
                if !degrees.is_finite() {
                    return Err(Error::InvalidParameter(format!(
                        "turn degrees must be finite, got {degrees}"
                    )));
                }
                validate_duration("turn duration", *duration)
            }
            Action::MouseMove { dx, dy, duration } => {
                if !dx.is_finite() || !dy.is_finite() {
                    return Err(Error::InvalidParameter(format!(
                        "mouse deltas must be finite, got dx={dx} dy={dy}"
                    )));
                }
                validate_duration("mouse move duration", *duration)
            }
            Action::MouseClick { duration, .. } => validate_duration("click duration", *duration),
        }
    }
}

fn validate_duration(what: &str, duration: f64) -> Result<()> {
    if !duration.is_finite() || duration < 0.0 {
        return Err(Error::InvalidParameter(format!(
            "{what} must be a finite number of seconds >= 0, got {duration}"
        )));
    }
    Ok(())
}

/// Execution mode of an [`ActionGroup`], fixed at construction.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GroupMode {
    /// Actions run one at a time, in list order.
    Sequential,
    /// All actions start together; the group joins on every member.
    Parallel,
}

/// An ordered, non-empty batch of actions executed as a unit.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ActionGroup {
    pub actions: Vec<Action>,
    pub mode: GroupMode,
}

impl ActionGroup {
    /// Build a group, validating every action and rejecting empty groups.
    pub fn new(actions: Vec<Action>, mode: GroupMode) -> Result<Self> {
        if actions.is_empty() {
            return Err(Error::InvalidParameter(
                "action group must contain at least one action".into(),
            ));
        }
        for action in &actions {
            action.validate()?;
        }
        Ok(Self { actions, mode })
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
