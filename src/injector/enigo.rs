//! Enigo-backed injector.
//!
//! A dedicated worker thread owns the `Enigo` handle (created lazily on the
//! first real command) and callers talk to it over a rendezvous channel, so
//! the injector is `Send + Sync` and can be shared across every running
//! routine. In dry-run mode commands are only logged and Enigo is never
//! initialized.

use anyhow::{Context as _, Result as AnyResult};
use enigo::Keyboard as _;
use enigo::Mouse as _;
use enigo::{Button as EButton, Coordinate, Direction, Enigo, Key, Settings};
use std::sync::mpsc::{Receiver, Sender, SyncSender, channel, sync_channel};
use tracing::{info, trace, warn};

use crate::actions::{InputId, MouseButton};
use crate::error::InjectionError;

use super::Injector;

/// Real input injector. Construct with [`EnigoInjector::spawn`].
pub struct EnigoInjector {
    tx: Sender<Command>,
}

struct Command {
    op: Op,
    reply: SyncSender<Result<(), InjectionError>>,
}

enum Op {
    Press(InputId),
    Release(InputId),
    MoveRel { dx: i32, dy: i32 },
}

impl EnigoInjector {
    /// Start the input worker thread.
    /// - `dry_run`: when true, commands are logged instead of injected.
    pub fn spawn(dry_run: bool) -> AnyResult<Self> {
        let (tx, rx) = channel::<Command>();
        std::thread::Builder::new()
            .name("keyweave-input".into())
            .spawn(move || worker_loop(rx, dry_run))
            .context("Failed to spawn input worker thread")?;
        Ok(Self { tx })
    }

    fn dispatch(&self, op: Op) -> Result<(), InjectionError> {
        let (reply_tx, reply_rx) = sync_channel(0);
        self.tx
            .send(Command { op, reply: reply_tx })
            .map_err(|_| InjectionError::new("input worker thread is gone"))?;
        reply_rx
            .recv()
            .map_err(|_| InjectionError::new("input worker dropped the reply channel"))?
    }
}

impl Injector for EnigoInjector {
    fn press(&self, input: &InputId) -> Result<(), InjectionError> {
        self.dispatch(Op::Press(input.clone()))
    }

    fn release(&self, input: &InputId) -> Result<(), InjectionError> {
        self.dispatch(Op::Release(input.clone()))
    }

    fn move_rel(&self, dx: i32, dy: i32) -> Result<(), InjectionError> {
        self.dispatch(Op::MoveRel { dx, dy })
    }
}

fn worker_loop(rx: Receiver<Command>, dry_run: bool) {
    let mut enigo: Option<Enigo> = None;
    info!(target: "keyweave::injector", dry_run, "Input worker started");

    while let Ok(Command { op, reply }) = rx.recv() {
        let result = if dry_run {
            log_dry_run(&op);
            Ok(())
        } else {
            match ensure_enigo(&mut enigo) {
                Ok(enigo) => apply(enigo, &op),
                Err(err) => Err(err),
            }
        };
        // A dropped reply receiver means the caller gave up; keep serving.
        let _ = reply.send(result);
    }

    info!(target: "keyweave::injector", "Input worker exiting (channel closed)");
}

fn ensure_enigo(slot: &mut Option<Enigo>) -> Result<&mut Enigo, InjectionError> {
    if slot.is_none() {
        trace!(target: "keyweave::injector", "Initializing Enigo");
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| InjectionError::new(format!("failed to initialize Enigo: {e}")))?;
        *slot = Some(enigo);
    }
    Ok(slot.as_mut().expect("Enigo must be initialized"))
}

fn apply(enigo: &mut Enigo, op: &Op) -> Result<(), InjectionError> {
    match op {
        Op::Press(InputId::Key(key)) => {
            trace!(target: "keyweave::injector", %key, "key press");
            let key = map_key(key)?;
            enigo
                .key(key, Direction::Press)
                .map_err(|e| InjectionError::new(format!("key press failed: {e}")))
        }
        Op::Release(InputId::Key(key)) => {
            trace!(target: "keyweave::injector", %key, "key release");
            let key = map_key(key)?;
            enigo
                .key(key, Direction::Release)
                .map_err(|e| InjectionError::new(format!("key release failed: {e}")))
        }
        Op::Press(InputId::Button(button)) => {
            trace!(target: "keyweave::injector", %button, "button press");
            enigo
                .button(map_mouse_button(*button), Direction::Press)
                .map_err(|e| InjectionError::new(format!("button press failed: {e}")))
        }
        Op::Release(InputId::Button(button)) => {
            trace!(target: "keyweave::injector", %button, "button release");
            enigo
                .button(map_mouse_button(*button), Direction::Release)
                .map_err(|e| InjectionError::new(format!("button release failed: {e}")))
        }
        Op::MoveRel { dx, dy } => {
            trace!(target: "keyweave::injector", dx, dy, "mouse move");
            enigo
                .move_mouse(*dx, *dy, Coordinate::Rel)
                .map_err(|e| InjectionError::new(format!("mouse move failed: {e}")))
        }
    }
}

fn log_dry_run(op: &Op) {
    match op {
        Op::Press(input) => info!(target: "keyweave::injector", %input, "DRY-RUN press"),
        Op::Release(input) => info!(target: "keyweave::injector", %input, "DRY-RUN release"),
        Op::MoveRel { dx, dy } => {
            info!(target: "keyweave::injector", dx, dy, "DRY-RUN mouse move");
        }
    }
}

fn map_mouse_button(btn: MouseButton) -> EButton {
    match btn {
        MouseButton::Left => EButton::Left,
        MouseButton::Middle => EButton::Middle,
        MouseButton::Right => EButton::Right,
    }
}

/// Map a concrete key name to an enigo key. Named keys cover the bindings in
/// the default key map; any single character falls back to `Key::Unicode`.
fn map_key(name: &str) -> Result<Key, InjectionError> {
    let key = match name.to_ascii_lowercase().as_str() {
        "shift" => Key::Shift,
        "ctrl" | "control" => Key::Control,
        "alt" => Key::Alt,
        "meta" | "super" | "win" => Key::Meta,
        "space" => Key::Space,
        "tab" => Key::Tab,
        "escape" | "esc" => Key::Escape,
        "enter" | "return" => Key::Return,
        "backspace" => Key::Backspace,
        "delete" => Key::Delete,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left_arrow" => Key::LeftArrow,
        "right_arrow" => Key::RightArrow,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::Unicode(c),
                _ => {
                    warn!(target: "keyweave::injector", key = %name, "unknown key name");
                    return Err(InjectionError::new(format!("unknown key name '{name}'")));
                }
            }
        }
    };
    Ok(key)
}
