//! Recording injector.
//!
//! Captures every injection call into an in-memory log instead of touching a
//! device. The engine's tests verify ordering and emergency-release behavior
//! against this log; downstream tooling can use it the same way.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::actions::InputId;
use crate::error::InjectionError;

use super::Injector;

/// One observed injector call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionEvent {
    Press(InputId),
    Release(InputId),
    MoveRel { dx: i32, dy: i32 },
}

/// Injector that records calls instead of performing them.
///
/// `fail_presses_of` makes `press` fail for the listed inputs, which is how
/// tests exercise the Failed path without a device.
#[derive(Debug, Default)]
pub struct RecordingInjector {
    events: Mutex<Vec<InjectionEvent>>,
    press_failures: Mutex<HashSet<InputId>>,
}

impl RecordingInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `press` of `input` fail with an injection error.
    pub fn fail_presses_of(&self, input: InputId) {
        self.press_failures
            .lock()
            .expect("recording injector lock poisoned")
            .insert(input);
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<InjectionEvent> {
        self.events
            .lock()
            .expect("recording injector lock poisoned")
            .clone()
    }

    /// Position of the first occurrence of `event`, if any.
    pub fn position_of(&self, event: &InjectionEvent) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    fn record(&self, event: InjectionEvent) {
        self.events
            .lock()
            .expect("recording injector lock poisoned")
            .push(event);
    }
}

impl Injector for RecordingInjector {
    fn press(&self, input: &InputId) -> Result<(), InjectionError> {
        let should_fail = self
            .press_failures
            .lock()
            .expect("recording injector lock poisoned")
            .contains(input);
        if should_fail {
            return Err(InjectionError::new(format!("scripted failure pressing {input}")));
        }
        self.record(InjectionEvent::Press(input.clone()));
        Ok(())
    }

    fn release(&self, input: &InputId) -> Result<(), InjectionError> {
        self.record(InjectionEvent::Release(input.clone()));
        Ok(())
    }

    fn move_rel(&self, dx: i32, dy: i32) -> Result<(), InjectionError> {
        self.record(InjectionEvent::MoveRel { dx, dy });
        Ok(())
    }
}
