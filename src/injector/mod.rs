/*!
Input injection capability.

The engine never talks to a device directly; every key/mouse effect goes
through the [`Injector`] trait. Calls are synchronous and assumed cheap —
timing (holds, waits) is the runner's job, not the injector's.

Implementations:

- `enigo.rs`   -> [`EnigoInjector`]     (real input via the enigo backend,
                                         with a dry-run mode that only logs)
- `recording.rs` -> [`RecordingInjector`] (captures calls into an in-memory
                                         log; used by tests and tooling)

Adding a new injector:
1. Create `src/injector/your_injector.rs`
2. Implement a `YourInjector` struct + `impl Injector`
3. Expose with `pub use self::your_injector::YourInjector;`

Implementations must be `Send + Sync`: the engine shares one injector across
all concurrently running routines.
*/

use crate::actions::{InputId, MouseButton};
use crate::error::InjectionError;

pub mod enigo;
pub mod recording;

pub use self::enigo::EnigoInjector;
pub use recording::{InjectionEvent, RecordingInjector};

/// Capability that performs the actual key/mouse effect.
///
/// Press/release take an [`InputId`] so keyboard keys and mouse buttons share
/// one held-input vocabulary; this is what lets emergency stop synthesize
/// releases for anything left held.
pub trait Injector: Send + Sync {
    /// Press and hold an input.
    fn press(&self, input: &InputId) -> Result<(), InjectionError>;

    /// Release a previously pressed input.
    fn release(&self, input: &InputId) -> Result<(), InjectionError>;

    /// Move the mouse cursor by a relative amount.
    fn move_rel(&self, dx: i32, dy: i32) -> Result<(), InjectionError>;

    /// Click a mouse button (immediate press + release). The runner composes
    /// timed clicks from `press`/`release` itself so held-input tracking
    /// stays uniform; this is a convenience for direct callers.
    fn click(&self, button: MouseButton) -> Result<(), InjectionError> {
        let input = InputId::Button(button);
        self.press(&input)?;
        self.release(&input)
    }
}
