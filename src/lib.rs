#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! Keyweave — a cooperative scheduler for timed keyboard/mouse input routines.
//!
//! Routines are named, categorized sequences of action groups (sequential or
//! parallel batches of timed key/mouse actions) executed as cooperative tokio
//! tasks. A process-wide registry indexes every live routine by id, name and
//! category, so any part of a program can cancel routines it holds no
//! reference to — including an emergency stop that also releases every input
//! still held.
//!
//! Module map:
//! - `actions`: the action model (atomic input operations, groups, patterns).
//! - `config`: key bindings and camera calibration, loader, schema helpers.
//! - `engine`: routines, the runner, the registry, and the controller facade.
//! - `injector`: the input capability trait and its enigo/recording backends.
//! - `routines`: prebuilt routine compositions.
//!
//! Use `keyweave::prelude::*` to bring commonly used items into scope quickly.

pub mod actions;
pub mod config;
pub mod engine;
pub mod error;
pub mod injector;
pub mod routines;

/// Crate-level constants for consumers that want to inspect package metadata at runtime.
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the crate version (e.g., "0.1.0").
#[inline]
pub const fn version() -> &'static str {
    PKG_VERSION
}

/// Initialize tracing (logging) with a reasonable default.
/// - Honors the `RUST_LOG` environment variable if set.
/// - Falls back to `info` level.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init_tracing() {
    use tracing::Level;
    use tracing_subscriber::fmt;

    // Parse RUST_LOG as a simple level (trace|debug|info|warn|error)
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| match s.to_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        })
        .unwrap_or(Level::INFO);

    // Ignore the error if the global subscriber was already set.
    let _ = fmt().with_max_level(level).try_init();
}

/// A convenient set of exports for most consumers.
///
/// Bring this into scope with:
/// `use keyweave::prelude::*;`
pub mod prelude {
    // Common result/error handling
    pub use anyhow::{Context, anyhow, bail, ensure};

    // Serialization
    pub use serde::{Deserialize, Serialize};

    // Tracing macros
    pub use tracing::{debug, error, info, instrument, trace, warn};

    // Timing helpers
    pub use std::time::Duration;
    pub use tokio::time::sleep;

    // Core engine surface
    pub use crate::actions::{Action, ActionGroup, GroupMode, InputId, MouseButton, patterns};
    pub use crate::config::Config;
    pub use crate::engine::{
        Controller, Registry, Routine, RoutineHandle, RoutineId, RoutineStatus,
    };
    pub use crate::error::{Error, InjectionError, Result};
    pub use crate::injector::{EnigoInjector, Injector, RecordingInjector};

    // Frequently used internal modules
    pub use crate as keyweave;
    pub use crate::{actions, config, engine, injector, routines};
}
