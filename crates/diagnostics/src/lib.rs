// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Diagnostics for the tablebench workspace
//!
//! Structured logging shared by every crate, written to stderr through
//! `emit_term`. The level comes from the `TABLEBENCH_LOG` environment
//! variable:
//! - `off` (default) - no logs
//! - `error`, `warn` - problems only
//! - `info` - run and batch lifecycle
//! - `debug` - per-flush detail, driver state transitions

use std::sync::Once;

// Re-export emit so the macros below resolve from any crate
pub use emit;

/// Environment variable consulted by [`init_diagnostics`].
pub const LOG_ENV: &str = "TABLEBENCH_LOG";

static INIT: Once = Once::new();

/// How much the process logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Off,
    Error,
    Warn,
    Info,
    Debug,
}

impl Verbosity {
    /// Parse a `TABLEBENCH_LOG` value. Case-insensitive; `None` for unknown values.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "off" | "" => Some(Verbosity::Off),
            "error" => Some(Verbosity::Error),
            "warn" => Some(Verbosity::Warn),
            "info" => Some(Verbosity::Info),
            "debug" => Some(Verbosity::Debug),
            _ => None,
        }
    }

    fn min_level(self) -> Option<emit::Level> {
        match self {
            Verbosity::Off => None,
            Verbosity::Error => Some(emit::Level::Error),
            Verbosity::Warn => Some(emit::Level::Warn),
            Verbosity::Info => Some(emit::Level::Info),
            Verbosity::Debug => Some(emit::Level::Debug),
        }
    }
}

/// Initialize diagnostics from `TABLEBENCH_LOG`.
///
/// Safe to call more than once; only the first call (of this function or
/// [`init_with`]) configures the emitter.
pub fn init_diagnostics() {
    let raw = std::env::var(LOG_ENV).unwrap_or_else(|_| "off".to_string());
    match Verbosity::parse(&raw) {
        Some(verbosity) => init_with(verbosity),
        None => {
            // Nothing is installed yet, so this can't go through emit
            eprintln!("Warning: Unknown {LOG_ENV} value '{raw}', using 'info'");
            init_with(Verbosity::Info);
        }
    }
}

/// Initialize diagnostics at an explicit verbosity, ignoring the environment.
pub fn init_with(verbosity: Verbosity) {
    INIT.call_once(|| {
        let Some(level) = verbosity.min_level() else {
            return;
        };
        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(level))
            .init();

        // The emitter lives for the rest of the process
        std::mem::forget(rt);
    });
}

/// Log basic operations: run start/finish, table creation, suite progress.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log detailed diagnostics: individual flushes, state transitions, retries.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log recoverable conditions such as absorbed conflicts.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log failures that abort a run.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

/// Re-export the init function for convenience
pub use init_diagnostics as init;
