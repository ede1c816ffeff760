//! A minimal, zero-dependency logging crate for the Conduit compiler.
//!
//! Provides leveled logging with a process-global level and colored
//! terminal output. The type checker uses `debug!` for unification and
//! coercion decisions and `trace!` for per-node visitation.
//!
//! # Example
//!
//! ```
//! use conduit_log::{debug, info, Level};
//!
//! conduit_log::set_level(Level::Debug);
//! info!("checking {} declarations", 12);
//! debug!("unified bit<8> with ?T0");
//! ```

#![warn(missing_docs)]

use std::fmt::Arguments;
use std::sync::atomic::{AtomicU8, Ordering};

/// Log levels, ordered from most severe (`Error`) to least (`Trace`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Critical failures.
    Error = 0,
    /// Potentially harmful situations.
    Warn = 1,
    /// Informational messages.
    Info = 2,
    /// Diagnostic detail (unification decisions, inserted casts).
    Debug = 3,
    /// Per-node tracing.
    Trace = 4,
}

impl Level {
    /// ANSI color code for this level.
    const fn color_code(self) -> &'static str {
        match self {
            Level::Error => "\x1b[31m",
            Level::Warn => "\x1b[33m",
            Level::Info => "\x1b[32m",
            Level::Debug => "\x1b[36m",
            Level::Trace => "\x1b[35m",
        }
    }

    /// The level name as a fixed-width tag.
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }

    const fn from_u8(v: u8) -> Level {
        match v {
            0 => Level::Error,
            1 => Level::Warn,
            2 => Level::Info,
            3 => Level::Debug,
            _ => Level::Trace,
        }
    }
}

static LEVEL: AtomicU8 = AtomicU8::new(Level::Warn as u8);

/// Sets the global maximum level; messages above it are discarded.
pub fn set_level(level: Level) {
    LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Returns the current global level.
pub fn level() -> Level {
    Level::from_u8(LEVEL.load(Ordering::Relaxed))
}

/// Returns `true` if a message at `level` would be emitted.
pub fn enabled(level: Level) -> bool {
    level <= self::level()
}

#[doc(hidden)]
pub fn __log(level: Level, module: &str, args: Arguments<'_>) {
    if !enabled(level) {
        return;
    }
    eprintln!(
        "{}{:5}\x1b[0m {}: {}",
        level.color_code(),
        level.as_str(),
        module,
        args
    );
}

/// Logs at [`Level::Error`].
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::__log($crate::Level::Error, module_path!(), format_args!($($arg)*))
    };
}

/// Logs at [`Level::Warn`].
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::__log($crate::Level::Warn, module_path!(), format_args!($($arg)*))
    };
}

/// Logs at [`Level::Info`].
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::__log($crate::Level::Info, module_path!(), format_args!($($arg)*))
    };
}

/// Logs at [`Level::Debug`].
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::__log($crate::Level::Debug, module_path!(), format_args!($($arg)*))
    };
}

/// Logs at [`Level::Trace`].
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::__log($crate::Level::Trace, module_path!(), format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Error < Level::Warn);
        assert!(Level::Debug < Level::Trace);
    }

    // The level is process-global, so everything touching it lives in
    // one test.
    #[test]
    fn test_level_state_and_macros() {
        set_level(Level::Info);
        assert_eq!(level(), Level::Info);
        assert!(enabled(Level::Warn));
        assert!(!enabled(Level::Trace));

        set_level(Level::Trace);
        error!("e {}", 1);
        warn!("w");
        info!("i");
        debug!("d {:?}", vec![1, 2]);
        trace!("t");
        set_level(Level::Warn);
    }
}
