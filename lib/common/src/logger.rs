//! A small hierarchical logger.
//!
//! Every long-lived component (a `ContextActor`, the `ContextRegistry`, the
//! `SuggestionsIndex`, the `Dispatcher`) owns one of these. Sub-components
//! get their own [`Logger::sub`] scope so that log lines from an interleaved
//! session of several execution contexts can still be filtered down to one
//! context's activity by its path.
//!
//! Output goes through `tracing`, so the actual sink (stderr, a file, an
//! in-memory buffer in tests) is whatever subscriber the host process
//! installs; this module only shapes the hierarchy and the path prefix.

use std::fmt::Display;

/// A named point in the logger hierarchy.
///
/// Cheap to clone (it is just a path string) and cheap to create a child of.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Logger {
    path: String,
}

/// Implemented by anything that can act as a logger: both [`Logger`] itself
/// and, transitively, any component that exposes one.
pub trait AnyLogger {
    /// The dotted path identifying this logger's position in the hierarchy.
    fn path(&self) -> &str;
}

impl AnyLogger for Logger {
    fn path(&self) -> &str {
        &self.path
    }
}

impl<T: AnyLogger> AnyLogger for &T {
    fn path(&self) -> &str {
        (*self).path()
    }
}

impl Logger {
    /// Create a new root logger with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { path: name.into() }
    }

    /// Create a child logger of `parent`, nested one level deeper.
    pub fn sub(parent: &impl AnyLogger, name: impl Display) -> Self {
        let parent_path = parent.path();
        let path = if parent_path.is_empty() {
            name.to_string()
        } else {
            format!("{parent_path}.{name}")
        };
        Self { path }
    }
}

impl Display for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)
    }
}

/// Log at `trace` level, prefixed with the logger's path.
#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)*) => {
        tracing::trace!("{}: {}", $crate::logger::AnyLogger::path(&$logger), format!($($arg)*))
    };
}

/// Log at `debug` level, prefixed with the logger's path.
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)*) => {
        tracing::debug!("{}: {}", $crate::logger::AnyLogger::path(&$logger), format!($($arg)*))
    };
}

/// Log at `info` level, prefixed with the logger's path.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)*) => {
        tracing::info!("{}: {}", $crate::logger::AnyLogger::path(&$logger), format!($($arg)*))
    };
}

/// Log at `warn` level, prefixed with the logger's path.
#[macro_export]
macro_rules! warning {
    ($logger:expr, $($arg:tt)*) => {
        tracing::warn!("{}: {}", $crate::logger::AnyLogger::path(&$logger), format!($($arg)*))
    };
}

/// Log at `error` level, prefixed with the logger's path.
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)*) => {
        tracing::error!("{}: {}", $crate::logger::AnyLogger::path(&$logger), format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_logger_nests_path() {
        let root = Logger::new("runtime");
        let ctx = Logger::sub(&root, "context-1");
        let job = Logger::sub(&ctx, "job-3");
        assert_eq!(root.path(), "runtime");
        assert_eq!(ctx.path(), "runtime.context-1");
        assert_eq!(job.path(), "runtime.context-1.job-3");
    }

    #[test]
    fn sub_of_unnamed_root_has_no_leading_dot() {
        let root = Logger::default();
        let child = Logger::sub(&root, "child");
        assert_eq!(child.path(), "child");
    }
}
