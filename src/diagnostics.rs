//! Leveled diagnostic sink.
//!
//! Components never log through global state directly: they receive a
//! [`Diagnostics`] implementation so embedding callers and tests can capture
//! warnings (fake EPUB directories, skipped files) and debug notes (chapters
//! that failed to load). [`LogDiagnostics`] forwards to the `log` facade.

use std::fmt;
use std::sync::Mutex;

use log::Level;

/// Target used for every record emitted by [`LogDiagnostics`].
pub const LOG_TARGET: &str = "epub_wordcount";

/// A sink for messages that never affect control flow.
pub trait Diagnostics: Send + Sync + fmt::Debug {
    fn log(&self, level: Level, message: &str);

    fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }
}

/// Forwards every message to the `log` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn log(&self, level: Level, message: &str) {
        log::log!(target: LOG_TARGET, level, "{}", message);
    }
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    entries: Mutex<Vec<(Level, String)>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured messages, oldest first.
    pub fn entries(&self) -> Vec<(Level, String)> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Captured messages at exactly `level`.
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, message)| message)
            .collect()
    }
}

impl Diagnostics for MemoryDiagnostics {
    fn log(&self, level: Level, message: &str) {
        // A poisoned lock only means another writer panicked; keep the message anyway.
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.push((level, message.to_string()));
    }
}
