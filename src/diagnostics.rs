//! Diagnostic sink passed into every component.
//!
//! Components never write to stdout or a global logger directly; they report
//! through a [`Diagnostics`] implementation chosen by the caller. The binary
//! uses [`TracingDiagnostics`]; tests use [`MemoryDiagnostics`].

use std::cell::RefCell;
use std::io::{self, BufRead, Write};

/// Severity of a recorded diagnostic line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

pub trait Diagnostics {
    fn emit(&self, level: Level, message: &str);

    /// Show `prompt` and block until the operator acknowledges it.
    fn acknowledge(&self, prompt: &str);

    fn debug(&self, message: &str) {
        self.emit(Level::Debug, message);
    }

    fn info(&self, message: &str) {
        self.emit(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.emit(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.emit(Level::Error, message);
    }
}

/// Forwards diagnostics to `tracing` and reads acknowledgments from stdin.
#[derive(Debug, Clone)]
pub struct TracingDiagnostics {
    interactive: bool,
}

impl TracingDiagnostics {
    pub fn new(interactive: bool) -> Self {
        Self { interactive }
    }
}

impl Default for TracingDiagnostics {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Diagnostics for TracingDiagnostics {
    fn emit(&self, level: Level, message: &str) {
        match level {
            Level::Debug => tracing::debug!("{message}"),
            Level::Info => tracing::info!("{message}"),
            Level::Warn => tracing::warn!("{message}"),
            Level::Error => tracing::error!("{message}"),
        }
    }

    fn acknowledge(&self, prompt: &str) {
        if !self.interactive {
            tracing::debug!("skipping acknowledgment prompt (non-interactive)");
            return;
        }

        let mut stdout = io::stdout();
        let _ = write!(stdout, "\n{prompt}");
        let _ = stdout.flush();

        let mut line = String::new();
        // EOF or a closed stdin counts as acknowledged
        let _ = io::stdin().lock().read_line(&mut line);
    }
}

/// Records every line in memory. Acknowledgments are recorded, never block.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    lines: RefCell<Vec<(Level, String)>>,
    acknowledgments: RefCell<Vec<String>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines.borrow().clone()
    }

    pub fn messages(&self, level: Level) -> Vec<String> {
        self.lines
            .borrow()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// True if any recorded line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.borrow().iter().any(|(_, m)| m.contains(needle))
    }

    pub fn acknowledgments(&self) -> Vec<String> {
        self.acknowledgments.borrow().clone()
    }
}

impl Diagnostics for MemoryDiagnostics {
    fn emit(&self, level: Level, message: &str) {
        self.lines.borrow_mut().push((level, message.to_string()));
    }

    fn acknowledge(&self, prompt: &str) {
        self.acknowledgments.borrow_mut().push(prompt.to_string());
    }
}
