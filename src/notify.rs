//! User notifications
//!
//! Toast-style feedback seam: coordinators report progress and outcomes
//! through [`Notifier`] instead of printing directly, so the CLI, tests
//! and any embedding UI can render them their own way.

use std::io::{self, Write};
use std::sync::Mutex;

use colored::Colorize;

/// Notification sink (toast analog)
pub trait Notifier: Send + Sync {
    /// Long-running operation started ("Saving workflow...")
    fn loading(&self, message: &str);
    fn success(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);

    /// Incremental streamed output; sinks that don't render it drop it
    fn chunk(&self, _content: &str) {}
}

/// Terminal notifier used by the CLI
#[derive(Debug, Default)]
pub struct TermNotifier;

impl Notifier for TermNotifier {
    fn loading(&self, message: &str) {
        println!("{} {}", "→".cyan(), message);
    }

    fn success(&self, message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    fn warn(&self, message: &str) {
        eprintln!("{} {}", "!".yellow().bold(), message);
    }

    fn error(&self, message: &str) {
        eprintln!("{} {}", "Error:".red().bold(), message);
    }

    fn chunk(&self, content: &str) {
        print!("{}", content);
        let _ = io::stdout().flush();
    }
}

/// Notification severity, recorded for assertions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeKind {
    Loading,
    Success,
    Warn,
    Error,
    Chunk,
}

/// Records notifications for tests
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(NoticeKind, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<(NoticeKind, String)> {
        self.notices.lock().unwrap().clone()
    }

    pub fn count(&self, kind: NoticeKind) -> usize {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    fn record(&self, kind: NoticeKind, message: &str) {
        self.notices.lock().unwrap().push((kind, message.to_string()));
    }
}

impl Notifier for RecordingNotifier {
    fn loading(&self, message: &str) {
        self.record(NoticeKind::Loading, message);
    }

    fn success(&self, message: &str) {
        self.record(NoticeKind::Success, message);
    }

    fn warn(&self, message: &str) {
        self.record(NoticeKind::Warn, message);
    }

    fn error(&self, message: &str) {
        self.record(NoticeKind::Error, message);
    }

    fn chunk(&self, content: &str) {
        self.record(NoticeKind::Chunk, content);
    }
}
