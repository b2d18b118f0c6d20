//! Reporting of generation failures.
//!
//! The generator never aborts a whole run for one broken artifact. It reports the failure to a
//! [`MessageSink`] and moves on to the next artifact.

use log::{error, warn};
use std::cell::RefCell;

/// Severity of a reported message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A message as reported to a sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub severity: Severity,
    pub text: String,
}

/// Destination for user-visible messages.
pub trait MessageSink {
    fn report(&self, severity: Severity, text: &str);

    fn error(&self, text: &str) {
        self.report(Severity::Error, text);
    }

    fn warning(&self, text: &str) {
        self.report(Severity::Warning, text);
    }
}

/// Forwards every message to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl MessageSink for LogSink {
    fn report(&self, severity: Severity, text: &str) {
        match severity {
            Severity::Warning => warn!("{}", text),
            Severity::Error => error!("{}", text),
        }
    }
}

/// Keeps messages in memory, in reporting order.
#[derive(Debug, Default)]
pub struct MessageLog {
    messages: RefCell<Vec<Message>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.borrow().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.messages
            .borrow()
            .iter()
            .filter(|m| m.severity == Severity::Error)
            .map(|m| m.text.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.borrow().is_empty()
    }
}

impl MessageSink for MessageLog {
    fn report(&self, severity: Severity, text: &str) {
        self.messages.borrow_mut().push(Message {
            severity,
            text: text.to_string(),
        });
    }
}
