//! Reporting sink passed explicitly into every pipeline stage.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;

/// Severity of a sink event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    Info,
    Warn,
}

/// Receives audit messages from the analysis stages.
///
/// Stages never reach for a global logger; callers choose where the
/// audit trail goes by handing in a sink.
pub trait ReportSink {
    fn record(&self, level: Level, stage: &str, message: &str);

    fn info(&self, stage: &str, message: &str) {
        self.record(Level::Info, stage, message);
    }

    fn warn(&self, stage: &str, message: &str) {
        self.record(Level::Warn, stage, message);
    }
}

/// Forwards events to `tracing` with a `stage` field.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn record(&self, level: Level, stage: &str, message: &str) {
        match level {
            Level::Info => tracing::info!(stage, "{message}"),
            Level::Warn => tracing::warn!(stage, "{message}"),
        }
    }
}

/// A single recorded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkEvent {
    pub level: Level,
    pub stage: String,
    pub message: String,
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: RefCell<Vec<SinkEvent>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.borrow().clone()
    }

    /// Warning events only.
    #[must_use]
    pub fn warnings(&self) -> Vec<SinkEvent> {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.level == Level::Warn)
            .cloned()
            .collect()
    }
}

impl ReportSink for MemorySink {
    fn record(&self, level: Level, stage: &str, message: &str) {
        self.events.borrow_mut().push(SinkEvent {
            level,
            stage: stage.to_string(),
            message: message.to_string(),
        });
    }
}

/// Sends every event to two sinks.
pub struct Tee<'a, A: ReportSink + ?Sized, B: ReportSink + ?Sized> {
    pub first: &'a A,
    pub second: &'a B,
}

impl<A: ReportSink + ?Sized, B: ReportSink + ?Sized> ReportSink for Tee<'_, A, B> {
    fn record(&self, level: Level, stage: &str, message: &str) {
        self.first.record(level, stage, message);
        self.second.record(level, stage, message);
    }
}
