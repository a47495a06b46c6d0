//! Diagnostic reporting.
//!
//! Validation failures never unwind: the object becomes invalid and a
//! [`Diagnostic`] goes to the context's [`DiagnosticSink`].

use parking_lot::Mutex;
use std::fmt;

use super::object::{ObjectHeader, ObjectId, ObjectKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    FatalError,
    Error,
    Warning,
    PerformanceWarning,
    Info,
    Debug,
}

impl Severity {
    pub const fn name(self) -> &'static str {
        match self {
            Self::FatalError => "FATAL",
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::PerformanceWarning => "PERF",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: ObjectKind,
    pub subtype: String,
    pub object: ObjectId,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, header: &ObjectHeader, message: impl Into<String>) -> Self {
        Self {
            severity,
            kind: header.kind(),
            subtype: header.subtype().to_string(),
            object: header.id(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}][{}:{}#{}] {}",
            self.severity, self.kind, self.subtype, self.object, self.message
        )
    }
}

/// Receives diagnostics from commits.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: &Diagnostic);
}

/// Forwards diagnostics to `tracing` at the matching level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, d: &Diagnostic) {
        match d.severity {
            Severity::FatalError | Severity::Error => tracing::error!("{d}"),
            Severity::Warning | Severity::PerformanceWarning => tracing::warn!("{d}"),
            Severity::Info => tracing::info!("{d}"),
            Severity::Debug => tracing::debug!("{d}"),
        }
    }
}

/// Stores diagnostics in memory and forwards them to tracing.
#[derive(Debug, Default)]
pub struct CollectingSink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.entries.lock())
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries.lock().iter().filter(|d| d.severity == severity).count()
    }

    /// Any entry for `object` at `severity` whose text contains `needle`.
    pub fn has(&self, object: ObjectId, severity: Severity, needle: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|d| d.object == object && d.severity == severity && d.message.contains(needle))
    }

    pub fn for_object(&self, object: ObjectId) -> Vec<Diagnostic> {
        self.entries.lock().iter().filter(|d| d.object == object).cloned().collect()
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, d: &Diagnostic) {
        TracingSink.report(d);
        self.entries.lock().push(d.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display() {
        let h = ObjectHeader::new(ObjectId(4), ObjectKind::Geometry, "quad");
        let d = Diagnostic::new(Severity::Error, &h, "vertex count 6 is not a multiple of 4");
        assert_eq!(d.to_string(), "[ERROR][geometry:quad#4] vertex count 6 is not a multiple of 4");
    }

    #[test]
    fn test_collecting_sink() {
        let h = ObjectHeader::new(ObjectId(1), ObjectKind::Volume, "transferFunction1D");
        let sink = CollectingSink::new();
        sink.report(&Diagnostic::new(Severity::Warning, &h, "missing 'field'"));
        sink.report(&Diagnostic::new(Severity::Error, &h, "size mismatch"));
        assert_eq!(sink.count(Severity::Error), 1);
        assert!(sink.has(ObjectId(1), Severity::Warning, "field"));
        assert!(!sink.has(ObjectId(2), Severity::Warning, "field"));
        assert_eq!(sink.take().len(), 2);
        assert!(sink.entries().is_empty());
    }
}
