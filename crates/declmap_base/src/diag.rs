//! Diagnostics.
//!
//! The engine never aborts on bad input; every problem is turned into a
//! [`Diagnostic`] and handed to a [`DiagnosticSink`]. The [`Reporter`]
//! wraps a sink with running error/warning counts, which the session uses
//! to decide the exit status after a parse.
//!
//! Two sinks ship with the crate: [`StderrSink`] (the default, writes
//! `file:line:col: severity: message` lines) and [`CollectingSink`] for
//! tests that assert on emitted diagnostics.

use std::fmt;

/// How bad a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// One reported problem, with its origin already resolved to plain text.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// File (or macro) name; empty when unknown.
    pub file: String,
    /// 1-based line, or 0 when unknown.
    pub line: u32,
    /// 1-based column, or 0 when unknown.
    pub col: u32,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.file.is_empty() {
            write!(f, "{}: {}", self.severity, self.message)
        } else {
            write!(
                f,
                "{}:{}:{}: {}: {}",
                self.file, self.line, self.col, self.severity, self.message
            )
        }
    }
}

/// Receives diagnostics as they are produced.
pub trait DiagnosticSink {
    fn report(&mut self, diag: Diagnostic);
}

/// Writes each diagnostic to standard error.
#[derive(Default)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn report(&mut self, diag: Diagnostic) {
        eprintln!("{}", diag);
    }
}

/// Buffers diagnostics in memory.
#[derive(Default)]
pub struct CollectingSink {
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink for CollectingSink {
    fn report(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }
}

/// A sink plus error/warning tallies.
///
/// Everything in the engine that can complain takes `&mut Reporter`.
pub struct Reporter {
    sink: Box<dyn DiagnosticSink>,
    errors: usize,
    warnings: usize,
}

impl Reporter {
    pub fn new(sink: Box<dyn DiagnosticSink>) -> Self {
        Reporter {
            sink,
            errors: 0,
            warnings: 0,
        }
    }

    /// A reporter writing to standard error.
    pub fn stderr() -> Self {
        Reporter::new(Box::new(StderrSink))
    }

    pub fn error(
        &mut self,
        file: impl Into<String>,
        line: u32,
        col: u32,
        message: impl Into<String>,
    ) {
        self.errors += 1;
        self.sink.report(Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            file: file.into(),
            line,
            col,
        });
    }

    pub fn warning(
        &mut self,
        file: impl Into<String>,
        line: u32,
        col: u32,
        message: impl Into<String>,
    ) {
        self.warnings += 1;
        self.sink.report(Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            file: file.into(),
            line,
            col,
        });
    }

    pub fn errors(&self) -> usize {
        self.errors
    }

    pub fn warnings(&self) -> usize {
        self.warnings
    }

    /// Swap the sink, keeping the tallies.
    pub fn set_sink(&mut self, sink: Box<dyn DiagnosticSink>) {
        self.sink = sink;
    }

    /// Reset the tallies, keeping the sink.
    pub fn reset_counts(&mut self) {
        self.errors = 0;
        self.warnings = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Sink that shares its buffer so tests can inspect it after handing
    /// ownership to a Reporter.
    #[derive(Clone, Default)]
    struct SharedSink(Rc<RefCell<Vec<Diagnostic>>>);

    impl DiagnosticSink for SharedSink {
        fn report(&mut self, diag: Diagnostic) {
            self.0.borrow_mut().push(diag);
        }
    }

    #[test]
    fn reporter_counts_by_severity() {
        let mut rep = Reporter::new(Box::new(CollectingSink::default()));
        rep.error("a.cpp", 1, 1, "bad");
        rep.error("a.cpp", 2, 1, "worse");
        rep.warning("a.cpp", 3, 1, "meh");
        assert_eq!(rep.errors(), 2);
        assert_eq!(rep.warnings(), 1);
    }

    #[test]
    fn diagnostics_reach_the_sink() {
        let sink = SharedSink::default();
        let mut rep = Reporter::new(Box::new(sink.clone()));
        rep.error("x.h", 4, 7, "unterminated string literal");
        let diags = sink.0.borrow();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Error);
        assert_eq!(diags[0].file, "x.h");
        assert_eq!(diags[0].line, 4);
    }

    #[test]
    fn display_includes_position() {
        let d = Diagnostic {
            severity: Severity::Warning,
            message: "macro redefined".into(),
            file: "m.h".into(),
            line: 10,
            col: 9,
        };
        assert_eq!(d.to_string(), "m.h:10:9: warning: macro redefined");
    }

    #[test]
    fn display_without_file_omits_position() {
        let d = Diagnostic {
            severity: Severity::Error,
            message: "boom".into(),
            file: String::new(),
            line: 0,
            col: 0,
        };
        assert_eq!(d.to_string(), "error: boom");
    }

    #[test]
    fn reset_counts_keeps_sink() {
        let sink = SharedSink::default();
        let mut rep = Reporter::new(Box::new(sink.clone()));
        rep.error("", 0, 0, "one");
        rep.reset_counts();
        assert_eq!(rep.errors(), 0);
        rep.error("", 0, 0, "two");
        assert_eq!(sink.0.borrow().len(), 2);
    }
}
