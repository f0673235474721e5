//! Structured diagnostics threaded through every pipeline stage.
//!
//! A diagnostic never aborts parsing of files other than the one that
//! produced it; a fatal kind only means that file's symbol-table contribution
//! is empty or partial. The collector keeps records in emission order and is
//! sorted by (file, line, column) before reporting so multi-file merges are
//! order-insensitive.

use serde::Serialize;

use crate::ast::SourceLocation;

/// Classification of a diagnostic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// Token sequence matched no production; parser resynchronized.
    SyntaxError,
    /// Forward declaration or base class never completed.
    UnresolvedReference,
    /// Same qualified path with a divergent shape.
    DuplicateDefinition,
    /// Unterminated literal or comment at end of input.
    TruncatedInput,
    /// Nesting or token budget exceeded.
    ResourceLimitExceeded,
}

/// Severity derived from the kind, letting a CLI map exit codes without the
/// core defining them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Recoverable,
    Fatal,
}

impl DiagnosticKind {
    pub fn severity(self) -> Severity {
        match self {
            DiagnosticKind::SyntaxError => Severity::Recoverable,
            DiagnosticKind::UnresolvedReference => Severity::Warning,
            DiagnosticKind::DuplicateDefinition => Severity::Warning,
            DiagnosticKind::TruncatedInput => Severity::Fatal,
            DiagnosticKind::ResourceLimitExceeded => Severity::Fatal,
        }
    }
}

/// A related source location, e.g. the first-seen definition in a
/// duplicate-definition conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedLocation {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

/// One diagnostic record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    pub file: String,
    pub line: usize,
    pub column: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related: Option<RelatedLocation>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: String, file: &str, loc: SourceLocation) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            message,
            file: file.to_string(),
            line: loc.line,
            column: loc.column,
            related: None,
        }
    }

    pub fn with_related(mut self, file: &str, loc: SourceLocation) -> Self {
        self.related = Some(RelatedLocation {
            file: file.to_string(),
            line: loc.line,
            column: loc.column,
        });
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

/// Ordered diagnostic collector for one file.
#[derive(Debug, Default)]
pub struct Diagnostics {
    file: String,
    records: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new(file: &str) -> Self {
        Self {
            file: file.to_string(),
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, kind: DiagnosticKind, message: String, loc: SourceLocation) {
        log::debug!(
            "{}:{}:{}: {:?}: {}",
            self.file,
            loc.line,
            loc.column,
            kind,
            message
        );
        self.records
            .push(Diagnostic::new(kind, message, &self.file, loc));
    }

    pub fn push_record(&mut self, record: Diagnostic) {
        self.records.push(record);
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn has_fatal(&self) -> bool {
        self.records.iter().any(Diagnostic::is_fatal)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consume the collector, returning records sorted by file, line, and
    /// column.
    pub fn into_sorted(self) -> Vec<Diagnostic> {
        let mut records = self.records;
        sort_records(&mut records);
        records
    }
}

/// Stable diagnostic order for reporting: file, then position.
pub fn sort_records(records: &mut [Diagnostic]) {
    records.sort_by(|a, b| {
        a.file
            .cmp(&b.file)
            .then(a.line.cmp(&b.line))
            .then(a.column.cmp(&b.column))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_mapping() {
        assert_eq!(
            DiagnosticKind::SyntaxError.severity(),
            Severity::Recoverable
        );
        assert_eq!(
            DiagnosticKind::UnresolvedReference.severity(),
            Severity::Warning
        );
        assert_eq!(DiagnosticKind::TruncatedInput.severity(), Severity::Fatal);
        assert_eq!(
            DiagnosticKind::ResourceLimitExceeded.severity(),
            Severity::Fatal
        );
    }

    #[test]
    fn test_sorted_output() {
        let mut diags = Diagnostics::new("b.c");
        diags.push(
            DiagnosticKind::SyntaxError,
            "later".into(),
            SourceLocation::new(9, 1, 90),
        );
        diags.push(
            DiagnosticKind::SyntaxError,
            "earlier".into(),
            SourceLocation::new(2, 5, 20),
        );
        let sorted = diags.into_sorted();
        assert_eq!(sorted[0].message, "earlier");
        assert_eq!(sorted[1].message, "later");
    }

    #[test]
    fn test_has_fatal() {
        let mut diags = Diagnostics::new("a.c");
        diags.push(
            DiagnosticKind::UnresolvedReference,
            "warn".into(),
            SourceLocation::start(),
        );
        assert!(!diags.has_fatal());
        diags.push(
            DiagnosticKind::TruncatedInput,
            "eof".into(),
            SourceLocation::start(),
        );
        assert!(diags.has_fatal());
    }
}
