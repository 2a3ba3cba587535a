//! Diagnostic records and ordered diagnostic sequences.
//!
//! Every problem discovered while resolving a component is reported as a
//! [`Diagnostic`]. Diagnostics are never thrown: each stage returns the
//! [`Diagnostics`] it produced alongside a possibly-degraded result, and the
//! caller decides whether enough information exists to carry on.
//!
//! # Design
//!
//! - `Severity`: warning or error
//! - `SourceRange`: file plus start/end position used for attribution
//! - `Diagnostic`: severity, short summary, long detail, optional subject
//! - `Diagnostics`: append-only sequence; order is significant for display
//!
//! # Examples
//!
//! ```
//! # use stackeval_foundation::diagnostics::*;
//! let mut diags = Diagnostics::new();
//! diags.push(Diagnostic::error(
//!     "Missing required provider configuration",
//!     "The root module requires a provider configuration named \"aws\".",
//! ));
//! assert!(diags.has_errors());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix appended to the detail of diagnostics that indicate a defect in
/// the evaluator itself rather than in the user's configuration.
pub const BUG_REPORT_SUFFIX: &str = "This is a bug in the evaluator; please report it!";

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// The configuration is valid but suspicious
    Warning,
    /// The affected step cannot succeed
    Error,
}

/// A position within a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourcePos {
    /// 1-based line number
    pub line: u32,
    /// 1-based column number
    pub column: u32,
}

impl SourcePos {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A range of source text a diagnostic is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRange {
    /// File the range belongs to, as presented to the user
    pub filename: String,
    /// Inclusive start position
    pub start: SourcePos,
    /// Exclusive end position
    pub end: SourcePos,
}

impl SourceRange {
    /// Creates a range spanning `start..end` in `filename`.
    pub fn new(filename: impl Into<String>, start: SourcePos, end: SourcePos) -> Self {
        Self {
            filename: filename.into(),
            start,
            end,
        }
    }

    /// Creates a range covering the whole of a single line.
    pub fn line(filename: impl Into<String>, line: u32) -> Self {
        Self::new(filename, SourcePos::new(line, 1), SourcePos::new(line + 1, 1))
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.end.line > self.start.line + 1 {
            write!(
                f,
                "{}:{},{}-{}",
                self.filename, self.start.line, self.start.column, self.end.line
            )
        } else {
            write!(f, "{}:{},{}", self.filename, self.start.line, self.start.column)
        }
    }
}

/// A single reported problem.
///
/// Each diagnostic has:
/// - Severity (error or warning)
/// - Summary (short, one line)
/// - Detail (long, may span several lines)
/// - Optional subject range pointing at the offending declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<SourceRange>,
}

impl Diagnostic {
    /// Creates an error diagnostic without a subject.
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::with_severity(Severity::Error, summary, detail)
    }

    /// Creates a warning diagnostic without a subject.
    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::with_severity(Severity::Warning, summary, detail)
    }

    /// Creates an error diagnostic for a defect in the evaluator.
    ///
    /// The detail gains the bug-report suffix so these are presented
    /// uniformly regardless of which stage produced them.
    pub fn internal(summary: impl Into<String>, detail: impl fmt::Display) -> Self {
        Self::error(summary, format!("{detail}\n\n{BUG_REPORT_SUFFIX}"))
    }

    fn with_severity(severity: Severity, summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity,
            summary: summary.into(),
            detail: detail.into(),
            subject: None,
        }
    }

    /// Attributes this diagnostic to a source range.
    pub fn with_subject(mut self, subject: impl Into<Option<SourceRange>>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.summary)?;
        if let Some(subject) = &self.subject {
            write!(f, "\n  on {subject}")?;
        }
        if !self.detail.is_empty() {
            write!(f, "\n\n{}", self.detail)?;
        }
        Ok(())
    }
}

/// Ordered sequence of diagnostics.
///
/// Appending preserves discovery order; nothing is ever deduplicated or
/// reordered, because display order is part of the observable contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.0.push(diag);
    }

    /// Appends every diagnostic from `other`, keeping its order.
    pub fn append(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    /// Returns true if any diagnostic has error severity.
    pub fn has_errors(&self) -> bool {
        self.0.iter().any(Diagnostic::is_error)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    /// Iterates only the error-severity diagnostics.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.is_error())
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(diag: Diagnostic) -> Self {
        Self(vec![diag])
    }
}

impl From<Vec<Diagnostic>> for Diagnostics {
    fn from(diags: Vec<Diagnostic>) -> Self {
        Self(diags)
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<T: IntoIterator<Item = Diagnostic>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<T: IntoIterator<Item = Diagnostic>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, diag) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{diag}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_errors_ignores_warnings() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::warning("Deprecated attribute", "Use the new one."));
        assert!(!diags.has_errors());

        diags.push(Diagnostic::error("Broken", "It is broken."));
        assert!(diags.has_errors());
        assert_eq!(diags.errors().count(), 1);
    }

    #[test]
    fn test_append_preserves_order() {
        let mut first = Diagnostics::from(Diagnostic::error("a", ""));
        let second: Diagnostics = vec![Diagnostic::error("b", ""), Diagnostic::warning("c", "")].into();
        first.append(second);

        let summaries: Vec<_> = first.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(summaries, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_internal_diagnostic_carries_bug_suffix() {
        let diag = Diagnostic::internal("Failed to instantiate runtime", "boom.");
        assert!(diag.is_error());
        assert!(diag.detail.starts_with("boom."));
        assert!(diag.detail.ends_with(BUG_REPORT_SUFFIX));
    }

    #[test]
    fn test_display_includes_subject() {
        let diag = Diagnostic::error("Inline provider configuration not allowed", "Move it.")
            .with_subject(SourceRange::line("module.yaml", 7));
        let rendered = diag.to_string();
        assert!(rendered.starts_with("error: Inline provider configuration not allowed"));
        assert!(rendered.contains("on module.yaml:7,1"));
    }
}
