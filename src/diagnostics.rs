//! Structured diagnostics with stable, machine-readable error kinds.
//!
//! Every user-visible type error maps 1:1 to a single [`Diagnostic`] with a
//! stable kind tag (e.g. `assignment.type.incompatible`). The tags are part
//! of the public contract: expected-output tests compare them literally.
//!
//! Framework-internal failures are reported with the [`kind::INTERNAL`]
//! tag and [`Severity::Internal`] so tooling can distinguish a bug in the
//! checker from a defect in the analyzed code.

use serde::{Deserialize, Serialize};

/// Stable diagnostic kind tags.
pub mod kind {
    /// A possibly-null receiver was dereferenced.
    pub const DEREFERENCE_OF_NULLABLE: &str = "dereference.of.nullable";
    /// Assigned value is not a subtype of the declared target type.
    pub const ASSIGNMENT_TYPE_INCOMPATIBLE: &str = "assignment.type.incompatible";
    /// Call argument is not a subtype of the declared parameter type.
    pub const ARGUMENT_TYPE_INCOMPATIBLE: &str = "argument.type.incompatible";
    /// Returned value is not a subtype of the declared return type.
    pub const RETURN_TYPE_INCOMPATIBLE: &str = "return.type.incompatible";
    /// Type argument violates the declared type-parameter bound.
    pub const TYPE_ARGUMENT_TYPE_INCOMPATIBLE: &str = "type.argument.type.incompatible";
    /// Capture-converted wildcard bound carries a mismatched qualifier.
    pub const BOUND_TYPE_INCOMPATIBLE: &str = "bound.type.incompatible";
    /// Framework bug: analysis of the compilation unit was aborted.
    pub const INTERNAL: &str = "internal.error";
}

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Type error in the analyzed code. Checking continues past it.
    Error,
    /// Framework bug. Analysis of the enclosing unit was aborted.
    Internal,
}

/// A single diagnostic produced by a checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable machine-readable kind tag (see [`kind`]).
    pub kind: String,
    /// Human-readable message, including the conflicting types.
    pub message: String,
    /// Enclosing function name.
    pub function: String,
    /// Source line (1-indexed).
    pub line: usize,
    /// Severity class.
    pub severity: Severity,
}

impl Diagnostic {
    /// Create a user-code error diagnostic.
    #[must_use]
    pub fn error(kind: &str, message: impl Into<String>, function: &str, line: usize) -> Self {
        Self {
            kind: kind.to_string(),
            message: message.into(),
            function: function.to_string(),
            line,
            severity: Severity::Error,
        }
    }

    /// Create an internal-error diagnostic from a framework failure.
    #[must_use]
    pub fn internal(message: impl Into<String>, function: &str, line: usize) -> Self {
        Self {
            kind: kind::INTERNAL.to_string(),
            message: message.into(),
            function: function.to_string(),
            line,
            severity: Severity::Internal,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: [{}] {}",
            self.function, self.line, self.kind, self.message
        )
    }
}

/// Collects diagnostics during the analysis of one compilation unit.
#[derive(Debug, Default)]
pub struct Reporter {
    diagnostics: Vec<Diagnostic>,
}

impl Reporter {
    /// Create an empty reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic.
    pub fn report(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }

    /// Whether any diagnostic has been recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Number of diagnostics with the given kind tag (test helper).
    #[must_use]
    pub fn count_of_kind(&self, kind: &str) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }

    /// Finish reporting: diagnostics sorted by line, then kind.
    #[must_use]
    pub fn into_diagnostics(mut self) -> Vec<Diagnostic> {
        self.diagnostics
            .sort_by(|a, b| (a.line, &a.kind).cmp(&(b.line, &b.kind)));
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reporter_sorts_by_line_then_kind() {
        let mut r = Reporter::new();
        r.report(Diagnostic::error(
            kind::RETURN_TYPE_INCOMPATIBLE,
            "late",
            "f",
            9,
        ));
        r.report(Diagnostic::error(
            kind::ASSIGNMENT_TYPE_INCOMPATIBLE,
            "early",
            "f",
            2,
        ));
        let diags = r.into_diagnostics();
        assert_eq!(diags[0].line, 2);
        assert_eq!(diags[1].kind, kind::RETURN_TYPE_INCOMPATIBLE);
    }

    #[test]
    fn internal_diagnostic_is_distinguishable() {
        let d = Diagnostic::internal("lattice invariant violated", "f", 1);
        assert_eq!(d.severity, Severity::Internal);
        assert_eq!(d.kind, kind::INTERNAL);
        let u = Diagnostic::error(kind::DEREFERENCE_OF_NULLABLE, "m", "f", 1);
        assert_eq!(u.severity, Severity::Error);
    }

    #[test]
    fn display_includes_kind_tag() {
        let d = Diagnostic::error(kind::DEREFERENCE_OF_NULLABLE, "s may be null", "main", 4);
        assert_eq!(d.to_string(), "main:4: [dereference.of.nullable] s may be null");
    }
}
