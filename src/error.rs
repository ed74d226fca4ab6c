//! Central error types for qualcheck.
//!
//! Uses `thiserror` for ergonomic error definitions with automatic
//! `Display` and `From` implementations.
//!
//! Only *framework* failures travel through this type: unexpected node
//! shapes, structurally incompatible lattice inputs, malformed stub files.
//! Type errors in the code under analysis are never `Err` values; they are
//! reported as [`crate::diagnostics::Diagnostic`]s and checking continues.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum QualError {
    /// IO operation failed (stub file loading).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stub file line did not match the stub grammar.
    #[error("Stub parse error in {file}:{line}: {message}")]
    StubParse {
        file: String,
        line: usize,
        message: String,
    },

    /// The transfer function met a node shape it has no rule for.
    ///
    /// This is a framework bug, not a defect in the analyzed code.
    /// Skipping the node would silently drop refinements, so the analysis
    /// of the compilation unit is aborted instead.
    #[error("Unexpected node shape in {context}: {kind}")]
    UnexpectedNode { kind: String, context: String },

    /// Structured-type combination was asked to align two types with
    /// different erasures.
    #[error("Erasure mismatch: cannot combine {left} with {right}")]
    ErasureMismatch { left: String, right: String },

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Internal invariant violation (lattice engine or fixpoint driver).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for Results using QualError.
pub type Result<T> = std::result::Result<T, QualError>;
