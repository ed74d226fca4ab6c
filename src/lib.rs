//! Pluggable qualifier checking over host compilation units.
//!
//! A qualifier family refines host types with a bounded lattice of
//! annotations (`@Nullable`/`@NonNull`, printf conversion categories,
//! signedness, ...). This crate supplies the family-independent engine:
//! lattice operations lifted over structured types, a flow-sensitive
//! refinement analysis, and a checking driver that turns violations into
//! stable, machine-readable diagnostics.
//!
//! # Architecture
//!
//! ```text
//!  qualifier   atomic lattices (one type per family)
//!      |
//!  qualtype    qualifiers attached to every type position
//!      |
//!  propagate   LUB/GLB/subtyping over whole type shapes
//!      |
//!  flow        access-path stores, transfer function, worklist fixpoint
//!      |
//!  checker     per-family adapters, block re-walk, diagnostics
//! ```
//!
//! The host compiler is behind the narrow [`host::HostModel`] trait;
//! [`host::CompilationUnit`] is the in-memory implementation, and
//! [`stub::StubIndex`] layers annotated signatures for library elements
//! underneath it.
//!
//! # Example
//!
//! ```
//! use qualcheck::checker::{check_unit, NullnessChecker};
//! use qualcheck::host::{CompilationUnit, Expr, FunctionModel, Stmt, StmtKind};
//! use qualcheck::qualifier::Nullness;
//! use qualcheck::qualtype::QualifiedType;
//!
//! let mut f = FunctionModel::new("main", QualifiedType::primitive(Nullness::NonNull, "void"));
//! f.declare("s", QualifiedType::declared(Nullness::Nullable, "java.lang.String"));
//! f.body = vec![Stmt::new(
//!     StmtKind::Expr(Expr::call_on(Expr::local("s"), "java.lang.String#length()", vec![])),
//!     4,
//! )];
//! let mut unit = CompilationUnit::new("Test.java");
//! unit.add_function(f);
//!
//! let report = check_unit(&NullnessChecker, &unit, &unit);
//! assert_eq!(report.diagnostics[0].kind, "dereference.of.nullable");
//! ```

pub mod cfg;
pub mod checker;
pub mod diagnostics;
pub mod error;
pub mod flow;
pub mod host;
pub mod propagate;
pub mod qualifier;
pub mod qualtype;
pub mod stub;

pub use checker::{check_unit, check_units, CheckReport};
pub use diagnostics::{Diagnostic, Reporter, Severity};
pub use error::{QualError, Result};
pub use qualifier::Qualifier;
pub use qualtype::{QualifiedType, TypeShape};
