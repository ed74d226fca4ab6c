//! The checking driver.
//!
//! One [`check_unit`] call analyzes a compilation unit under one
//! qualifier family: it builds a CFG per function, runs the flow
//! fixpoint, then re-walks every reachable block with the stabilized
//! input stores and reports type errors through [`Reporter`].
//!
//! A framework error ([`crate::error::QualError`]) anywhere in a unit
//! aborts that unit with a single `internal.error` diagnostic; errors in
//! the analyzed code never stop checking.
//!
//! [`check_units`] fans units out across a thread pool. Units share
//! nothing mutable, so the fan-out is a plain parallel map.

pub mod families;

use std::num::NonZeroUsize;

use lru::LruCache;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cfg::{BlockId, CfgBuilder};
use crate::diagnostics::{kind, Diagnostic, Reporter};
use crate::error::{QualError, Result};
use crate::flow::fixpoint::{run_fixpoint, DEFAULT_MAX_ITERATIONS};
use crate::flow::store::{AccessPath, FlowStore};
use crate::flow::transfer::{FamilyAdapter, QualTransfer};
use crate::host::{CompilationUnit, Expr, FunctionModel, HostModel, Stmt, StmtKind};
use crate::propagate::{check_capture_bounds, is_subtype_types};
use crate::qualifier::Qualifier;
use crate::qualtype::{QualifiedType, TypeShape};
use crate::stub::{StubIndex, StubbedUnit};

pub use families::{FormatChecker, I18nFormatChecker, NullnessChecker, SignednessChecker};

const TYPE_CACHE_CAPACITY: usize = 256;

/// Per-unit cache of type-validation results, keyed by the rendered
/// type. Validation of a deeply generic type repeats at every use site;
/// the cache makes repeats cheap without outliving the unit.
type TypeCache = LruCache<String, Vec<(String, String)>>;

/// Outcome of checking one compilation unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    pub unit: String,
    /// Diagnostics sorted by line, then kind.
    pub diagnostics: Vec<Diagnostic>,
}

impl CheckReport {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Number of diagnostics with the given kind tag.
    #[must_use]
    pub fn count_of_kind(&self, kind: &str) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }
}

/// Check one compilation unit under one qualifier family.
pub fn check_unit<Q: Qualifier>(
    adapter: &dyn FamilyAdapter<Q>,
    host: &dyn HostModel<Q>,
    unit: &CompilationUnit<Q>,
) -> CheckReport {
    let mut reporter = Reporter::new();
    let mut cache: TypeCache =
        LruCache::new(NonZeroUsize::new(TYPE_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN));

    for function in &unit.functions {
        debug!(
            unit = %unit.name,
            function = %function.name,
            family = adapter.family_name(),
            "checking function"
        );
        if let Err(err) = check_function(adapter, host, function, &mut reporter, &mut cache) {
            warn!(
                unit = %unit.name,
                function = %function.name,
                error = %err,
                "framework error, aborting unit"
            );
            reporter.report(Diagnostic::internal(err.to_string(), &function.name, 0));
            break;
        }
    }

    let diagnostics = reporter.into_diagnostics();
    info!(
        unit = %unit.name,
        family = adapter.family_name(),
        diagnostics = diagnostics.len(),
        "unit checked"
    );
    CheckReport {
        unit: unit.name.clone(),
        diagnostics,
    }
}

/// Check several units in parallel, optionally layered over stubs.
pub fn check_units<Q: Qualifier>(
    adapter: &dyn FamilyAdapter<Q>,
    units: &[CompilationUnit<Q>],
    stubs: Option<&StubIndex<Q>>,
) -> Vec<CheckReport> {
    units
        .par_iter()
        .map(|unit| match stubs {
            Some(stubs) => {
                let host = StubbedUnit::new(unit, stubs);
                check_unit(adapter, &host, unit)
            }
            None => check_unit(adapter, unit, unit),
        })
        .collect()
}

fn check_function<Q: Qualifier>(
    adapter: &dyn FamilyAdapter<Q>,
    host: &dyn HostModel<Q>,
    function: &FunctionModel<Q>,
    reporter: &mut Reporter,
    cache: &mut TypeCache,
) -> Result<()> {
    let cfg = CfgBuilder::build(function);
    let transfer = QualTransfer::new(adapter, host, function);
    let result = run_fixpoint(&cfg, &transfer, DEFAULT_MAX_ITERATIONS)?;
    if !result.converged {
        reporter.report(Diagnostic::internal(
            "dataflow fixpoint did not converge",
            &function.name,
            0,
        ));
        return Ok(());
    }

    let mut checker = FunctionChecker {
        transfer: &transfer,
        host,
        function,
        reporter,
        cache,
    };
    checker.check_declarations();

    // Re-walk reachable blocks with their stabilized input stores.
    let mut ids: Vec<BlockId> = result.entry_stores.keys().copied().collect();
    ids.sort_unstable();
    for id in ids {
        let block = cfg
            .blocks
            .get(&id)
            .ok_or_else(|| QualError::Internal(format!("missing block {}", id.0)))?;
        let mut store = result.store_at(id);
        for stmt in &block.statements {
            checker.check_stmt(stmt, &store)?;
            checker.transfer.transfer_stmt(stmt, &mut store)?;
        }
        if let Some(cond) = &block.terminator {
            checker.check_expr(cond, &store, block.terminator_line)?;
        }
    }
    Ok(())
}

struct FunctionChecker<'a, 'b, Q: Qualifier> {
    transfer: &'b QualTransfer<'a, Q>,
    host: &'a dyn HostModel<Q>,
    function: &'a FunctionModel<Q>,
    reporter: &'b mut Reporter,
    cache: &'b mut TypeCache,
}

impl<Q: Qualifier> FunctionChecker<'_, '_, Q> {
    /// Validate the declared types of locals and the return type against
    /// generic bounds. Reported at line 0: these belong to the signature,
    /// not to any statement.
    fn check_declarations(&mut self) {
        let mut names: Vec<&String> = self.function.locals.keys().collect();
        names.sort_unstable();
        for name in names {
            if let Some(ty) = self.function.locals.get(name) {
                self.validate_type(ty, 0);
            }
        }
        self.validate_type(&self.function.return_type, 0);
    }

    fn check_stmt(&mut self, stmt: &Stmt, store: &FlowStore<Q>) -> Result<()> {
        match &stmt.kind {
            StmtKind::Decl { name, init } => {
                if let Some(value) = init {
                    self.check_expr(value, store, stmt.line)?;
                    if let Some(declared) = self.function.locals.get(name).cloned() {
                        let found = self.transfer.type_of(value, store)?;
                        self.check_assignable(
                            &found,
                            &declared,
                            kind::ASSIGNMENT_TYPE_INCOMPATIBLE,
                            stmt.line,
                        );
                    }
                }
                Ok(())
            }
            StmtKind::Assign { target, value } => {
                self.check_expr(target, store, stmt.line)?;
                self.check_expr(value, store, stmt.line)?;
                if let Some(declared) = self.declared_target_type(target, store)? {
                    let found = self.transfer.type_of(value, store)?;
                    self.check_assignable(
                        &found,
                        &declared,
                        kind::ASSIGNMENT_TYPE_INCOMPATIBLE,
                        stmt.line,
                    );
                }
                Ok(())
            }
            StmtKind::Expr(expr) => self.check_expr(expr, store, stmt.line),
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.check_expr(value, store, stmt.line)?;
                    let found = self.transfer.type_of(value, store)?;
                    let expected = self.function.return_type.clone();
                    self.check_assignable(
                        &found,
                        &expected,
                        kind::RETURN_TYPE_INCOMPATIBLE,
                        stmt.line,
                    );
                }
                Ok(())
            }
            StmtKind::If { .. } | StmtKind::While { .. } => Err(QualError::UnexpectedNode {
                kind: "structured statement".to_string(),
                context: "checker block walk".to_string(),
            }),
        }
    }

    fn check_expr(&mut self, expr: &Expr, store: &FlowStore<Q>, line: usize) -> Result<()> {
        match expr {
            Expr::NullLit | Expr::Lit(_) | Expr::Local(_) => Ok(()),
            Expr::Field { receiver, .. } => {
                self.check_expr(receiver, store, line)?;
                self.check_dereference(receiver, store, line)
            }
            Expr::Call {
                receiver,
                method,
                args,
            } => {
                if let Some(receiver) = receiver {
                    self.check_expr(receiver, store, line)?;
                    self.check_dereference(receiver, store, line)?;
                }
                for arg in args {
                    self.check_expr(arg, store, line)?;
                }
                if let Some(sig) = self.host.method_signature(method) {
                    let params = sig.params.clone();
                    if params.len() != args.len() {
                        return Err(QualError::Internal(format!(
                            "arity mismatch calling {}: {} arguments for {} parameters",
                            method,
                            args.len(),
                            params.len()
                        )));
                    }
                    for (index, (arg, param)) in args.iter().zip(params.iter()).enumerate() {
                        let found = self.transfer.type_of(arg, store)?;
                        if !is_subtype_types(&found, param) {
                            self.reporter.report(Diagnostic::error(
                                kind::ARGUMENT_TYPE_INCOMPATIBLE,
                                format!(
                                    "argument {} of {}: found {}; expected {}",
                                    index + 1,
                                    method,
                                    found,
                                    param
                                ),
                                &self.function.name,
                                line,
                            ));
                        }
                    }
                }
                Ok(())
            }
            Expr::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                self.check_expr(cond, store, line)?;
                self.check_expr(then_expr, store, line)?;
                self.check_expr(else_expr, store, line)
            }
            Expr::IsNull { operand, .. } => self.check_expr(operand, store, line),
        }
    }

    fn check_dereference(
        &mut self,
        receiver: &Expr,
        store: &FlowStore<Q>,
        line: usize,
    ) -> Result<()> {
        let ty = self.transfer.type_of(receiver, store)?;
        if self.transfer.adapter.dereference_error(&ty.qualifier) {
            let subject = AccessPath::from_expr(receiver)
                .map_or_else(|| receiver.kind_name().to_string(), |p| p.to_string());
            self.reporter.report(Diagnostic::error(
                kind::DEREFERENCE_OF_NULLABLE,
                format!("{} may be null", subject),
                &self.function.name,
                line,
            ));
        }
        Ok(())
    }

    fn check_assignable(
        &mut self,
        found: &QualifiedType<Q>,
        expected: &QualifiedType<Q>,
        error_kind: &str,
        line: usize,
    ) {
        self.validate_type(expected, line);
        if !is_subtype_types(found, expected) {
            self.reporter.report(Diagnostic::error(
                error_kind,
                format!("found {}; expected {}", found, expected),
                &self.function.name,
                line,
            ));
        }
    }

    /// Declared type of an assignment target, if the host knows one.
    fn declared_target_type(
        &self,
        target: &Expr,
        store: &FlowStore<Q>,
    ) -> Result<Option<QualifiedType<Q>>> {
        match target {
            Expr::Local(name) => Ok(self.function.locals.get(name).cloned()),
            Expr::Field { receiver, name } => {
                let receiver_type = self.transfer.type_of(receiver, store)?;
                Ok(self
                    .host
                    .field_type(&receiver_type.erasure(), name)
                    .cloned())
            }
            other => Err(QualError::UnexpectedNode {
                kind: other.kind_name().to_string(),
                context: "assignment target".to_string(),
            }),
        }
    }

    /// Check a type's arguments against the declared type-parameter
    /// bounds, through the per-unit cache.
    fn validate_type(&mut self, ty: &QualifiedType<Q>, line: usize) {
        let key = ty.to_string();
        if let Some(found) = self.cache.get(&key) {
            for (error_kind, message) in found.clone() {
                self.reporter.report(Diagnostic::error(
                    &error_kind,
                    message,
                    &self.function.name,
                    line,
                ));
            }
            return;
        }
        let mut issues = Vec::new();
        self.collect_type_issues(ty, &mut issues);
        for (error_kind, message) in &issues {
            self.reporter.report(Diagnostic::error(
                error_kind,
                message.clone(),
                &self.function.name,
                line,
            ));
        }
        self.cache.put(key, issues);
    }

    fn collect_type_issues(&self, ty: &QualifiedType<Q>, out: &mut Vec<(String, String)>) {
        match &ty.shape {
            TypeShape::Declared { name, args } if !args.is_empty() => {
                if let Some(params) = self.host.type_parameters(name) {
                    if params.len() == args.len() {
                        for (param, arg) in params.iter().zip(args.iter()) {
                            if matches!(arg.shape, TypeShape::Wildcard { .. }) {
                                continue;
                            }
                            if !arg.qualifier.is_subtype(&param.bound.qualifier) {
                                out.push((
                                    kind::TYPE_ARGUMENT_TYPE_INCOMPATIBLE.to_string(),
                                    format!(
                                        "type argument {} for {} of {}: found {}; expected bound {}",
                                        arg, param.name, name, arg.qualifier, param.bound.qualifier
                                    ),
                                ));
                            }
                        }
                        let bounds: Vec<QualifiedType<Q>> =
                            params.iter().map(|p| p.bound.clone()).collect();
                        for mismatch in check_capture_bounds(&bounds, args) {
                            out.push((
                                kind::BOUND_TYPE_INCOMPATIBLE.to_string(),
                                format!(
                                    "captured wildcard at argument {} of {}: bound {} exceeds declared bound {}",
                                    mismatch.position, name, mismatch.found, mismatch.expected
                                ),
                            ));
                        }
                    }
                }
                for arg in args {
                    self.collect_type_issues(arg, out);
                }
            }
            TypeShape::Declared { .. } | TypeShape::Primitive { .. } | TypeShape::NullType => {}
            TypeShape::Array { component } => self.collect_type_issues(component, out),
            TypeShape::TypeVar { upper, .. } => self.collect_type_issues(upper, out),
            TypeShape::Wildcard { upper, lower } => {
                if let Some(upper) = upper {
                    self.collect_type_issues(upper, out);
                }
                if let Some(lower) = lower {
                    self.collect_type_issues(lower, out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MethodSig, TypeParam};
    use crate::qualifier::{FormatQual, Nullness};

    fn string(q: Nullness) -> QualifiedType<Nullness> {
        QualifiedType::declared(q, "java.lang.String")
    }

    fn unit_with(f: FunctionModel<Nullness>) -> CompilationUnit<Nullness> {
        let mut unit = CompilationUnit::new("Test.java");
        unit.add_function(f);
        unit
    }

    #[test]
    fn nullable_dereference_is_reported() {
        let mut f = FunctionModel::new("main", QualifiedType::primitive(Nullness::NonNull, "void"));
        f.declare("s", string(Nullness::Nullable));
        f.body = vec![Stmt::new(
            StmtKind::Expr(Expr::call_on(
                Expr::local("s"),
                "java.lang.String#length()",
                vec![],
            )),
            4,
        )];
        let unit = unit_with(f);
        let report = check_unit(&NullnessChecker, &unit, &unit);
        assert_eq!(report.count_of_kind(kind::DEREFERENCE_OF_NULLABLE), 1);
        assert_eq!(
            report.diagnostics[0].to_string(),
            "main:4: [dereference.of.nullable] s may be null"
        );
    }

    #[test]
    fn guarded_dereference_is_clean() {
        let mut f = FunctionModel::new("main", QualifiedType::primitive(Nullness::NonNull, "void"));
        f.declare("s", string(Nullness::Nullable));
        f.body = vec![Stmt::new(
            StmtKind::If {
                cond: Expr::IsNull {
                    operand: Box::new(Expr::local("s")),
                    negated: true,
                },
                then_body: vec![Stmt::new(
                    StmtKind::Expr(Expr::call_on(
                        Expr::local("s"),
                        "java.lang.String#length()",
                        vec![],
                    )),
                    2,
                )],
                else_body: vec![],
            },
            1,
        )];
        let unit = unit_with(f);
        let report = check_unit(&NullnessChecker, &unit, &unit);
        assert!(!report.has_errors(), "diagnostics: {:?}", report.diagnostics);
    }

    #[test]
    fn reassigning_the_receiver_discards_field_refinements() {
        let mut f = FunctionModel::new("main", QualifiedType::primitive(Nullness::NonNull, "void"));
        f.declare("x", QualifiedType::declared(Nullness::NonNull, "pkg.C"));
        f.declare("y", QualifiedType::declared(Nullness::NonNull, "pkg.C"));
        f.body = vec![
            // x.f holds a fresh non-null value...
            Stmt::new(
                StmtKind::Assign {
                    target: Expr::field(Expr::local("x"), "f"),
                    value: Expr::Lit("\"hi\"".to_string()),
                },
                1,
            ),
            // ...but x itself is then replaced, so x.f is unknown again.
            Stmt::new(
                StmtKind::Assign {
                    target: Expr::local("x"),
                    value: Expr::local("y"),
                },
                2,
            ),
            Stmt::new(
                StmtKind::Expr(Expr::call_on(
                    Expr::field(Expr::local("x"), "f"),
                    "java.lang.String#length()",
                    vec![],
                )),
                3,
            ),
        ];
        let mut unit = unit_with(f);
        unit.add_field("pkg.C#f", string(Nullness::Nullable));
        let report = check_unit(&NullnessChecker, &unit, &unit);
        assert_eq!(report.count_of_kind(kind::DEREFERENCE_OF_NULLABLE), 1);
        assert_eq!(report.diagnostics[0].line, 3);
    }

    #[test]
    fn null_assignment_to_non_null_local() {
        let mut f = FunctionModel::new("main", QualifiedType::primitive(Nullness::NonNull, "void"));
        f.declare("s", string(Nullness::NonNull));
        f.body = vec![Stmt::new(
            StmtKind::Assign {
                target: Expr::local("s"),
                value: Expr::NullLit,
            },
            3,
        )];
        let unit = unit_with(f);
        let report = check_unit(&NullnessChecker, &unit, &unit);
        assert_eq!(report.count_of_kind(kind::ASSIGNMENT_TYPE_INCOMPATIBLE), 1);
        assert_eq!(report.diagnostics[0].line, 3);
    }

    #[test]
    fn nullable_return_from_non_null_function() {
        let mut f = FunctionModel::new("get", string(Nullness::NonNull));
        f.declare("s", string(Nullness::Nullable));
        f.body = vec![Stmt::new(StmtKind::Return(Some(Expr::local("s"))), 2)];
        let unit = unit_with(f);
        let report = check_unit(&NullnessChecker, &unit, &unit);
        assert_eq!(report.count_of_kind(kind::RETURN_TYPE_INCOMPATIBLE), 1);
    }

    #[test]
    fn nullable_argument_for_non_null_parameter() {
        let mut f = FunctionModel::new("main", QualifiedType::primitive(Nullness::NonNull, "void"));
        f.declare("s", string(Nullness::Nullable));
        f.body = vec![Stmt::new(
            StmtKind::Expr(Expr::call("pkg.C#take(String)", vec![Expr::local("s")])),
            5,
        )];
        let mut unit = unit_with(f);
        unit.add_method(
            "pkg.C#take(String)",
            MethodSig {
                params: vec![string(Nullness::NonNull)],
                ret: QualifiedType::primitive(Nullness::NonNull, "void"),
            },
        );
        let report = check_unit(&NullnessChecker, &unit, &unit);
        assert_eq!(report.count_of_kind(kind::ARGUMENT_TYPE_INCOMPATIBLE), 1);
    }

    #[test]
    fn type_argument_outside_declared_bound() {
        let mut f = FunctionModel::new("main", QualifiedType::primitive(Nullness::NonNull, "void"));
        f.declare(
            "box",
            QualifiedType::declared_with(
                Nullness::NonNull,
                "pkg.Box",
                vec![string(Nullness::Nullable)],
            ),
        );
        let mut unit = unit_with(f);
        unit.declare_generic(
            "pkg.Box",
            vec![TypeParam {
                name: "T".to_string(),
                bound: QualifiedType::declared(Nullness::NonNull, "java.lang.Object"),
            }],
        );
        let report = check_unit(&NullnessChecker, &unit, &unit);
        assert_eq!(
            report.count_of_kind(kind::TYPE_ARGUMENT_TYPE_INCOMPATIBLE),
            1
        );
    }

    #[test]
    fn wildcard_bound_outside_declared_bound() {
        let mut f = FunctionModel::new("main", QualifiedType::primitive(Nullness::NonNull, "void"));
        f.declare(
            "box",
            QualifiedType::declared_with(
                Nullness::NonNull,
                "pkg.Box",
                vec![QualifiedType::wildcard_extends(
                    Nullness::Nullable,
                    string(Nullness::Nullable),
                )],
            ),
        );
        let mut unit = unit_with(f);
        unit.declare_generic(
            "pkg.Box",
            vec![TypeParam {
                name: "T".to_string(),
                bound: QualifiedType::declared(Nullness::NonNull, "java.lang.Object"),
            }],
        );
        let report = check_unit(&NullnessChecker, &unit, &unit);
        assert_eq!(report.count_of_kind(kind::BOUND_TYPE_INCOMPATIBLE), 1);
    }

    #[test]
    fn format_literal_narrower_than_declared_is_clean() {
        let mut f = FunctionModel::new(
            "main",
            QualifiedType::primitive(FormatQual::bottom(), "void"),
        );
        f.declare(
            "fmt",
            QualifiedType::declared(FormatQual::UnknownFormat, "java.lang.String"),
        );
        f.body = vec![Stmt::new(
            StmtKind::Assign {
                target: Expr::local("fmt"),
                value: Expr::Lit("\"%d\"".to_string()),
            },
            1,
        )];
        let mut unit: CompilationUnit<FormatQual> = CompilationUnit::new("Fmt.java");
        unit.add_function(f);
        let report = check_unit(&FormatChecker, &unit, &unit);
        assert!(!report.has_errors(), "diagnostics: {:?}", report.diagnostics);
    }

    #[test]
    fn units_are_checked_in_parallel() {
        let mut units = Vec::new();
        for i in 0..4 {
            let mut f =
                FunctionModel::new("main", QualifiedType::primitive(Nullness::NonNull, "void"));
            f.declare("s", string(Nullness::Nullable));
            f.body = vec![Stmt::new(
                StmtKind::Expr(Expr::call_on(
                    Expr::local("s"),
                    "java.lang.String#length()",
                    vec![],
                )),
                1,
            )];
            let mut unit = CompilationUnit::new(&format!("Unit{}.java", i));
            unit.add_function(f);
            units.push(unit);
        }
        let reports = check_units(&NullnessChecker, &units, None);
        assert_eq!(reports.len(), 4);
        assert!(reports
            .iter()
            .all(|r| r.count_of_kind(kind::DEREFERENCE_OF_NULLABLE) == 1));
    }
}
