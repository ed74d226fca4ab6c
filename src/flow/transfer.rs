//! The qualifier transfer function.
//!
//! One dispatch over [`Expr`] and [`StmtKind`] computes expression types
//! and updates the [`FlowStore`]. Family-specific behavior enters through
//! [`FamilyAdapter`]: literal typing and null-comparison narrowing are
//! the only points where the generic engine consults the family.

use crate::error::{QualError, Result};
use crate::flow::store::{AccessPath, FlowStore, TransferResult};
use crate::host::{Expr, FunctionModel, HostModel, Stmt, StmtKind};
use crate::propagate::conditional_type;
use crate::qualifier::Qualifier;
use crate::qualtype::QualifiedType;

/// Fallback erasure for elements the host has no signature for, typed
/// at the hierarchy top so nothing unsound is assumed about them.
const UNKNOWN_ERASURE: &str = "java.lang.Object";

/// Family-specific hooks consulted by the generic engine.
pub trait FamilyAdapter<Q: Qualifier>: Send + Sync {
    /// Short family name used in log output.
    fn family_name(&self) -> &'static str;

    /// Qualified type of a non-null literal, given its source text.
    fn literal_type(&self, text: &str) -> QualifiedType<Q> {
        default_literal_type(text)
    }

    /// Refinement qualifiers applied after `x == null` comparisons:
    /// `(on the equal branch, on the not-equal branch)`. `None` disables
    /// comparison narrowing for this family.
    fn null_comparison_refinement(&self) -> Option<(Q, Q)> {
        None
    }

    /// Whether dereferencing a receiver with this qualifier is an error.
    fn dereference_error(&self, _qualifier: &Q) -> bool {
        false
    }
}

/// Literal typing shared by families without special literal rules:
/// strings and boxed-free primitives at the hierarchy bottom.
#[must_use]
pub fn default_literal_type<Q: Qualifier>(text: &str) -> QualifiedType<Q> {
    if text.starts_with('"') && text.ends_with('"') && text.len() >= 2 {
        QualifiedType::declared(Q::bottom(), "java.lang.String")
    } else if text == "true" || text == "false" {
        QualifiedType::primitive(Q::bottom(), "boolean")
    } else if text.parse::<f64>().is_ok() && text.contains('.') {
        QualifiedType::primitive(Q::bottom(), "double")
    } else {
        QualifiedType::primitive(Q::bottom(), "int")
    }
}

/// Strip the surrounding quotes from a string-literal token.
#[must_use]
pub fn string_literal_body(text: &str) -> Option<&str> {
    if text.starts_with('"') && text.ends_with('"') && text.len() >= 2 {
        Some(&text[1..text.len() - 1])
    } else {
        None
    }
}

fn contains_call(expr: &Expr) -> bool {
    match expr {
        Expr::Call { .. } => true,
        Expr::NullLit | Expr::Lit(_) | Expr::Local(_) => false,
        Expr::Field { receiver, .. } => contains_call(receiver),
        Expr::Ternary {
            cond,
            then_expr,
            else_expr,
        } => contains_call(cond) || contains_call(then_expr) || contains_call(else_expr),
        Expr::IsNull { operand, .. } => contains_call(operand),
    }
}

/// Transfer function for one function body under one qualifier family.
pub struct QualTransfer<'a, Q: Qualifier> {
    pub adapter: &'a dyn FamilyAdapter<Q>,
    pub host: &'a dyn HostModel<Q>,
    pub function: &'a FunctionModel<Q>,
}

impl<'a, Q: Qualifier> QualTransfer<'a, Q> {
    #[must_use]
    pub fn new(
        adapter: &'a dyn FamilyAdapter<Q>,
        host: &'a dyn HostModel<Q>,
        function: &'a FunctionModel<Q>,
    ) -> Self {
        Self {
            adapter,
            host,
            function,
        }
    }

    /// Refined type of an expression at the program point `store`
    /// describes.
    pub fn type_of(&self, expr: &Expr, store: &FlowStore<Q>) -> Result<QualifiedType<Q>> {
        match expr {
            Expr::NullLit => Ok(QualifiedType::null_type()),
            Expr::Lit(text) => Ok(self.adapter.literal_type(text)),
            Expr::Local(name) => {
                if let Some(refined) = store.get(&AccessPath::local(name)) {
                    return Ok(refined.clone());
                }
                self.function
                    .locals
                    .get(name)
                    .cloned()
                    .ok_or_else(|| {
                        QualError::Internal(format!(
                            "undeclared local `{}` in function `{}`",
                            name, self.function.name
                        ))
                    })
            }
            Expr::Field { receiver, name } => {
                if let Some(path) = AccessPath::from_expr(expr) {
                    if let Some(refined) = store.get(&path) {
                        return Ok(refined.clone());
                    }
                }
                let receiver_type = self.type_of(receiver, store)?;
                Ok(self
                    .host
                    .field_type(&receiver_type.erasure(), name)
                    .cloned()
                    .unwrap_or_else(|| {
                        QualifiedType::declared(Q::default_qualifier(), UNKNOWN_ERASURE)
                    }))
            }
            Expr::Call { method, .. } => Ok(self
                .host
                .method_signature(method)
                .map(|sig| sig.ret.clone())
                .unwrap_or_else(|| {
                    QualifiedType::declared(Q::default_qualifier(), UNKNOWN_ERASURE)
                })),
            Expr::Ternary {
                then_expr,
                else_expr,
                ..
            } => {
                let then_type = self.type_of(then_expr, store)?;
                let else_type = self.type_of(else_expr, store)?;
                conditional_type(&then_type, &else_type)
            }
            Expr::IsNull { .. } => Ok(QualifiedType::primitive(Q::bottom(), "boolean")),
        }
    }

    /// Apply one straight-line statement to the store.
    pub fn transfer_stmt(&self, stmt: &Stmt, store: &mut FlowStore<Q>) -> Result<()> {
        match &stmt.kind {
            StmtKind::Decl { name, init } => {
                match init {
                    Some(value) => {
                        let ty = self.type_of(value, store)?;
                        if contains_call(value) {
                            store.kill_fields();
                        }
                        store.set(AccessPath::local(name), ty);
                    }
                    None => store.remove(&AccessPath::local(name)),
                }
                Ok(())
            }
            StmtKind::Assign { target, value } => {
                let ty = self.type_of(value, store)?;
                let path = AccessPath::from_expr(target).ok_or_else(|| {
                    QualError::UnexpectedNode {
                        kind: target.kind_name().to_string(),
                        context: "assignment target".to_string(),
                    }
                })?;
                if contains_call(value) {
                    store.kill_fields();
                }
                store.kill_aliases(&path);
                store.set(path, ty);
                Ok(())
            }
            StmtKind::Expr(expr) => {
                if contains_call(expr) {
                    store.kill_fields();
                }
                Ok(())
            }
            StmtKind::Return(_) => Ok(()),
            StmtKind::If { .. } | StmtKind::While { .. } => Err(QualError::UnexpectedNode {
                kind: "structured statement".to_string(),
                context: "basic block body".to_string(),
            }),
        }
    }

    /// Apply a branch condition, producing per-polarity stores.
    pub fn transfer_branch(
        &self,
        cond: &Expr,
        store: &FlowStore<Q>,
    ) -> Result<TransferResult<Q>> {
        if let Expr::IsNull { operand, negated } = cond {
            if let (Some(path), Some((on_equal, on_not_equal))) = (
                AccessPath::from_expr(operand),
                self.adapter.null_comparison_refinement(),
            ) {
                let base = self.type_of(operand, store)?;
                let equal_type =
                    base.with_qualifier(base.qualifier.least_upper_bound(&on_equal));
                let not_equal_type =
                    base.with_qualifier(base.qualifier.greatest_lower_bound(&on_not_equal));

                let mut equal_store = store.clone();
                equal_store.set(path.clone(), equal_type);
                let mut not_equal_store = store.clone();
                not_equal_store.set(path, not_equal_type);

                // `x == null` puts the equal store on the true edge;
                // `x != null` swaps.
                let (then_store, else_store) = if *negated {
                    (not_equal_store, equal_store)
                } else {
                    (equal_store, not_equal_store)
                };
                return Ok(TransferResult::Conditional {
                    then_store,
                    else_store,
                });
            }
        }
        Ok(TransferResult::Regular(store.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::CompilationUnit;
    use crate::qualifier::Nullness;

    struct TestAdapter;

    impl FamilyAdapter<Nullness> for TestAdapter {
        fn family_name(&self) -> &'static str {
            "nullness"
        }

        fn null_comparison_refinement(&self) -> Option<(Nullness, Nullness)> {
            Some((Nullness::Nullable, Nullness::NonNull))
        }

        fn dereference_error(&self, qualifier: &Nullness) -> bool {
            *qualifier == Nullness::Nullable
        }
    }

    fn string(q: Nullness) -> QualifiedType<Nullness> {
        QualifiedType::declared(q, "java.lang.String")
    }

    fn setup() -> (CompilationUnit<Nullness>, FunctionModel<Nullness>) {
        let unit = CompilationUnit::new("Test.java");
        let mut f = FunctionModel::new("main", string(Nullness::NonNull));
        f.declare("s", string(Nullness::Nullable));
        (unit, f)
    }

    #[test]
    fn null_literal_types_as_null_type() {
        let (unit, f) = setup();
        let transfer = QualTransfer::new(&TestAdapter, &unit, &f);
        let ty = transfer
            .type_of(&Expr::NullLit, &FlowStore::new())
            .expect("type");
        assert!(ty.is_null_type());
        assert_eq!(ty.qualifier, Nullness::Nullable);
    }

    #[test]
    fn refinement_shadows_declared_type() {
        let (unit, f) = setup();
        let transfer = QualTransfer::new(&TestAdapter, &unit, &f);
        let mut store = FlowStore::new();
        store.set(AccessPath::local("s"), string(Nullness::NonNull));
        let ty = transfer.type_of(&Expr::local("s"), &store).expect("type");
        assert_eq!(ty.qualifier, Nullness::NonNull);
    }

    #[test]
    fn null_check_narrows_the_non_null_branch() {
        let (unit, f) = setup();
        let transfer = QualTransfer::new(&TestAdapter, &unit, &f);
        let cond = Expr::IsNull {
            operand: Box::new(Expr::local("s")),
            negated: false,
        };
        let result = transfer
            .transfer_branch(&cond, &FlowStore::new())
            .expect("branch");
        let s = AccessPath::local("s");
        match result {
            TransferResult::Conditional {
                then_store,
                else_store,
            } => {
                // True edge: s == null, still nullable.
                assert_eq!(then_store.get(&s).map(|t| t.qualifier), Some(Nullness::Nullable));
                // False edge: s != null.
                assert_eq!(else_store.get(&s).map(|t| t.qualifier), Some(Nullness::NonNull));
            }
            TransferResult::Regular(_) => panic!("expected conditional result"),
        }
    }

    #[test]
    fn negated_null_check_swaps_branches() {
        let (unit, f) = setup();
        let transfer = QualTransfer::new(&TestAdapter, &unit, &f);
        let cond = Expr::IsNull {
            operand: Box::new(Expr::local("s")),
            negated: true,
        };
        let result = transfer
            .transfer_branch(&cond, &FlowStore::new())
            .expect("branch");
        let s = AccessPath::local("s");
        assert_eq!(
            result.for_branch(true).get(&s).map(|t| t.qualifier),
            Some(Nullness::NonNull)
        );
    }

    #[test]
    fn assignment_records_the_value_type() {
        let (unit, f) = setup();
        let transfer = QualTransfer::new(&TestAdapter, &unit, &f);
        let mut store = FlowStore::new();
        transfer
            .transfer_stmt(
                &Stmt::new(
                    StmtKind::Assign {
                        target: Expr::local("s"),
                        value: Expr::NullLit,
                    },
                    1,
                ),
                &mut store,
            )
            .expect("transfer");
        let refined = store.get(&AccessPath::local("s")).expect("refined");
        assert!(refined.is_null_type());
    }

    #[test]
    fn opaque_call_invalidates_field_refinements() {
        let (unit, f) = setup();
        let transfer = QualTransfer::new(&TestAdapter, &unit, &f);
        let mut store = FlowStore::new();
        store.set(
            AccessPath::local("s").select("f"),
            string(Nullness::NonNull),
        );
        store.set(AccessPath::local("s"), string(Nullness::NonNull));
        transfer
            .transfer_stmt(
                &Stmt::new(StmtKind::Expr(Expr::call("pkg.C#poke()", vec![])), 1),
                &mut store,
            )
            .expect("transfer");
        assert!(store.get(&AccessPath::local("s").select("f")).is_none());
        assert!(store.get(&AccessPath::local("s")).is_some());
    }

    #[test]
    fn undeclared_local_is_a_framework_error() {
        let (unit, f) = setup();
        let transfer = QualTransfer::new(&TestAdapter, &unit, &f);
        let err = transfer
            .type_of(&Expr::local("ghost"), &FlowStore::new())
            .expect_err("framework error");
        assert!(matches!(err, QualError::Internal(_)));
    }
}
