//! Worklist fixpoint over the CFG.
//!
//! Stores are kept per *edge*, not per block, so branch narrowing
//! survives until the join at the successor. A block's input is the LUB
//! of the stores on its available incoming edges; blocks whose
//! predecessors have not produced a store yet are requeued by whoever
//! reaches them first.

use std::collections::VecDeque;

use fixedbitset::FixedBitSet;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::cfg::{BlockId, Cfg, EdgeType};
use crate::error::{QualError, Result};
use crate::flow::store::{FlowStore, TransferResult};
use crate::flow::transfer::QualTransfer;
use crate::qualifier::Qualifier;

/// Iteration cap. The join is monotone on a finite lattice, so any run
/// that hits this indicates a driver bug rather than slow convergence.
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// Final analysis state for one function.
#[derive(Debug, Clone)]
pub struct FixpointResult<Q> {
    /// Stabilized input store of each reachable block.
    pub entry_stores: FxHashMap<BlockId, FlowStore<Q>>,
    /// Blocks processed, counting repeats.
    pub iterations: usize,
    /// False only when the iteration cap fired.
    pub converged: bool,
}

impl<Q: Qualifier> FixpointResult<Q> {
    /// Input store of a block; empty for blocks never reached.
    #[must_use]
    pub fn store_at(&self, block: BlockId) -> FlowStore<Q> {
        self.entry_stores.get(&block).cloned().unwrap_or_default()
    }
}

/// Run the analysis to a fixpoint.
pub fn run_fixpoint<Q: Qualifier>(
    cfg: &Cfg,
    transfer: &QualTransfer<'_, Q>,
    max_iterations: usize,
) -> Result<FixpointResult<Q>> {
    let mut edge_stores: FxHashMap<(BlockId, BlockId), FlowStore<Q>> = FxHashMap::default();
    let mut entry_stores: FxHashMap<BlockId, FlowStore<Q>> = FxHashMap::default();

    let mut worklist: VecDeque<BlockId> = VecDeque::new();
    let mut queued = FixedBitSet::with_capacity(cfg.id_bound());
    worklist.push_back(cfg.entry);
    queued.insert(cfg.entry.0);

    let mut iterations = 0usize;
    while let Some(id) = worklist.pop_front() {
        queued.set(id.0, false);
        iterations += 1;
        if iterations > max_iterations {
            debug!(
                function = %cfg.function_name,
                max_iterations,
                "fixpoint iteration cap hit"
            );
            return Ok(FixpointResult {
                entry_stores,
                iterations,
                converged: false,
            });
        }

        // Join the available incoming edge stores.
        let input = if id == cfg.entry {
            FlowStore::new()
        } else {
            let mut joined: Option<FlowStore<Q>> = None;
            for (pred, _) in cfg.predecessors(id) {
                if let Some(store) = edge_stores.get(&(*pred, id)) {
                    joined = Some(match joined {
                        None => store.clone(),
                        Some(acc) => acc.least_upper_bound(store)?,
                    });
                }
            }
            match joined {
                Some(store) => store,
                // No predecessor has produced a store yet.
                None => continue,
            }
        };
        trace!(
            function = %cfg.function_name,
            block = id.0,
            refinements = input.len(),
            "processing block"
        );
        entry_stores.insert(id, input.clone());

        let block = cfg.blocks.get(&id).ok_or_else(|| {
            QualError::Internal(format!("missing block {} in {}", id.0, cfg.function_name))
        })?;

        let mut store = input;
        for stmt in &block.statements {
            transfer.transfer_stmt(stmt, &mut store)?;
        }
        let result = match &block.terminator {
            Some(cond) => transfer.transfer_branch(cond, &store)?,
            None => TransferResult::Regular(store),
        };

        for (succ, edge_type) in cfg.successors(id) {
            let out = match edge_type {
                EdgeType::True => result.for_branch(true),
                EdgeType::False => result.for_branch(false),
                EdgeType::Unconditional | EdgeType::BackEdge => match &result {
                    TransferResult::Regular(store) => store,
                    TransferResult::Conditional { .. } => {
                        return Err(QualError::Internal(format!(
                            "conditional result on unconditional edge out of block {}",
                            id.0
                        )))
                    }
                },
            };
            let changed = edge_stores.get(&(id, *succ)) != Some(out);
            if changed {
                edge_stores.insert((id, *succ), out.clone());
                if !queued.contains(succ.0) {
                    worklist.push_back(*succ);
                    queued.insert(succ.0);
                }
            }
        }
    }

    debug!(
        function = %cfg.function_name,
        iterations,
        blocks = cfg.block_count(),
        "fixpoint converged"
    );
    Ok(FixpointResult {
        entry_stores,
        iterations,
        converged: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::CfgBuilder;
    use crate::flow::store::AccessPath;
    use crate::flow::transfer::FamilyAdapter;
    use crate::host::{CompilationUnit, Expr, FunctionModel, Stmt, StmtKind};
    use crate::qualifier::Nullness;
    use crate::qualtype::QualifiedType;

    struct NullnessAdapter;

    impl FamilyAdapter<Nullness> for NullnessAdapter {
        fn family_name(&self) -> &'static str {
            "nullness"
        }

        fn null_comparison_refinement(&self) -> Option<(Nullness, Nullness)> {
            Some((Nullness::Nullable, Nullness::NonNull))
        }
    }

    fn string(q: Nullness) -> QualifiedType<Nullness> {
        QualifiedType::declared(q, "java.lang.String")
    }

    fn run(f: &FunctionModel<Nullness>) -> (crate::cfg::Cfg, FixpointResult<Nullness>) {
        let cfg = CfgBuilder::build(f);
        let unit: CompilationUnit<Nullness> = CompilationUnit::new("Test.java");
        let transfer = QualTransfer::new(&NullnessAdapter, &unit, f);
        let result = run_fixpoint(&cfg, &transfer, DEFAULT_MAX_ITERATIONS).expect("fixpoint");
        (cfg, result)
    }

    #[test]
    fn linear_assignment_reaches_the_exit_store() {
        let mut f = FunctionModel::new("f", string(Nullness::NonNull));
        f.declare("s", string(Nullness::Nullable));
        f.body = vec![Stmt::new(
            StmtKind::Assign {
                target: Expr::local("s"),
                value: Expr::NullLit,
            },
            1,
        )];
        let (cfg, result) = run(&f);
        assert!(result.converged);
        let at_exit = result.store_at(cfg.exit);
        assert!(at_exit.get(&AccessPath::local("s")).expect("refined").is_null_type());
    }

    #[test]
    fn both_branches_refining_survives_the_join() {
        // if (s == null) { s = "lit"; } else { }  -- after the join,
        // s is non-null on both paths.
        let mut f = FunctionModel::new("f", string(Nullness::NonNull));
        f.declare("s", string(Nullness::Nullable));
        f.body = vec![Stmt::new(
            StmtKind::If {
                cond: Expr::IsNull {
                    operand: Box::new(Expr::local("s")),
                    negated: false,
                },
                then_body: vec![Stmt::new(
                    StmtKind::Assign {
                        target: Expr::local("s"),
                        value: Expr::Lit("\"lit\"".to_string()),
                    },
                    2,
                )],
                else_body: vec![],
            },
            1,
        )];
        let (cfg, result) = run(&f);
        assert!(result.converged);
        let at_exit = result.store_at(cfg.exit);
        assert_eq!(
            at_exit.get(&AccessPath::local("s")).map(|t| t.qualifier),
            Some(Nullness::NonNull)
        );
    }

    #[test]
    fn loop_reaches_a_fixpoint() {
        // while (s != null) { s = null; }  -- after the loop the false
        // edge says s == null, hence nullable.
        let mut f = FunctionModel::new("f", string(Nullness::NonNull));
        f.declare("s", string(Nullness::Nullable));
        f.body = vec![Stmt::new(
            StmtKind::While {
                cond: Expr::IsNull {
                    operand: Box::new(Expr::local("s")),
                    negated: true,
                },
                body: vec![Stmt::new(
                    StmtKind::Assign {
                        target: Expr::local("s"),
                        value: Expr::NullLit,
                    },
                    2,
                )],
            },
            1,
        )];
        let (cfg, result) = run(&f);
        assert!(result.converged);
        assert!(result.iterations < DEFAULT_MAX_ITERATIONS);
        let at_exit = result.store_at(cfg.exit);
        assert_eq!(
            at_exit.get(&AccessPath::local("s")).map(|t| t.qualifier),
            Some(Nullness::Nullable)
        );
    }

    #[test]
    fn narrowing_is_visible_inside_the_loop_body() {
        // while (s != null) { body }  -- in the body s is non-null.
        let mut f = FunctionModel::new("f", string(Nullness::NonNull));
        f.declare("s", string(Nullness::Nullable));
        f.body = vec![Stmt::new(
            StmtKind::While {
                cond: Expr::IsNull {
                    operand: Box::new(Expr::local("s")),
                    negated: true,
                },
                body: vec![Stmt::new(StmtKind::Expr(Expr::local("s")), 2)],
            },
            1,
        )];
        let (cfg, result) = run(&f);
        assert!(result.converged);
        let body = cfg
            .blocks
            .values()
            .find(|b| b.label == "body")
            .expect("loop body block");
        let in_body = result.store_at(body.id);
        assert_eq!(
            in_body.get(&AccessPath::local("s")).map(|t| t.qualifier),
            Some(Nullness::NonNull)
        );
    }
}
