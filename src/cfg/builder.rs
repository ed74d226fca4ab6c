//! CFG construction from host statement lists.
//!
//! Lowers the structured statement AST of [`crate::host`] into basic
//! blocks. `If` splits into a branch block with True/False edges that
//! rejoin at a fresh block; `While` produces a loop-header block whose
//! body ends in a back edge; `Return` routes straight to the exit block.

use rustc_hash::FxHashMap;

use crate::cfg::types::{BlockId, BlockType, Cfg, CfgBlock, CfgEdge, EdgeType};
use crate::host::{FunctionModel, Stmt, StmtKind};

/// Builds a [`Cfg`] for one function.
pub struct CfgBuilder {
    blocks: FxHashMap<BlockId, CfgBlock>,
    edges: Vec<CfgEdge>,
    next_id: usize,
    exit: BlockId,
}

impl CfgBuilder {
    /// Lower a function body into a CFG.
    #[must_use]
    pub fn build<Q>(function: &FunctionModel<Q>) -> Cfg {
        let mut builder = Self {
            blocks: FxHashMap::default(),
            edges: Vec::new(),
            next_id: 0,
            exit: BlockId(0),
        };

        let entry = builder.new_block("entry", BlockType::Entry);
        builder.exit = builder.new_block("exit", BlockType::Exit);

        let last = builder.lower_sequence(entry, &function.body);
        if let Some(last) = last {
            builder
                .edges
                .push(CfgEdge::unconditional(last, builder.exit));
        }

        Cfg::new(
            function.name.clone(),
            builder.blocks,
            builder.edges,
            entry,
            builder.exit,
        )
    }

    fn new_block(&mut self, label: &str, block_type: BlockType) -> BlockId {
        let id = BlockId(self.next_id);
        self.next_id += 1;
        self.blocks.insert(
            id,
            CfgBlock {
                id,
                label: label.to_string(),
                block_type,
                statements: Vec::new(),
                terminator: None,
                terminator_line: 0,
            },
        );
        id
    }

    fn push_stmt(&mut self, block: BlockId, stmt: &Stmt) {
        self.blocks
            .get_mut(&block)
            .expect("block exists")
            .statements
            .push(stmt.clone());
    }

    /// Lower a statement sequence starting in `current`.
    ///
    /// Returns the block control falls out of, or `None` if the sequence
    /// always returns.
    fn lower_sequence(&mut self, mut current: BlockId, stmts: &[Stmt]) -> Option<BlockId> {
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::Decl { .. } | StmtKind::Assign { .. } | StmtKind::Expr(_) => {
                    self.push_stmt(current, stmt);
                }
                StmtKind::Return(_) => {
                    self.push_stmt(current, stmt);
                    self.edges.push(CfgEdge::unconditional(current, self.exit));
                    return None;
                }
                StmtKind::If {
                    cond,
                    then_body,
                    else_body,
                } => {
                    {
                        let block = self.blocks.get_mut(&current).expect("block exists");
                        block.block_type = BlockType::Branch;
                        block.terminator = Some(cond.clone());
                        block.terminator_line = stmt.line;
                    }

                    let then_block = self.new_block("then", BlockType::Body);
                    let else_block = self.new_block("else", BlockType::Body);
                    self.edges.push(CfgEdge {
                        from: current,
                        to: then_block,
                        edge_type: EdgeType::True,
                    });
                    self.edges.push(CfgEdge {
                        from: current,
                        to: else_block,
                        edge_type: EdgeType::False,
                    });

                    let then_end = self.lower_sequence(then_block, then_body);
                    let else_end = self.lower_sequence(else_block, else_body);

                    match (then_end, else_end) {
                        (None, None) => return None,
                        _ => {
                            let join = self.new_block("join", BlockType::Body);
                            for end in [then_end, else_end].into_iter().flatten() {
                                self.edges.push(CfgEdge::unconditional(end, join));
                            }
                            current = join;
                        }
                    }
                }
                StmtKind::While { cond, body } => {
                    let header = self.new_block("loop", BlockType::LoopHeader);
                    self.edges.push(CfgEdge::unconditional(current, header));
                    {
                        let block = self.blocks.get_mut(&header).expect("block exists");
                        block.terminator = Some(cond.clone());
                        block.terminator_line = stmt.line;
                    }

                    let body_block = self.new_block("body", BlockType::Body);
                    let after = self.new_block("after", BlockType::Body);
                    self.edges.push(CfgEdge {
                        from: header,
                        to: body_block,
                        edge_type: EdgeType::True,
                    });
                    self.edges.push(CfgEdge {
                        from: header,
                        to: after,
                        edge_type: EdgeType::False,
                    });

                    if let Some(body_end) = self.lower_sequence(body_block, body) {
                        self.edges.push(CfgEdge {
                            from: body_end,
                            to: header,
                            edge_type: EdgeType::BackEdge,
                        });
                    }
                    current = after;
                }
            }
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Expr, FunctionModel, Stmt, StmtKind};
    use crate::qualifier::Nullness;
    use crate::qualtype::QualifiedType;

    fn function(body: Vec<Stmt>) -> FunctionModel<Nullness> {
        let mut f = FunctionModel::new(
            "f",
            QualifiedType::primitive(Nullness::NonNull, "void"),
        );
        f.body = body;
        f
    }

    #[test]
    fn linear_body_is_one_block_into_exit() {
        let f = function(vec![
            Stmt::new(
                StmtKind::Decl {
                    name: "x".to_string(),
                    init: Some(Expr::Lit("1".to_string())),
                },
                1,
            ),
            Stmt::new(StmtKind::Expr(Expr::local("x")), 2),
        ]);
        let cfg = CfgBuilder::build(&f);
        assert_eq!(cfg.blocks[&cfg.entry].statements.len(), 2);
        assert_eq!(cfg.successors(cfg.entry), &[(cfg.exit, EdgeType::Unconditional)]);
    }

    #[test]
    fn if_else_splits_and_rejoins() {
        let f = function(vec![Stmt::new(
            StmtKind::If {
                cond: Expr::IsNull {
                    operand: Box::new(Expr::local("s")),
                    negated: false,
                },
                then_body: vec![Stmt::new(StmtKind::Expr(Expr::local("a")), 2)],
                else_body: vec![Stmt::new(StmtKind::Expr(Expr::local("b")), 4)],
            },
            1,
        )]);
        let cfg = CfgBuilder::build(&f);

        let entry_succs = cfg.successors(cfg.entry);
        assert_eq!(entry_succs.len(), 2);
        assert!(entry_succs.iter().any(|(_, e)| *e == EdgeType::True));
        assert!(entry_succs.iter().any(|(_, e)| *e == EdgeType::False));
        assert!(cfg.blocks[&cfg.entry].terminator.is_some());
        assert_eq!(cfg.blocks[&cfg.entry].block_type, BlockType::Branch);

        // Both arms rejoin at a single block that reaches the exit.
        let (then_block, _) = entry_succs[0];
        let join = cfg.successors(then_block)[0].0;
        assert_eq!(cfg.successors(join), &[(cfg.exit, EdgeType::Unconditional)]);
    }

    #[test]
    fn while_loop_has_back_edge() {
        let f = function(vec![
            Stmt::new(
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
            ),
        ]);
        let cfg = CfgBuilder::build(&f);
        assert!(cfg
            .edges
            .iter()
            .any(|e| e.edge_type == EdgeType::BackEdge));
        let header = cfg
            .blocks
            .values()
            .find(|b| b.block_type == BlockType::LoopHeader)
            .expect("loop header");
        assert_eq!(cfg.successors(header.id).len(), 2);
    }

    #[test]
    fn return_in_both_arms_leaves_no_fallthrough() {
        let f = function(vec![
            Stmt::new(
                StmtKind::If {
                    cond: Expr::IsNull {
                        operand: Box::new(Expr::local("s")),
                        negated: false,
                    },
                    then_body: vec![Stmt::new(StmtKind::Return(None), 2)],
                    else_body: vec![Stmt::new(StmtKind::Return(None), 4)],
                },
                1,
            ),
            // Unreachable trailing statement would need its own block; the
            // model simply has none here.
        ]);
        let cfg = CfgBuilder::build(&f);
        let exit_preds = cfg.predecessors(cfg.exit);
        assert_eq!(exit_preds.len(), 2);
    }
}
