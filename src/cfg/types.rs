//! CFG type definitions.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::host::{Expr, Stmt};

/// Unique identifier for a basic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub usize);

/// Role of a basic block in the control flow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    /// Function entry point.
    Entry,
    /// Function exit point.
    Exit,
    /// Conditional branch block (ends in a condition).
    Branch,
    /// Loop header (condition evaluation, join of entry and back edge).
    LoopHeader,
    /// Regular code block.
    #[default]
    Body,
}

/// A basic block: straight-line statements plus an optional branch
/// condition terminator.
#[derive(Debug, Clone)]
pub struct CfgBlock {
    pub id: BlockId,
    /// Human-readable label for debugging output.
    pub label: String,
    pub block_type: BlockType,
    /// Straight-line statements only; `If`/`While` never appear here,
    /// the builder consumes them.
    pub statements: Vec<Stmt>,
    /// Branch condition, present iff the block has True/False out-edges.
    pub terminator: Option<Expr>,
    /// Source line of the terminator, for diagnostics.
    pub terminator_line: usize,
}

/// Semantic type of a CFG edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// Unconditional edge (fallthrough, sequential).
    Unconditional,
    /// True branch of a conditional.
    True,
    /// False branch of a conditional.
    False,
    /// Back edge to a loop header.
    BackEdge,
}

/// An edge between two basic blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfgEdge {
    pub from: BlockId,
    pub to: BlockId,
    pub edge_type: EdgeType,
}

impl CfgEdge {
    #[must_use]
    pub fn unconditional(from: BlockId, to: BlockId) -> Self {
        Self {
            from,
            to,
            edge_type: EdgeType::Unconditional,
        }
    }
}

/// Control flow graph for one function.
#[derive(Debug, Clone)]
pub struct Cfg {
    pub function_name: String,
    pub blocks: FxHashMap<BlockId, CfgBlock>,
    pub edges: Vec<CfgEdge>,
    pub entry: BlockId,
    pub exit: BlockId,
    /// BlockId -> outgoing (target, edge type), built at construction.
    successors: FxHashMap<BlockId, Vec<(BlockId, EdgeType)>>,
    /// BlockId -> incoming (source, edge type).
    predecessors: FxHashMap<BlockId, Vec<(BlockId, EdgeType)>>,
}

impl Cfg {
    /// Assemble a CFG and its adjacency maps.
    #[must_use]
    pub fn new(
        function_name: String,
        blocks: FxHashMap<BlockId, CfgBlock>,
        edges: Vec<CfgEdge>,
        entry: BlockId,
        exit: BlockId,
    ) -> Self {
        let mut successors: FxHashMap<BlockId, Vec<(BlockId, EdgeType)>> = FxHashMap::default();
        let mut predecessors: FxHashMap<BlockId, Vec<(BlockId, EdgeType)>> = FxHashMap::default();
        for edge in &edges {
            successors
                .entry(edge.from)
                .or_default()
                .push((edge.to, edge.edge_type));
            predecessors
                .entry(edge.to)
                .or_default()
                .push((edge.from, edge.edge_type));
        }
        Self {
            function_name,
            blocks,
            edges,
            entry,
            exit,
            successors,
            predecessors,
        }
    }

    /// Outgoing edges of a block.
    #[must_use]
    pub fn successors(&self, id: BlockId) -> &[(BlockId, EdgeType)] {
        self.successors.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Incoming edges of a block.
    #[must_use]
    pub fn predecessors(&self, id: BlockId) -> &[(BlockId, EdgeType)] {
        self.predecessors.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Highest block id plus one, for bitset sizing.
    #[must_use]
    pub fn id_bound(&self) -> usize {
        self.blocks.keys().map(|b| b.0 + 1).max().unwrap_or(0)
    }
}
