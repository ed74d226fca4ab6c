//! Control flow graphs over host statements.
//!
//! The engine does not build CFGs from source text; the host compiler
//! (here, the in-memory [`crate::host`] model) supplies function bodies,
//! and [`builder::CfgBuilder`] lowers them into basic blocks with
//! `True`/`False` edges at branches and back edges at loops. The dataflow
//! fixpoint in [`crate::flow`] runs over this graph.
//!
//! # Modules
//!
//! - [`types`]: blocks, edges, graph with adjacency lookup
//! - [`builder`]: lowering of statement lists into a [`types::Cfg`]

pub mod builder;
pub mod types;

pub use builder::CfgBuilder;
pub use types::{BlockId, BlockType, Cfg, CfgBlock, CfgEdge, EdgeType};
