//! Flow-sensitive qualifier refinement.
//!
//! Threads refined qualified types through a control-flow graph. The
//! [`store::FlowStore`] maps receiver-qualified access paths to refined
//! types at one program point; branches duplicate it, join points merge
//! it with the structured-type LUB. The transfer function
//! ([`transfer::QualTransfer`]) produces per-node results that are either
//! `Regular` (one successor store) or `Conditional` (distinct then/else
//! stores after a null-check comparison).
//!
//! # Fixpoint
//!
//! [`fixpoint::run_fixpoint`] iterates a worklist until every edge store
//! stabilizes. The join is monotone on a finite lattice, so the loop
//! terminates; a defensive iteration cap guards against driver bugs.
//!
//! Unsupported node shapes abort the analysis with a framework error:
//! silently skipping a node would unsoundly drop refinements.

pub mod fixpoint;
pub mod store;
pub mod transfer;

pub use fixpoint::{run_fixpoint, FixpointResult};
pub use store::{can_alias, AccessPath, FlowStore, TransferResult};
pub use transfer::{FamilyAdapter, QualTransfer};
