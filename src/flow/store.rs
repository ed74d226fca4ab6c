//! Access paths and the per-program-point refinement store.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::host::Expr;
use crate::propagate::lub_types;
use crate::qualifier::Qualifier;
use crate::qualtype::QualifiedType;

// =============================================================================
// Access paths
// =============================================================================

/// A trackable expression: a local variable followed by zero or more
/// field selections (`x`, `x.f`, `x.f.g`).
///
/// Only these shapes are refined by the flow analysis; calls and other
/// computed expressions are not stable enough to track.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessPath {
    pub base: String,
    pub fields: Vec<String>,
}

impl AccessPath {
    /// A bare local variable.
    #[must_use]
    pub fn local(name: &str) -> Self {
        Self {
            base: name.to_string(),
            fields: Vec::new(),
        }
    }

    /// Extend a path with one more field selection.
    #[must_use]
    pub fn select(&self, field: &str) -> Self {
        let mut fields = self.fields.clone();
        fields.push(field.to_string());
        Self {
            base: self.base.clone(),
            fields,
        }
    }

    /// Convert an expression into a path, if it has path shape.
    #[must_use]
    pub fn from_expr(expr: &Expr) -> Option<Self> {
        match expr {
            Expr::Local(name) => Some(Self::local(name)),
            Expr::Field { receiver, name } => {
                Some(Self::from_expr(receiver)?.select(name))
            }
            _ => None,
        }
    }

    /// Whether the path contains at least one field selection.
    #[must_use]
    pub fn is_field_path(&self) -> bool {
        !self.fields.is_empty()
    }

    /// Whether `self` is a (possibly improper) prefix of `other`: same
    /// base local, and every field selection of `self` starts `other`.
    /// A write through a path stales everything reached through it.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.base == other.base
            && self.fields.len() <= other.fields.len()
            && self.fields.iter().zip(other.fields.iter()).all(|(a, b)| a == b)
    }
}

impl fmt::Display for AccessPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)?;
        for field in &self.fields {
            write!(f, ".{}", field)?;
        }
        Ok(())
    }
}

/// Conservative may-alias test between two paths.
///
/// Distinct locals never alias (they are distinct stack slots). Field
/// paths may alias whenever their final field names agree, regardless of
/// the receiver chain: `a.f` and `b.f` could reach the same location.
#[must_use]
pub fn can_alias(a: &AccessPath, b: &AccessPath) -> bool {
    if a == b {
        return true;
    }
    match (a.fields.last(), b.fields.last()) {
        (Some(fa), Some(fb)) => fa == fb,
        _ => false,
    }
}

// =============================================================================
// Flow store
// =============================================================================

/// Refined qualified types at one program point, keyed by access path.
///
/// Absence of a path means "no refinement": the declared type applies.
/// Equality is structural, which is what the fixpoint driver uses for
/// change detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowStore<Q> {
    refinements: FxHashMap<AccessPath, QualifiedType<Q>>,
}

impl<Q> Default for FlowStore<Q> {
    fn default() -> Self {
        Self {
            refinements: FxHashMap::default(),
        }
    }
}

impl<Q: Qualifier> FlowStore<Q> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            refinements: FxHashMap::default(),
        }
    }

    /// Refined type of a path, if any.
    #[must_use]
    pub fn get(&self, path: &AccessPath) -> Option<&QualifiedType<Q>> {
        self.refinements.get(path)
    }

    /// Record (or replace) the refinement for a path.
    pub fn set(&mut self, path: AccessPath, ty: QualifiedType<Q>) {
        self.refinements.insert(path, ty);
    }

    /// Drop the refinement for a path.
    pub fn remove(&mut self, path: &AccessPath) {
        self.refinements.remove(path);
    }

    /// Invalidate every refinement that may alias the written path, and
    /// every refinement the written path is a prefix of (writing `x`
    /// stales `x.f`; writing `x.f` stales `x.f.g`). The written path
    /// itself is spared, the caller re-records it.
    pub fn kill_aliases(&mut self, written: &AccessPath) {
        self.refinements.retain(|path, _| {
            path == written || !(can_alias(path, written) || written.is_prefix_of(path))
        });
    }

    /// Invalidate every field-path refinement. Called after opaque
    /// method calls, which may write any field.
    pub fn kill_fields(&mut self) {
        self.refinements.retain(|path, _| !path.is_field_path());
    }

    /// Join with another store at a control-flow merge.
    ///
    /// Only paths refined on both sides survive, with their types
    /// combined by the structured LUB; a one-sided refinement reverts to
    /// the declared type, which the absence of an entry already means.
    pub fn least_upper_bound(&self, other: &Self) -> Result<Self> {
        let mut joined = FxHashMap::default();
        for (path, left) in &self.refinements {
            if let Some(right) = other.refinements.get(path) {
                joined.insert(path.clone(), lub_types(left, right)?);
            }
        }
        Ok(Self { refinements: joined })
    }

    /// Number of refined paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.refinements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.refinements.is_empty()
    }
}

// =============================================================================
// Transfer results
// =============================================================================

/// Outcome of transferring one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferResult<Q> {
    /// One successor store.
    Regular(FlowStore<Q>),
    /// Distinct stores for the true and false out-edges of a branch.
    Conditional {
        then_store: FlowStore<Q>,
        else_store: FlowStore<Q>,
    },
}

impl<Q: Qualifier> TransferResult<Q> {
    /// Store flowing along an edge of the given polarity.
    #[must_use]
    pub fn for_branch(&self, condition: bool) -> &FlowStore<Q> {
        match self {
            TransferResult::Regular(store) => store,
            TransferResult::Conditional {
                then_store,
                else_store,
            } => {
                if condition {
                    then_store
                } else {
                    else_store
                }
            }
        }
    }
}
