//! Structured-type LUB/GLB propagation.
//!
//! Lifts the atomic qualifier operations of [`crate::qualifier`] to full
//! generic/array/wildcard type shapes: given two structurally compatible
//! types (same erasure), combines the qualifier at each corresponding
//! position recursively.
//!
//! Wildcard lower bounds are contravariant: the join of two types takes
//! the *meet* of their lower bounds, and vice versa.
//!
//! Inputs are never mutated; every operation returns a fresh value.
//! Erasure mismatches and arity mismatches are framework errors
//! ([`QualError`]): the host compiler only asks the engine to combine
//! types it already unified, so either indicates a bug in the adapter
//! layer, not in the analyzed code.

use crate::error::{QualError, Result};
use crate::qualifier::Qualifier;
use crate::qualtype::{QualifiedType, TypeShape};

/// Direction of a structural combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combine {
    Lub,
    Glb,
}

impl Combine {
    fn dual(self) -> Self {
        match self {
            Combine::Lub => Combine::Glb,
            Combine::Glb => Combine::Lub,
        }
    }

    fn apply<Q: Qualifier>(self, a: &Q, b: &Q) -> Q {
        match self {
            Combine::Lub => a.least_upper_bound(b),
            Combine::Glb => a.greatest_lower_bound(b),
        }
    }
}

/// Least upper bound of two structured types.
pub fn lub_types<Q: Qualifier>(
    a: &QualifiedType<Q>,
    b: &QualifiedType<Q>,
) -> Result<QualifiedType<Q>> {
    combine(a, b, Combine::Lub)
}

/// Greatest lower bound of two structured types.
pub fn glb_types<Q: Qualifier>(
    a: &QualifiedType<Q>,
    b: &QualifiedType<Q>,
) -> Result<QualifiedType<Q>> {
    combine(a, b, Combine::Glb)
}

/// Static type of a conditional (ternary) expression from its branches.
///
/// If one branch is the null-literal type, the result is the other
/// branch's type with the null branch's qualifier joined in; no lattice
/// walk over the structure is needed.
pub fn conditional_type<Q: Qualifier>(
    then_type: &QualifiedType<Q>,
    else_type: &QualifiedType<Q>,
) -> Result<QualifiedType<Q>> {
    lub_types(then_type, else_type)
}

fn combine<Q: Qualifier>(
    a: &QualifiedType<Q>,
    b: &QualifiedType<Q>,
    dir: Combine,
) -> Result<QualifiedType<Q>> {
    // Null-literal short circuit: the null type is below every reference
    // type, so it contributes only its qualifier.
    if a.is_null_type() && !b.is_null_type() {
        return Ok(match dir {
            Combine::Lub => b.with_qualifier(dir.apply(&a.qualifier, &b.qualifier)),
            Combine::Glb => a.with_qualifier(dir.apply(&a.qualifier, &b.qualifier)),
        });
    }
    if b.is_null_type() && !a.is_null_type() {
        return combine(b, a, dir);
    }

    if !a.same_erasure(b) {
        return Err(QualError::ErasureMismatch {
            left: a.erasure(),
            right: b.erasure(),
        });
    }

    let qualifier = dir.apply(&a.qualifier, &b.qualifier);
    let shape = match (&a.shape, &b.shape) {
        (
            TypeShape::Declared { name, args: a_args },
            TypeShape::Declared { args: b_args, .. },
        ) => {
            if a_args.len() != b_args.len() {
                return Err(QualError::Internal(format!(
                    "arity mismatch combining {}: {} vs {} type arguments",
                    name,
                    a_args.len(),
                    b_args.len()
                )));
            }
            let args = a_args
                .iter()
                .zip(b_args.iter())
                .map(|(x, y)| combine(x, y, dir))
                .collect::<Result<Vec<_>>>()?;
            TypeShape::Declared {
                name: name.clone(),
                args,
            }
        }
        (TypeShape::Array { component: ca }, TypeShape::Array { component: cb }) => {
            TypeShape::Array {
                component: Box::new(combine(ca, cb, dir)?),
            }
        }
        (
            TypeShape::TypeVar { name, upper: ua },
            TypeShape::TypeVar { upper: ub, .. },
        ) => TypeShape::TypeVar {
            name: name.clone(),
            upper: Box::new(combine(ua, ub, dir)?),
        },
        (
            TypeShape::Wildcard { upper: ua, lower: la },
            TypeShape::Wildcard { upper: ub, lower: lb },
        ) => {
            let upper = match (ua, ub) {
                (Some(x), Some(y)) => Some(Box::new(combine(x, y, dir)?)),
                // Absent upper bound = unbounded above: the join loses the
                // other bound, the meet keeps it.
                (Some(x), None) | (None, Some(x)) => match dir {
                    Combine::Lub => None,
                    Combine::Glb => Some(x.clone()),
                },
                (None, None) => None,
            };
            // Lower bounds combine in the dual direction.
            let lower = match (la, lb) {
                (Some(x), Some(y)) => Some(Box::new(combine(x, y, dir.dual())?)),
                (Some(x), None) | (None, Some(x)) => match dir {
                    Combine::Lub => None,
                    Combine::Glb => Some(x.clone()),
                },
                (None, None) => None,
            };
            TypeShape::Wildcard { upper, lower }
        }
        (TypeShape::Primitive { name }, TypeShape::Primitive { .. }) => TypeShape::Primitive {
            name: name.clone(),
        },
        (TypeShape::NullType, TypeShape::NullType) => TypeShape::NullType,
        (sa, sb) => {
            // Same erasure but different shape kinds: adapter bug.
            return Err(QualError::Internal(format!(
                "shape kind mismatch combining {:?} with {:?}",
                std::mem::discriminant(sa),
                std::mem::discriminant(sb)
            )));
        }
    };

    Ok(QualifiedType { qualifier, shape })
}

/// Whether `sub` is assignable to a position declared as `sup`.
///
/// Top-level qualifiers are checked covariantly. Declared type arguments
/// are invariant, as in the host language's generics; array components
/// are covariant, matching the host's (unsound but mirrored) array
/// subtyping; wildcard and type-variable positions compare their bounds.
/// The null-literal type is assignable wherever its qualifier fits.
#[must_use]
pub fn is_subtype_types<Q: Qualifier>(sub: &QualifiedType<Q>, sup: &QualifiedType<Q>) -> bool {
    if sub.is_null_type() {
        return sub.qualifier.is_subtype(&sup.qualifier);
    }
    if !sub.qualifier.is_subtype(&sup.qualifier) {
        return false;
    }
    match (&sub.shape, &sup.shape) {
        (
            TypeShape::Declared { name: na, args: aa },
            TypeShape::Declared { name: nb, args: ab },
        ) => {
            na == nb
                && aa.len() == ab.len()
                && aa.iter().zip(ab.iter()).all(|(x, y)| invariant_eq(x, y))
        }
        (TypeShape::Array { component: ca }, TypeShape::Array { component: cb }) => {
            is_subtype_types(ca, cb)
        }
        (TypeShape::TypeVar { name: na, upper: ua }, TypeShape::TypeVar { name: nb, upper: ub }) => {
            na == nb && is_subtype_types(ua, ub)
        }
        // A concrete type is usable for a wildcard if it fits the bound.
        (_, TypeShape::Wildcard { upper, .. }) => match upper {
            Some(u) => is_subtype_types(sub, u),
            None => true,
        },
        (TypeShape::Primitive { name: na }, TypeShape::Primitive { name: nb }) => na == nb,
        _ => false,
    }
}

/// Invariant position equality: same shape, same qualifiers everywhere.
fn invariant_eq<Q: Qualifier>(a: &QualifiedType<Q>, b: &QualifiedType<Q>) -> bool {
    // Wildcard arguments are checked through capture conversion instead.
    if matches!(a.shape, TypeShape::Wildcard { .. }) || matches!(b.shape, TypeShape::Wildcard { .. })
    {
        return true;
    }
    a == b
}

/// A qualifier mismatch found during capture conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureMismatch {
    /// Index of the offending type argument.
    pub position: usize,
    /// Declared bound at that parameter.
    pub expected: String,
    /// Effective bound carried by the wildcard.
    pub found: String,
}

/// Check capture-converted wildcard bounds against declared parameter
/// bounds.
///
/// Each wildcard argument is captured as a fresh variable whose upper
/// bound is the wildcard's explicit bound, or the declared parameter
/// bound when the wildcard is unbounded. The captured bound's qualifier
/// must stay within the declared bound's qualifier; a mismatch is
/// reported, never silently resolved.
#[must_use]
pub fn check_capture_bounds<Q: Qualifier>(
    param_bounds: &[QualifiedType<Q>],
    args: &[QualifiedType<Q>],
) -> Vec<CaptureMismatch> {
    let mut mismatches = Vec::new();
    for (position, (bound, arg)) in param_bounds.iter().zip(args.iter()).enumerate() {
        if let TypeShape::Wildcard { upper, .. } = &arg.shape {
            let captured: &QualifiedType<Q> = match upper {
                Some(u) => u,
                None => bound,
            };
            if !captured.qualifier.is_subtype(&bound.qualifier) {
                mismatches.push(CaptureMismatch {
                    position,
                    expected: bound.to_string(),
                    found: captured.to_string(),
                });
            }
        }
    }
    mismatches
}
