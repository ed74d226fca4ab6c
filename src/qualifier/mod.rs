//! Type-qualifier families and their lattices.
//!
//! A qualifier is an immutable value from a fixed, finite alphabet refining
//! a base type (nullability, format validity, signedness). Qualifiers of
//! one family form a bounded lattice with a unique top (the "unknown" or
//! unannotated-safe element) and a unique bottom.
//!
//! The [`Qualifier`] trait carries the atomic-qualifier operations:
//! subtyping, least upper bound (join) and greatest lower bound (meet).
//! These are lifted to full generic/array/wildcard type shapes by
//! [`crate::propagate`].
//!
//! # Lattice contract
//!
//! For all qualifiers `a`, `b` of one family:
//! - `lub(a, b) == lub(b, a)` and `glb(a, b) == glb(b, a)`
//! - `lub(a, a) == a` and `glb(a, a) == a`
//! - `lub(a, bottom) == a`, `lub(a, top) == top`
//! - `glb(a, top) == a`, `glb(a, bottom) == bottom`
//!
//! Comparison is always structural (value equality on payloads). Top and
//! bottom are ordinary values, never interned singletons, so reconstructed
//! qualifiers compare correctly.

pub mod format;
pub mod i18n;
pub mod nullness;
pub mod signedness;

pub use format::{ConversionCategory, FormatQual};
pub use i18n::{I18nConversionCategory, I18nFormatQual};
pub use nullness::Nullness;
pub use signedness::Signedness;

use serde::{Deserialize, Serialize};

/// A compile-time annotation occurrence: simple name plus raw argument
/// tokens, as supplied by source models or stub files.
///
/// Examples: `@NonNull` is `name = "NonNull"`, no values;
/// `@Format({INT, CHAR})` is `name = "Format"`, `values = ["INT", "CHAR"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationMirror {
    /// Simple annotation name without the `@`.
    pub name: String,
    /// Raw argument tokens, already split and trimmed.
    pub values: Vec<String>,
}

impl AnnotationMirror {
    /// A marker annotation with no arguments.
    #[must_use]
    pub fn marker(name: &str) -> Self {
        Self {
            name: name.to_string(),
            values: Vec::new(),
        }
    }

    /// An annotation with argument tokens.
    #[must_use]
    pub fn with_values(name: &str, values: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            values: values.iter().map(|v| (*v).to_string()).collect(),
        }
    }
}

/// One qualifier family: a bounded lattice of immutable qualifier values.
pub trait Qualifier:
    Clone + PartialEq + Eq + std::fmt::Debug + std::fmt::Display + Send + Sync + 'static
{
    /// The unique top element (unknown / unannotated-safe).
    fn top() -> Self;

    /// The unique bottom element.
    fn bottom() -> Self;

    /// Whether `self` is a subtype of (at most as permissive as) `sup`.
    ///
    /// Never fails for well-formed same-family inputs.
    fn is_subtype(&self, sup: &Self) -> bool;

    /// Least upper bound (join). `bottom` is the identity, `top` absorbs.
    fn least_upper_bound(&self, other: &Self) -> Self;

    /// Greatest lower bound (meet). `top` is the identity, `bottom` absorbs.
    fn greatest_lower_bound(&self, other: &Self) -> Self;

    /// Construct a qualifier from an annotation mirror, if the annotation
    /// belongs to this family.
    fn from_annotation(anno: &AnnotationMirror) -> Option<Self>;

    /// Qualifier assumed for an unannotated position (defaults to top).
    fn default_qualifier() -> Self {
        Self::top()
    }

    /// Qualifier of the null literal in this family.
    ///
    /// Defaults to bottom (the null type is the bottom of the underlying
    /// type hierarchy); nullness overrides this, since `null` is the one
    /// value that *is* nullable.
    fn null_qualifier() -> Self {
        Self::bottom()
    }

    /// Whether this is the top element.
    fn is_top(&self) -> bool {
        *self == Self::top()
    }

    /// Whether this is the bottom element.
    fn is_bottom(&self) -> bool {
        *self == Self::bottom()
    }
}

#[cfg(test)]
pub(crate) mod test_laws {
    //! Shared lattice-law assertions, run against every family.

    use super::Qualifier;

    /// Assert the bounded-lattice laws over a sample alphabet.
    pub fn assert_lattice_laws<Q: Qualifier>(sample: &[Q]) {
        let top = Q::top();
        let bottom = Q::bottom();
        assert!(bottom.is_subtype(&top));

        for a in sample {
            // Idempotence.
            assert_eq!(&a.least_upper_bound(a), a, "lub({a}, {a})");
            assert_eq!(&a.greatest_lower_bound(a), a, "glb({a}, {a})");
            // Identity and absorption.
            assert_eq!(&a.least_upper_bound(&bottom), a, "lub({a}, bottom)");
            assert_eq!(a.least_upper_bound(&top), top, "lub({a}, top)");
            assert_eq!(&a.greatest_lower_bound(&top), a, "glb({a}, top)");
            assert_eq!(a.greatest_lower_bound(&bottom), bottom, "glb({a}, bottom)");
            // Bounds.
            assert!(bottom.is_subtype(a), "bottom <: {a}");
            assert!(a.is_subtype(&top), "{a} <: top");
            assert!(a.is_subtype(a), "{a} <: {a}");

            for b in sample {
                // Commutativity.
                assert_eq!(
                    a.least_upper_bound(b),
                    b.least_upper_bound(a),
                    "lub({a}, {b})"
                );
                assert_eq!(
                    a.greatest_lower_bound(b),
                    b.greatest_lower_bound(a),
                    "glb({a}, {b})"
                );
                // Subtyping is consistent with the join.
                if a.is_subtype(b) {
                    assert_eq!(&a.least_upper_bound(b), b, "{a} <: {b} but lub differs");
                }
            }
        }
    }
}
