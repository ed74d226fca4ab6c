//! The nullness qualifier family.
//!
//! Two elements: `Nullable` (top: the value may be null) and `NonNull`
//! (bottom: the value is known non-null).
//!
//! ```text
//!   Nullable      (top, unannotated-safe)
//!      |
//!   NonNull       (bottom)
//! ```

use serde::{Deserialize, Serialize};

use crate::qualifier::{AnnotationMirror, Qualifier};

/// Nullness of a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nullness {
    /// The value may be null.
    Nullable,
    /// The value is known to be non-null.
    NonNull,
}

impl Qualifier for Nullness {
    fn top() -> Self {
        Nullness::Nullable
    }

    fn bottom() -> Self {
        Nullness::NonNull
    }

    fn is_subtype(&self, sup: &Self) -> bool {
        match (self, sup) {
            (Nullness::NonNull, _) => true,
            (Nullness::Nullable, Nullness::Nullable) => true,
            (Nullness::Nullable, Nullness::NonNull) => false,
        }
    }

    fn least_upper_bound(&self, other: &Self) -> Self {
        if *self == Nullness::Nullable || *other == Nullness::Nullable {
            Nullness::Nullable
        } else {
            Nullness::NonNull
        }
    }

    fn greatest_lower_bound(&self, other: &Self) -> Self {
        if *self == Nullness::NonNull || *other == Nullness::NonNull {
            Nullness::NonNull
        } else {
            Nullness::Nullable
        }
    }

    fn from_annotation(anno: &AnnotationMirror) -> Option<Self> {
        match anno.name.as_str() {
            "Nullable" => Some(Nullness::Nullable),
            "NonNull" => Some(Nullness::NonNull),
            _ => None,
        }
    }

    fn null_qualifier() -> Self {
        // The null literal is the one value that is definitely nullable.
        Nullness::Nullable
    }
}

impl std::fmt::Display for Nullness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Nullness::Nullable => write!(f, "@Nullable"),
            Nullness::NonNull => write!(f, "@NonNull"),
        }
    }
}
