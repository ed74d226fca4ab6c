//! The signedness qualifier family.
//!
//! Tracks whether an integral value is meant to be interpreted as signed
//! or unsigned, so that mixed-interpretation arithmetic can be rejected.
//!
//! ```text
//!          UnknownSignedness          (top)
//!            /         \
//!        Signed      Unsigned
//!            \         /
//!          SignedPositive             (valid under either reading)
//!               |
//!          SignednessBottom           (bottom)
//! ```
//!
//! `SignedPositive` is the meet of `Signed` and `Unsigned`: constants in
//! the non-negative range have the same bit pattern under both readings.

use serde::{Deserialize, Serialize};

use crate::qualifier::{AnnotationMirror, Qualifier};

/// Signedness interpretation of an integral value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signedness {
    /// Top: interpretation unknown.
    UnknownSignedness,
    /// Two's-complement signed interpretation.
    Signed,
    /// Unsigned interpretation.
    Unsigned,
    /// Compatible with both interpretations.
    SignedPositive,
    /// Bottom.
    SignednessBottom,
}

#[cfg(test)]
impl Signedness {
    /// Height in the lattice, for ordering comparable elements.
    fn level(self) -> u8 {
        match self {
            Signedness::SignednessBottom => 0,
            Signedness::SignedPositive => 1,
            Signedness::Signed | Signedness::Unsigned => 2,
            Signedness::UnknownSignedness => 3,
        }
    }
}

impl Qualifier for Signedness {
    fn top() -> Self {
        Signedness::UnknownSignedness
    }

    fn bottom() -> Self {
        Signedness::SignednessBottom
    }

    fn is_subtype(&self, sup: &Self) -> bool {
        match (self, sup) {
            (a, b) if a == b => true,
            (Signedness::SignednessBottom, _) => true,
            (_, Signedness::UnknownSignedness) => true,
            (Signedness::SignedPositive, Signedness::Signed | Signedness::Unsigned) => true,
            // Signed and Unsigned are incomparable.
            _ => false,
        }
    }

    fn least_upper_bound(&self, other: &Self) -> Self {
        match (self, other) {
            (a, b) if a == b => *a,
            (a, b) if a.is_subtype(b) => *b,
            (a, b) if b.is_subtype(a) => *a,
            // The only incomparable pairs involve Signed vs Unsigned
            // (possibly through SignedPositive, which is below both).
            _ => Signedness::UnknownSignedness,
        }
    }

    fn greatest_lower_bound(&self, other: &Self) -> Self {
        match (self, other) {
            (a, b) if a == b => *a,
            (a, b) if a.is_subtype(b) => *a,
            (a, b) if b.is_subtype(a) => *b,
            (Signedness::Signed, Signedness::Unsigned)
            | (Signedness::Unsigned, Signedness::Signed) => Signedness::SignedPositive,
            _ => Signedness::SignednessBottom,
        }
    }

    fn from_annotation(anno: &AnnotationMirror) -> Option<Self> {
        match anno.name.as_str() {
            "UnknownSignedness" => Some(Signedness::UnknownSignedness),
            "Signed" => Some(Signedness::Signed),
            "Unsigned" => Some(Signedness::Unsigned),
            "SignedPositive" => Some(Signedness::SignedPositive),
            "SignednessBottom" => Some(Signedness::SignednessBottom),
            _ => None,
        }
    }
}

impl std::fmt::Display for Signedness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Signedness::UnknownSignedness => "@UnknownSignedness",
            Signedness::Signed => "@Signed",
            Signedness::Unsigned => "@Unsigned",
            Signedness::SignedPositive => "@SignedPositive",
            Signedness::SignednessBottom => "@SignednessBottom",
        };
        write!(f, "{}", name)
    }
}
