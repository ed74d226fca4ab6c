//! The internationalization (MessageFormat) qualifier family.
//!
//! Similar to [`crate::qualifier::format`], but for `MessageFormat`-style
//! strings, with two extra variants:
//!
//! - `FormatFor(ref)`: the string is a valid format for the argument list
//!   denoted by a contextual reference (a method-argument expression).
//!   Two distinct references are irreconcilable: no single value can
//!   satisfy both contextual bindings, so their meet collapses to bottom;
//!   their join cannot prove either binding and escapes to top.
//! - `FormatTemplate`: the bare, payload-free annotation as it appears on
//!   a declaration before the engine fills in categories. Meeting two bare
//!   templates cannot arise from well-typed input and fails fatally rather
//!   than being given a meaning.
//!
//! ```text
//!                    UnknownFormat                        (top)
//!            /        |           |         \
//!     Format([..]) Template  InvalidFormat  FormatFor(r)
//!            \        |           |         /
//!                    FormatBottom                         (bottom)
//! ```
//!
//! Conversion categories form the chain `GENERAL < DATE < NUMBER` (a
//! number-compatible argument is usable wherever a date-compatible one
//! is), with `UNUSED` as the neutral padding element.

use serde::{Deserialize, Serialize};

use crate::qualifier::format::join_messages;
use crate::qualifier::{AnnotationMirror, Qualifier};

/// Conversion category for one MessageFormat argument position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum I18nConversionCategory {
    /// Argument position not consumed; neutral padding element.
    Unused,
    /// No specific requirement.
    General,
    /// Date (or number) argument.
    Date,
    /// Number argument.
    Number,
}

impl I18nConversionCategory {
    /// Strictness rank along the chain. `UNUSED` is handled separately.
    fn rank(self) -> u8 {
        match self {
            I18nConversionCategory::Unused => 0,
            I18nConversionCategory::General => 1,
            I18nConversionCategory::Date => 2,
            I18nConversionCategory::Number => 3,
        }
    }

    /// Join: the stricter of the two requirements.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        match (self, other) {
            (I18nConversionCategory::Unused, x) | (x, I18nConversionCategory::Unused) => x,
            (a, b) => {
                if a.rank() >= b.rank() {
                    a
                } else {
                    b
                }
            }
        }
    }

    /// Meet: the weaker of the two requirements.
    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        match (self, other) {
            (I18nConversionCategory::Unused, x) | (x, I18nConversionCategory::Unused) => x,
            (a, b) => {
                if a.rank() <= b.rank() {
                    a
                } else {
                    b
                }
            }
        }
    }

    /// Whether `self` requires no more than `other`.
    #[must_use]
    pub fn is_contained_in(self, other: Self) -> bool {
        self == I18nConversionCategory::Unused || self.rank() <= other.rank()
    }

    /// Parse an annotation argument token.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "UNUSED" => Some(I18nConversionCategory::Unused),
            "GENERAL" => Some(I18nConversionCategory::General),
            "DATE" => Some(I18nConversionCategory::Date),
            "NUMBER" => Some(I18nConversionCategory::Number),
            _ => None,
        }
    }
}

impl std::fmt::Display for I18nConversionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            I18nConversionCategory::Unused => "UNUSED",
            I18nConversionCategory::General => "GENERAL",
            I18nConversionCategory::Date => "DATE",
            I18nConversionCategory::Number => "NUMBER",
        };
        write!(f, "{}", name)
    }
}

/// MessageFormat qualifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum I18nFormatQual {
    /// Top: nothing is known about the string.
    UnknownFormat,
    /// A valid format string with per-argument categories.
    Format(Vec<I18nConversionCategory>),
    /// The bare annotation, categories not yet filled in.
    FormatTemplate,
    /// A string known to be invalid, with the reason.
    InvalidFormat(String),
    /// A valid format string for the argument list denoted by the
    /// referenced expression.
    FormatFor(String),
    /// Bottom.
    FormatBottom,
}

impl Qualifier for I18nFormatQual {
    fn top() -> Self {
        I18nFormatQual::UnknownFormat
    }

    fn bottom() -> Self {
        I18nFormatQual::FormatBottom
    }

    fn is_subtype(&self, sup: &Self) -> bool {
        match (self, sup) {
            (I18nFormatQual::FormatBottom, _) => true,
            (_, I18nFormatQual::UnknownFormat) => true,
            (I18nFormatQual::Format(a), I18nFormatQual::Format(b)) => {
                a.len() <= b.len()
                    && a.iter().zip(b.iter()).all(|(ca, cb)| ca.is_contained_in(*cb))
            }
            (I18nFormatQual::InvalidFormat(m1), I18nFormatQual::InvalidFormat(m2)) => m1 == m2,
            (I18nFormatQual::FormatFor(r1), I18nFormatQual::FormatFor(r2)) => r1 == r2,
            (I18nFormatQual::FormatTemplate, I18nFormatQual::FormatTemplate) => true,
            _ => false,
        }
    }

    fn least_upper_bound(&self, other: &Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a.clone(),
            (I18nFormatQual::FormatBottom, x) | (x, I18nFormatQual::FormatBottom) => x.clone(),
            (I18nFormatQual::UnknownFormat, _) | (_, I18nFormatQual::UnknownFormat) => {
                I18nFormatQual::UnknownFormat
            }
            (I18nFormatQual::Format(a), I18nFormatQual::Format(b)) => {
                let len = a.len().max(b.len());
                let mut cats = Vec::with_capacity(len);
                for i in 0..len {
                    let ca = a.get(i).copied().unwrap_or(I18nConversionCategory::Unused);
                    let cb = b.get(i).copied().unwrap_or(I18nConversionCategory::Unused);
                    cats.push(ca.union(cb));
                }
                I18nFormatQual::Format(cats)
            }
            (I18nFormatQual::InvalidFormat(m1), I18nFormatQual::InvalidFormat(m2)) => {
                I18nFormatQual::InvalidFormat(join_messages(m1, m2, "or"))
            }
            // Distinct contextual bindings: cannot prove either holds.
            (I18nFormatQual::FormatFor(_), _) | (_, I18nFormatQual::FormatFor(_)) => {
                I18nFormatQual::UnknownFormat
            }
            _ => I18nFormatQual::UnknownFormat,
        }
    }

    fn greatest_lower_bound(&self, other: &Self) -> Self {
        // Meeting two bare templates cannot arise from well-typed input;
        // checked before the equality shortcut on purpose.
        if matches!(self, I18nFormatQual::FormatTemplate)
            && matches!(other, I18nFormatQual::FormatTemplate)
        {
            unreachable!("greatest lower bound of two bare format templates");
        }
        match (self, other) {
            (a, b) if a == b => a.clone(),
            (I18nFormatQual::UnknownFormat, x) | (x, I18nFormatQual::UnknownFormat) => x.clone(),
            (I18nFormatQual::FormatBottom, _) | (_, I18nFormatQual::FormatBottom) => {
                I18nFormatQual::FormatBottom
            }
            (I18nFormatQual::Format(a), I18nFormatQual::Format(b)) => {
                let cats = a
                    .iter()
                    .zip(b.iter())
                    .map(|(ca, cb)| ca.intersect(*cb))
                    .collect();
                I18nFormatQual::Format(cats)
            }
            (I18nFormatQual::InvalidFormat(m1), I18nFormatQual::InvalidFormat(m2)) => {
                I18nFormatQual::InvalidFormat(join_messages(m1, m2, "and"))
            }
            // No value satisfies two distinct contextual bindings.
            (I18nFormatQual::FormatFor(_), _) | (_, I18nFormatQual::FormatFor(_)) => {
                I18nFormatQual::FormatBottom
            }
            _ => I18nFormatQual::FormatBottom,
        }
    }

    fn from_annotation(anno: &AnnotationMirror) -> Option<Self> {
        match anno.name.as_str() {
            "I18nUnknownFormat" => Some(I18nFormatQual::UnknownFormat),
            "I18nFormatBottom" => Some(I18nFormatQual::FormatBottom),
            "I18nInvalidFormat" => Some(I18nFormatQual::InvalidFormat(
                anno.values.first().cloned().unwrap_or_default(),
            )),
            "I18nFormatFor" => Some(I18nFormatQual::FormatFor(
                anno.values.first().cloned().unwrap_or_default(),
            )),
            "I18nFormat" => {
                if anno.values.is_empty() {
                    return Some(I18nFormatQual::FormatTemplate);
                }
                let cats = anno
                    .values
                    .iter()
                    .map(|v| I18nConversionCategory::parse(v))
                    .collect::<Option<Vec<_>>>()?;
                Some(I18nFormatQual::Format(cats))
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for I18nFormatQual {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            I18nFormatQual::UnknownFormat => write!(f, "@I18nUnknownFormat"),
            I18nFormatQual::Format(cats) => {
                let names: Vec<String> = cats.iter().map(|c| c.to_string()).collect();
                write!(f, "@I18nFormat({{{}}})", names.join(", "))
            }
            I18nFormatQual::FormatTemplate => write!(f, "@I18nFormat"),
            I18nFormatQual::InvalidFormat(m) => write!(f, "@I18nInvalidFormat({})", m),
            I18nFormatQual::FormatFor(r) => write!(f, "@I18nFormatFor({})", r),
            I18nFormatQual::FormatBottom => write!(f, "@I18nFormatBottom"),
        }
    }
}
