//! The format-string qualifier family.
//!
//! Tracks whether a string is a valid printf-style format string and, if
//! so, which conversion category each argument position requires.
//!
//! # Lattice structure
//!
//! ```text
//!              UnknownFormat                  (top)
//!              /           \
//!      Format([...])   InvalidFormat(msg)
//!              \           /
//!              FormatBottom                   (bottom)
//! ```
//!
//! `Format` values carry an ordered sequence of per-argument
//! [`ConversionCategory`] tags. Sequences of different lengths are
//! comparable: the join pads the shorter one with the neutral `UNUSED`
//! category to the longer length, the meet truncates to the shorter length
//! (intersection of defined positions).
//!
//! Two `InvalidFormat` values with distinct messages are not directly
//! comparable; their meet synthesizes a new message with explicit "and"
//! semantics, their join the "or"-joined message. Operands are ordered
//! lexicographically so pairwise application order cannot change the
//! result.

use serde::{Deserialize, Serialize};

use crate::qualifier::{AnnotationMirror, Qualifier};

// =============================================================================
// Conversion categories
// =============================================================================

/// Conversion category required for one format-string argument position.
///
/// Each category stands for a set of conversion usages; `CHAR_AND_INT`
/// means the same argument is consumed by both a `%c`-style and a
/// `%d`-style conversion and must be compatible with either usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversionCategory {
    /// The argument position is not consumed at all. Neutral element for
    /// padding in the join.
    Unused,
    /// No specific requirement (`%s` and friends accept anything).
    General,
    /// Character conversion (`%c`).
    Char,
    /// Integral conversion (`%d`, `%o`, `%x`).
    Int,
    /// Floating-point conversion (`%e`, `%f`, `%g`, `%a`).
    Float,
    /// Date/time conversion (`%t`).
    Time,
    /// Consumed by both a character and an integral conversion.
    CharAndInt,
    /// Consumed by both an integral and a date/time conversion.
    IntAndTime,
}

impl ConversionCategory {
    const CHAR_BIT: u8 = 0b0001;
    const INT_BIT: u8 = 0b0010;
    const FLOAT_BIT: u8 = 0b0100;
    const TIME_BIT: u8 = 0b1000;

    /// Usage bitmask of this category. `UNUSED` and `GENERAL` carry no
    /// specific usage.
    fn mask(self) -> u8 {
        match self {
            ConversionCategory::Unused | ConversionCategory::General => 0,
            ConversionCategory::Char => Self::CHAR_BIT,
            ConversionCategory::Int => Self::INT_BIT,
            ConversionCategory::Float => Self::FLOAT_BIT,
            ConversionCategory::Time => Self::TIME_BIT,
            ConversionCategory::CharAndInt => Self::CHAR_BIT | Self::INT_BIT,
            ConversionCategory::IntAndTime => Self::INT_BIT | Self::TIME_BIT,
        }
    }

    /// The named category for a usage bitmask, if one exists.
    fn from_mask(mask: u8) -> Option<Self> {
        match mask {
            0 => Some(ConversionCategory::General),
            m if m == Self::CHAR_BIT => Some(ConversionCategory::Char),
            m if m == Self::INT_BIT => Some(ConversionCategory::Int),
            m if m == Self::FLOAT_BIT => Some(ConversionCategory::Float),
            m if m == Self::TIME_BIT => Some(ConversionCategory::Time),
            m if m == (Self::CHAR_BIT | Self::INT_BIT) => Some(ConversionCategory::CharAndInt),
            m if m == (Self::INT_BIT | Self::TIME_BIT) => Some(ConversionCategory::IntAndTime),
            _ => None,
        }
    }

    /// Join of two categories: accumulate usages.
    ///
    /// `None` means the combined usage set has no named tag (e.g.
    /// `CHAR ∪ FLOAT`); the caller escapes the whole qualifier to
    /// `UnknownFormat` (irreconcilable usage).
    #[must_use]
    pub fn union(self, other: Self) -> Option<Self> {
        match (self, other) {
            (ConversionCategory::Unused, x) | (x, ConversionCategory::Unused) => Some(x),
            (a, b) => Self::from_mask(a.mask() | b.mask()),
        }
    }

    /// Meet of two categories: shared usages.
    ///
    /// An empty intersection yields `GENERAL` (no specific requirement
    /// remains). Total: every intersection of named masks is named.
    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        match (self, other) {
            (ConversionCategory::Unused, x) | (x, ConversionCategory::Unused) => x,
            (a, b) => Self::from_mask(a.mask() & b.mask())
                .unwrap_or(ConversionCategory::General),
        }
    }

    /// Whether every usage of `self` is also a usage of `other`.
    #[must_use]
    pub fn is_contained_in(self, other: Self) -> bool {
        if self == ConversionCategory::Unused {
            return true;
        }
        self.mask() & other.mask() == self.mask()
    }

    /// Parse an annotation argument token (`"INT"`, `"CHAR_AND_INT"`, ...).
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "UNUSED" => Some(ConversionCategory::Unused),
            "GENERAL" => Some(ConversionCategory::General),
            "CHAR" => Some(ConversionCategory::Char),
            "INT" => Some(ConversionCategory::Int),
            "FLOAT" => Some(ConversionCategory::Float),
            "TIME" => Some(ConversionCategory::Time),
            "CHAR_AND_INT" => Some(ConversionCategory::CharAndInt),
            "INT_AND_TIME" => Some(ConversionCategory::IntAndTime),
            _ => None,
        }
    }

    /// Category required by one printf conversion character.
    #[must_use]
    pub fn from_conversion_char(c: char) -> Option<Self> {
        match c {
            'b' | 'B' | 'h' | 'H' | 's' | 'S' => Some(ConversionCategory::General),
            'c' | 'C' => Some(ConversionCategory::Char),
            'd' | 'o' | 'x' | 'X' => Some(ConversionCategory::Int),
            'e' | 'E' | 'f' | 'g' | 'G' | 'a' | 'A' => Some(ConversionCategory::Float),
            't' | 'T' => Some(ConversionCategory::Time),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConversionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConversionCategory::Unused => "UNUSED",
            ConversionCategory::General => "GENERAL",
            ConversionCategory::Char => "CHAR",
            ConversionCategory::Int => "INT",
            ConversionCategory::Float => "FLOAT",
            ConversionCategory::Time => "TIME",
            ConversionCategory::CharAndInt => "CHAR_AND_INT",
            ConversionCategory::IntAndTime => "INT_AND_TIME",
        };
        write!(f, "{}", name)
    }
}

// =============================================================================
// Qualifier
// =============================================================================

/// Format-string qualifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatQual {
    /// Top: nothing is known about the string.
    UnknownFormat,
    /// A valid format string with per-argument conversion categories.
    Format(Vec<ConversionCategory>),
    /// A string known to be an invalid format string, with the reason.
    InvalidFormat(String),
    /// Bottom.
    FormatBottom,
}

/// Join two message payloads with a conjunction, canonically.
///
/// Operands are flattened (an already-composite message of the same
/// conjunction contributes its leaves), deduplicated and sorted, so the
/// result depends only on the set of leaf messages. Shared with the
/// i18n family, whose invalid-format payloads combine the same way.
pub(crate) fn join_messages(m1: &str, m2: &str, conj: &str) -> String {
    let mut leaves: Vec<&str> = Vec::new();
    for m in [m1, m2] {
        leaves.extend(message_leaves(m, conj));
    }
    leaves.sort_unstable();
    leaves.dedup();
    if leaves.len() == 1 {
        return leaves[0].to_string();
    }
    let joined = leaves
        .iter()
        .map(|l| format!("\"{}\"", l))
        .collect::<Vec<_>>()
        .join(&format!(" {} ", conj));
    format!("({})", joined)
}

/// Split a canonical composite message back into its leaves.
fn message_leaves<'a>(msg: &'a str, conj: &str) -> Vec<&'a str> {
    let inner = match msg.strip_prefix("(\"").and_then(|m| m.strip_suffix("\")")) {
        Some(inner) => inner,
        None => return vec![msg],
    };
    let sep = format!("\" {} \"", conj);
    if inner.contains(&sep) {
        inner.split(&sep).collect()
    } else {
        vec![msg]
    }
}

/// Pairwise join of two category sequences; pads with `UNUSED`.
///
/// `None` when some position has no named joined tag.
fn lub_categories(
    a: &[ConversionCategory],
    b: &[ConversionCategory],
) -> Option<Vec<ConversionCategory>> {
    let len = a.len().max(b.len());
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let ca = a.get(i).copied().unwrap_or(ConversionCategory::Unused);
        let cb = b.get(i).copied().unwrap_or(ConversionCategory::Unused);
        out.push(ca.union(cb)?);
    }
    Some(out)
}

/// Pairwise meet of two category sequences; truncates to the shorter.
fn glb_categories(
    a: &[ConversionCategory],
    b: &[ConversionCategory],
) -> Vec<ConversionCategory> {
    a.iter()
        .zip(b.iter())
        .map(|(ca, cb)| ca.intersect(*cb))
        .collect()
}

impl Qualifier for FormatQual {
    fn top() -> Self {
        FormatQual::UnknownFormat
    }

    fn bottom() -> Self {
        FormatQual::FormatBottom
    }

    fn is_subtype(&self, sup: &Self) -> bool {
        match (self, sup) {
            (FormatQual::FormatBottom, _) => true,
            (_, FormatQual::UnknownFormat) => true,
            (FormatQual::Format(a), FormatQual::Format(b)) => {
                a.len() <= b.len()
                    && a.iter().zip(b.iter()).all(|(ca, cb)| ca.is_contained_in(*cb))
            }
            (FormatQual::InvalidFormat(m1), FormatQual::InvalidFormat(m2)) => m1 == m2,
            _ => false,
        }
    }

    fn least_upper_bound(&self, other: &Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a.clone(),
            (FormatQual::FormatBottom, x) | (x, FormatQual::FormatBottom) => x.clone(),
            (FormatQual::UnknownFormat, _) | (_, FormatQual::UnknownFormat) => {
                FormatQual::UnknownFormat
            }
            (FormatQual::Format(a), FormatQual::Format(b)) => match lub_categories(a, b) {
                Some(cats) => FormatQual::Format(cats),
                // Irreconcilable usage at some position: escape to top.
                None => FormatQual::UnknownFormat,
            },
            (FormatQual::InvalidFormat(m1), FormatQual::InvalidFormat(m2)) => {
                FormatQual::InvalidFormat(join_messages(m1, m2, "or"))
            }
            // Valid and invalid format strings share no upper bound below top.
            (FormatQual::Format(_), FormatQual::InvalidFormat(_))
            | (FormatQual::InvalidFormat(_), FormatQual::Format(_)) => FormatQual::UnknownFormat,
        }
    }

    fn greatest_lower_bound(&self, other: &Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a.clone(),
            (FormatQual::UnknownFormat, x) | (x, FormatQual::UnknownFormat) => x.clone(),
            (FormatQual::FormatBottom, _) | (_, FormatQual::FormatBottom) => {
                FormatQual::FormatBottom
            }
            (FormatQual::Format(a), FormatQual::Format(b)) => {
                FormatQual::Format(glb_categories(a, b))
            }
            (FormatQual::InvalidFormat(m1), FormatQual::InvalidFormat(m2)) => {
                FormatQual::InvalidFormat(join_messages(m1, m2, "and"))
            }
            (FormatQual::Format(_), FormatQual::InvalidFormat(_))
            | (FormatQual::InvalidFormat(_), FormatQual::Format(_)) => FormatQual::FormatBottom,
        }
    }

    fn from_annotation(anno: &AnnotationMirror) -> Option<Self> {
        match anno.name.as_str() {
            "UnknownFormat" => Some(FormatQual::UnknownFormat),
            "FormatBottom" => Some(FormatQual::FormatBottom),
            "InvalidFormat" => Some(FormatQual::InvalidFormat(
                anno.values.first().cloned().unwrap_or_default(),
            )),
            "Format" => {
                let cats = anno
                    .values
                    .iter()
                    .map(|v| ConversionCategory::parse(v))
                    .collect::<Option<Vec<_>>>()?;
                Some(FormatQual::Format(cats))
            }
            _ => None,
        }
    }
}

impl FormatQual {
    /// Qualifier of a string literal: parse it as a printf-style format
    /// string and record the per-argument categories, or the reason it is
    /// invalid.
    #[must_use]
    pub fn of_literal(text: &str) -> Self {
        match parse_format_specifiers(text) {
            Ok(cats) => FormatQual::Format(cats),
            Err(message) => FormatQual::InvalidFormat(message),
        }
    }
}

impl std::fmt::Display for FormatQual {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatQual::UnknownFormat => write!(f, "@UnknownFormat"),
            FormatQual::Format(cats) => {
                let names: Vec<String> = cats.iter().map(|c| c.to_string()).collect();
                write!(f, "@Format({{{}}})", names.join(", "))
            }
            FormatQual::InvalidFormat(m) => write!(f, "@InvalidFormat({})", m),
            FormatQual::FormatBottom => write!(f, "@FormatBottom"),
        }
    }
}

// =============================================================================
// Format-string literal parsing
// =============================================================================

/// Scan a printf-style format string into per-argument categories.
///
/// Handles `%[index$][flags][width][.precision]conversion`. Explicit
/// argument indices fill the corresponding position; sequential
/// conversions consume the next position. Positions consumed by more than
/// one conversion get the union of the required categories.
fn parse_format_specifiers(text: &str) -> std::result::Result<Vec<ConversionCategory>, String> {
    let mut cats: Vec<ConversionCategory> = Vec::new();
    let mut next_index = 0usize;
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '%' {
            i += 1;
            continue;
        }
        i += 1;
        if i >= chars.len() {
            return Err("format string ends with '%'".to_string());
        }
        // Literal percent and newline conversions consume no argument.
        if chars[i] == '%' || chars[i] == 'n' {
            i += 1;
            continue;
        }

        // Optional explicit argument index: digits followed by '$'.
        let digits_start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        let explicit = if i < chars.len() && chars[i] == '$' && i > digits_start {
            let idx: usize = chars[digits_start..i]
                .iter()
                .collect::<String>()
                .parse()
                .map_err(|_| "argument index out of range".to_string())?;
            if idx == 0 {
                return Err("illegal format argument index 0".to_string());
            }
            i += 1;
            Some(idx - 1)
        } else {
            // Digits were width, not an index: rewind.
            i = digits_start;
            None
        };

        // Flags, width and precision.
        while i < chars.len() && "-#+ 0,(".contains(chars[i]) {
            i += 1;
        }
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        if i < chars.len() && chars[i] == '.' {
            i += 1;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
        }

        if i >= chars.len() {
            return Err("incomplete format specifier".to_string());
        }
        let conv = chars[i];
        i += 1;
        // %tX carries a date/time suffix character.
        if (conv == 't' || conv == 'T') && i < chars.len() {
            i += 1;
        }
        let cat = ConversionCategory::from_conversion_char(conv)
            .ok_or_else(|| format!("invalid conversion character '{}'", conv))?;

        let position = explicit.unwrap_or_else(|| {
            let p = next_index;
            next_index += 1;
            p
        });
        if cats.len() <= position {
            cats.resize(position + 1, ConversionCategory::Unused);
        }
        // Same position consumed twice: the argument must satisfy both.
        cats[position] = cats[position]
            .union(cat)
            .ok_or_else(|| format!("argument {} used with incompatible conversions", position + 1))?;
    }

    Ok(cats)
}
