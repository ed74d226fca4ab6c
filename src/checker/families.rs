//! Adapters binding each qualifier family to the generic engine.

use crate::flow::transfer::{default_literal_type, string_literal_body, FamilyAdapter};
use crate::qualifier::{FormatQual, I18nFormatQual, Nullness, Qualifier, Signedness};
use crate::qualtype::QualifiedType;

/// Nullness checking: dereferences of possibly-null receivers plus
/// narrowing after null comparisons.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullnessChecker;

impl FamilyAdapter<Nullness> for NullnessChecker {
    fn family_name(&self) -> &'static str {
        "nullness"
    }

    fn null_comparison_refinement(&self) -> Option<(Nullness, Nullness)> {
        Some((Nullness::Nullable, Nullness::NonNull))
    }

    fn dereference_error(&self, qualifier: &Nullness) -> bool {
        *qualifier == Nullness::Nullable
    }
}

/// Printf-style format checking: string literals are parsed into their
/// conversion categories at the point of use.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormatChecker;

impl FamilyAdapter<FormatQual> for FormatChecker {
    fn family_name(&self) -> &'static str {
        "format"
    }

    fn literal_type(&self, text: &str) -> QualifiedType<FormatQual> {
        match string_literal_body(text) {
            Some(body) => {
                QualifiedType::declared(FormatQual::of_literal(body), "java.lang.String")
            }
            None => default_literal_type(text),
        }
    }
}

/// Message-catalog format checking. Literal validity depends on the
/// translation catalog, which this engine does not read, so string
/// literals stay at the hierarchy top.
#[derive(Debug, Default, Clone, Copy)]
pub struct I18nFormatChecker;

impl FamilyAdapter<I18nFormatQual> for I18nFormatChecker {
    fn family_name(&self) -> &'static str {
        "i18n-format"
    }

    fn literal_type(&self, text: &str) -> QualifiedType<I18nFormatQual> {
        if string_literal_body(text).is_some() {
            QualifiedType::declared(I18nFormatQual::top(), "java.lang.String")
        } else {
            default_literal_type(text)
        }
    }
}

/// Signedness checking: numeric literals carry their sign.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignednessChecker;

impl FamilyAdapter<Signedness> for SignednessChecker {
    fn family_name(&self) -> &'static str {
        "signedness"
    }

    fn literal_type(&self, text: &str) -> QualifiedType<Signedness> {
        if let Ok(value) = text.parse::<i64>() {
            let qualifier = if value >= 0 {
                Signedness::SignedPositive
            } else {
                Signedness::Signed
            };
            return QualifiedType::primitive(qualifier, "int");
        }
        if text.parse::<f64>().is_ok() && text.contains('.') {
            return QualifiedType::primitive(Signedness::Signed, "double");
        }
        default_literal_type(text)
    }
}
