//! Qualified structural types.
//!
//! A [`QualifiedType`] annotates every generic nesting level of a host
//! type with exactly one qualifier: the declared type itself, each type
//! argument, each array dimension, and each wildcard or type-variable
//! bound. Composite operations ([`crate::propagate`]) align positions
//! across two qualified types recursively.
//!
//! Values are plain data: cloning produces an independent copy, so cached
//! or stored types never alias a type owned by another dataflow fact.

use serde::{Deserialize, Serialize};

use crate::qualifier::Qualifier;

/// A host type annotated with one qualifier per position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualifiedType<Q> {
    /// Top-level qualifier at this position.
    pub qualifier: Q,
    /// Structural shape beneath the qualifier.
    pub shape: TypeShape<Q>,
}

/// Structural shape of a qualified type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeShape<Q> {
    /// Class or interface type, possibly generic.
    Declared {
        /// Fully qualified name (the erasure).
        name: String,
        /// Type arguments, empty for non-generic uses.
        args: Vec<QualifiedType<Q>>,
    },
    /// Array type.
    Array {
        /// Component type.
        component: Box<QualifiedType<Q>>,
    },
    /// Use of a type variable.
    TypeVar {
        /// Variable name as declared.
        name: String,
        /// Upper bound at this use.
        upper: Box<QualifiedType<Q>>,
    },
    /// Wildcard type argument.
    Wildcard {
        /// Explicit upper (extends) bound; `None` for an unbounded
        /// wildcard, whose effective bound comes from the declaration
        /// through capture conversion.
        upper: Option<Box<QualifiedType<Q>>>,
        /// Lower (super) bound, if any.
        lower: Option<Box<QualifiedType<Q>>>,
    },
    /// Primitive type.
    Primitive {
        /// Primitive name (`int`, `boolean`, ...).
        name: String,
    },
    /// The type of the null literal: bottom of the host type hierarchy.
    NullType,
}

impl<Q: Qualifier> QualifiedType<Q> {
    /// Non-generic declared type.
    #[must_use]
    pub fn declared(qualifier: Q, name: &str) -> Self {
        Self {
            qualifier,
            shape: TypeShape::Declared {
                name: name.to_string(),
                args: Vec::new(),
            },
        }
    }

    /// Generic declared type with type arguments.
    #[must_use]
    pub fn declared_with(qualifier: Q, name: &str, args: Vec<QualifiedType<Q>>) -> Self {
        Self {
            qualifier,
            shape: TypeShape::Declared {
                name: name.to_string(),
                args,
            },
        }
    }

    /// Array type.
    #[must_use]
    pub fn array(qualifier: Q, component: QualifiedType<Q>) -> Self {
        Self {
            qualifier,
            shape: TypeShape::Array {
                component: Box::new(component),
            },
        }
    }

    /// Primitive type.
    #[must_use]
    pub fn primitive(qualifier: Q, name: &str) -> Self {
        Self {
            qualifier,
            shape: TypeShape::Primitive {
                name: name.to_string(),
            },
        }
    }

    /// Use of a type variable with its effective upper bound.
    #[must_use]
    pub fn type_var(qualifier: Q, name: &str, upper: QualifiedType<Q>) -> Self {
        Self {
            qualifier,
            shape: TypeShape::TypeVar {
                name: name.to_string(),
                upper: Box::new(upper),
            },
        }
    }

    /// Wildcard with an explicit upper bound.
    #[must_use]
    pub fn wildcard_extends(qualifier: Q, upper: QualifiedType<Q>) -> Self {
        Self {
            qualifier,
            shape: TypeShape::Wildcard {
                upper: Some(Box::new(upper)),
                lower: None,
            },
        }
    }

    /// Unbounded wildcard.
    #[must_use]
    pub fn wildcard_unbounded(qualifier: Q) -> Self {
        Self {
            qualifier,
            shape: TypeShape::Wildcard {
                upper: None,
                lower: None,
            },
        }
    }

    /// The type of the null literal.
    #[must_use]
    pub fn null_type() -> Self {
        Self {
            qualifier: Q::null_qualifier(),
            shape: TypeShape::NullType,
        }
    }

    /// Whether this is the null-literal type.
    #[must_use]
    pub fn is_null_type(&self) -> bool {
        matches!(self.shape, TypeShape::NullType)
    }

    /// Erasure of this type, used to gate structural combination.
    #[must_use]
    pub fn erasure(&self) -> String {
        match &self.shape {
            TypeShape::Declared { name, .. } => name.clone(),
            TypeShape::Array { component } => format!("{}[]", component.erasure()),
            TypeShape::TypeVar { name, .. } => name.clone(),
            TypeShape::Wildcard { .. } => "?".to_string(),
            TypeShape::Primitive { name } => name.clone(),
            TypeShape::NullType => "null".to_string(),
        }
    }

    /// Whether two types have the same erasure.
    #[must_use]
    pub fn same_erasure(&self, other: &Self) -> bool {
        self.erasure() == other.erasure()
    }

    /// Copy of this type with a different top-level qualifier.
    #[must_use]
    pub fn with_qualifier(&self, qualifier: Q) -> Self {
        Self {
            qualifier,
            shape: self.shape.clone(),
        }
    }
}

impl<Q: Qualifier> std::fmt::Display for QualifiedType<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.shape {
            TypeShape::Declared { name, args } if args.is_empty() => {
                write!(f, "{} {}", self.qualifier, name)
            }
            TypeShape::Declared { name, args } => {
                let rendered: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{} {}<{}>", self.qualifier, name, rendered.join(", "))
            }
            TypeShape::Array { component } => write!(f, "{} {}[]", self.qualifier, component),
            TypeShape::TypeVar { name, .. } => write!(f, "{} {}", self.qualifier, name),
            TypeShape::Wildcard { upper, lower } => match (upper, lower) {
                (_, Some(l)) => write!(f, "{} ? super {}", self.qualifier, l),
                (Some(u), None) => write!(f, "{} ? extends {}", self.qualifier, u),
                (None, None) => write!(f, "{} ?", self.qualifier),
            },
            TypeShape::Primitive { name } => write!(f, "{} {}", self.qualifier, name),
            TypeShape::NullType => write!(f, "{} null", self.qualifier),
        }
    }
}
