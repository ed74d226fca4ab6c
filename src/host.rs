//! Narrow interface to the host compiler, plus an in-memory model.
//!
//! The engine never touches a real compiler's AST or symbol tables. It
//! consumes exactly three capabilities, expressed by [`HostModel`]:
//! the declared type of a name, the declared annotations of an element,
//! and the source-level declaration of an element. An adapter per host
//! toolchain implements the trait; [`CompilationUnit`] is the in-memory
//! implementation the checkers and tests run against.
//!
//! Expressions and statements are one tagged variant each
//! ([`Expr`], [`StmtKind`]) with a single dispatch match in the transfer
//! function, instead of a visitor with one method per node kind.
//!
//! Method and field references are pre-resolved element keys
//! (`java.lang.String#toString()`): name resolution and overload
//! selection belong to the host compiler, not to this engine.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::qualifier::{AnnotationMirror, Qualifier};
use crate::qualtype::QualifiedType;

// =============================================================================
// Expressions and statements
// =============================================================================

/// Expression node kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// The null literal.
    NullLit,
    /// A non-null literal, carried as source text.
    Lit(String),
    /// Use of a local variable or parameter.
    Local(String),
    /// Field access `receiver.name`.
    Field {
        receiver: Box<Expr>,
        /// Simple field name; resolved against the receiver's erasure.
        name: String,
    },
    /// Method call. `method` is the resolved element key.
    Call {
        receiver: Option<Box<Expr>>,
        method: String,
        args: Vec<Expr>,
    },
    /// Conditional expression `cond ? then_expr : else_expr`.
    Ternary {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    /// Null comparison `operand == null` (or `!= null` when negated).
    IsNull { operand: Box<Expr>, negated: bool },
}

impl Expr {
    /// Convenience constructor for a local-variable use.
    #[must_use]
    pub fn local(name: &str) -> Self {
        Expr::Local(name.to_string())
    }

    /// Convenience constructor for `receiver.name`.
    #[must_use]
    pub fn field(receiver: Expr, name: &str) -> Self {
        Expr::Field {
            receiver: Box::new(receiver),
            name: name.to_string(),
        }
    }

    /// Convenience constructor for a call with a receiver.
    #[must_use]
    pub fn call_on(receiver: Expr, method: &str, args: Vec<Expr>) -> Self {
        Expr::Call {
            receiver: Some(Box::new(receiver)),
            method: method.to_string(),
            args,
        }
    }

    /// Convenience constructor for a receiverless (static) call.
    #[must_use]
    pub fn call(method: &str, args: Vec<Expr>) -> Self {
        Expr::Call {
            receiver: None,
            method: method.to_string(),
            args,
        }
    }

    /// Short node-kind name for error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::NullLit => "null literal",
            Expr::Lit(_) => "literal",
            Expr::Local(_) => "local",
            Expr::Field { .. } => "field access",
            Expr::Call { .. } => "call",
            Expr::Ternary { .. } => "ternary",
            Expr::IsNull { .. } => "null comparison",
        }
    }
}

/// Statement node kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StmtKind {
    /// Local declaration with optional initializer.
    Decl { name: String, init: Option<Expr> },
    /// Assignment to a local or field path.
    Assign { target: Expr, value: Expr },
    /// Expression statement.
    Expr(Expr),
    /// `if (cond) { then_body } else { else_body }`.
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    /// `while (cond) { body }`.
    While { cond: Expr, body: Vec<Stmt> },
    /// `return expr;`.
    Return(Option<Expr>),
}

/// A statement with its source line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    /// Source line (1-indexed).
    pub line: usize,
}

impl Stmt {
    #[must_use]
    pub fn new(kind: StmtKind, line: usize) -> Self {
        Self { kind, line }
    }
}

// =============================================================================
// Elements
// =============================================================================

/// Declared method signature: parameter and return types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSig<Q> {
    pub params: Vec<QualifiedType<Q>>,
    pub ret: QualifiedType<Q>,
}

/// A declared type parameter with its annotated bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeParam<Q> {
    pub name: String,
    pub bound: QualifiedType<Q>,
}

/// One function under analysis.
#[derive(Debug, Clone)]
pub struct FunctionModel<Q> {
    pub name: String,
    /// Declared types of parameters and locals, by name.
    pub locals: FxHashMap<String, QualifiedType<Q>>,
    pub return_type: QualifiedType<Q>,
    pub body: Vec<Stmt>,
}

impl<Q: Qualifier> FunctionModel<Q> {
    #[must_use]
    pub fn new(name: &str, return_type: QualifiedType<Q>) -> Self {
        Self {
            name: name.to_string(),
            locals: FxHashMap::default(),
            return_type,
            body: Vec::new(),
        }
    }

    /// Declare a local (or parameter) with its annotated type.
    pub fn declare(&mut self, name: &str, ty: QualifiedType<Q>) -> &mut Self {
        self.locals.insert(name.to_string(), ty);
        self
    }
}

/// One compilation unit: functions plus the element tables the engine
/// consults through [`HostModel`].
#[derive(Debug, Clone)]
pub struct CompilationUnit<Q> {
    pub name: String,
    pub functions: Vec<FunctionModel<Q>>,
    /// Method signatures by element key (`pkg.Class#method(...)`).
    pub methods: FxHashMap<String, MethodSig<Q>>,
    /// Field types by element key (`pkg.Class#field`).
    pub fields: FxHashMap<String, QualifiedType<Q>>,
    /// Type parameters of generic class declarations, by erasure.
    pub generics: FxHashMap<String, Vec<TypeParam<Q>>>,
    /// Declared annotations by element key.
    pub annotations: FxHashMap<String, Vec<AnnotationMirror>>,
}

impl<Q: Qualifier> CompilationUnit<Q> {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            functions: Vec::new(),
            methods: FxHashMap::default(),
            fields: FxHashMap::default(),
            generics: FxHashMap::default(),
            annotations: FxHashMap::default(),
        }
    }

    pub fn add_function(&mut self, function: FunctionModel<Q>) -> &mut Self {
        self.functions.push(function);
        self
    }

    pub fn add_method(&mut self, key: &str, sig: MethodSig<Q>) -> &mut Self {
        self.methods.insert(key.to_string(), sig);
        self
    }

    pub fn add_field(&mut self, key: &str, ty: QualifiedType<Q>) -> &mut Self {
        self.fields.insert(key.to_string(), ty);
        self
    }

    pub fn declare_generic(&mut self, erasure: &str, params: Vec<TypeParam<Q>>) -> &mut Self {
        self.generics.insert(erasure.to_string(), params);
        self
    }
}

// =============================================================================
// Host capability interface
// =============================================================================

/// The narrow view of the host compiler the engine is allowed to use.
pub trait HostModel<Q: Qualifier> {
    /// Declared (unrefined) type of a local in a function.
    fn declared_type(&self, function: &str, local: &str) -> Option<&QualifiedType<Q>>;

    /// Signature of a resolved method element, if known.
    fn method_signature(&self, key: &str) -> Option<&MethodSig<Q>>;

    /// Declared type of a resolved field element, if known.
    fn field_type(&self, owner_erasure: &str, name: &str) -> Option<&QualifiedType<Q>>;

    /// Declared annotations of an element.
    fn declared_annotations(&self, element: &str) -> &[AnnotationMirror];

    /// Source-level declaration of a function element, if available.
    ///
    /// Elements known only from binaries have no declaration here; their
    /// implicit bound annotations are not inferred, a deliberate
    /// asymmetry between source and bytecode elements.
    fn declaration_of(&self, function: &str) -> Option<&FunctionModel<Q>>;

    /// Type parameters of a generic class declaration, by erasure.
    fn type_parameters(&self, erasure: &str) -> Option<&[TypeParam<Q>]>;
}

impl<Q: Qualifier> HostModel<Q> for CompilationUnit<Q> {
    fn declared_type(&self, function: &str, local: &str) -> Option<&QualifiedType<Q>> {
        self.functions
            .iter()
            .find(|f| f.name == function)
            .and_then(|f| f.locals.get(local))
    }

    fn method_signature(&self, key: &str) -> Option<&MethodSig<Q>> {
        self.methods.get(key)
    }

    fn field_type(&self, owner_erasure: &str, name: &str) -> Option<&QualifiedType<Q>> {
        self.fields.get(&format!("{}#{}", owner_erasure, name))
    }

    fn declared_annotations(&self, element: &str) -> &[AnnotationMirror] {
        self.annotations.get(element).map_or(&[], Vec::as_slice)
    }

    fn declaration_of(&self, function: &str) -> Option<&FunctionModel<Q>> {
        self.functions.iter().find(|f| f.name == function)
    }

    fn type_parameters(&self, erasure: &str) -> Option<&[TypeParam<Q>]> {
        self.generics.get(erasure).map(Vec::as_slice)
    }
}
