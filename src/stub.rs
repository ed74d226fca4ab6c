//! Annotated stub files for library elements.
//!
//! Library methods compiled without qualifier annotations would default
//! to the hierarchy top everywhere. A stub file re-declares their
//! signatures with annotations, without touching the library source:
//!
//! ```text
//! package java.lang;
//!
//! class System {
//!     @Nullable String getenv(String name);
//! }
//! ```
//!
//! [`StubIndex`] parses stub text into element-keyed signature tables;
//! [`StubbedUnit`] layers an index under a compilation unit so that
//! explicit declarations in the unit win over stubbed ones.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{QualError, Result};
use crate::host::{CompilationUnit, FunctionModel, HostModel, MethodSig, TypeParam};
use crate::qualifier::{AnnotationMirror, Qualifier};
use crate::qualtype::{QualifiedType, TypeShape};

static PACKAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*package\s+([A-Za-z_][\w.]*)\s*;\s*$").expect("package pattern")
});
static CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:public\s+)?(?:class|interface)\s+([A-Za-z_]\w*)(?:<[^>]*>)?\s*\{\s*$")
        .expect("class pattern")
});
static METHOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<ret>.+?)\s+(?P<name>[A-Za-z_]\w*)\s*\((?P<params>.*)\)\s*;\s*$")
        .expect("method pattern")
});
static FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<ty>.+?)\s+(?P<name>[A-Za-z_]\w*)\s*;\s*$").expect("field pattern")
});
static ANNOTATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^@([A-Za-z_][\w.]*)(?:\((?P<values>.*)\))?$").expect("annotation pattern")
});

const PRIMITIVES: &[&str] = &[
    "int", "long", "short", "byte", "char", "boolean", "float", "double", "void",
];

/// Parsed stub signatures, keyed the same way [`CompilationUnit`] keys
/// its element tables.
#[derive(Debug, Clone, Default)]
pub struct StubIndex<Q> {
    /// `pkg.Class#method(erasure,...)` to signature.
    methods: FxHashMap<String, MethodSig<Q>>,
    /// `pkg.Class#field` to declared type.
    fields: FxHashMap<String, QualifiedType<Q>>,
}

impl<Q: Qualifier> StubIndex<Q> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            methods: FxHashMap::default(),
            fields: FxHashMap::default(),
        }
    }

    /// Parse a stub file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let name = path.display().to_string();
        let index = Self::parse(&name, &text)?;
        debug!(
            file = %name,
            methods = index.methods.len(),
            fields = index.fields.len(),
            "loaded stub file"
        );
        Ok(index)
    }

    /// Parse stub text. `file` names the source for error messages.
    pub fn parse(file: &str, text: &str) -> Result<Self> {
        let mut index = Self::new();
        let mut package = String::new();
        let mut class: Option<String> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            if let Some(caps) = PACKAGE_RE.captures(line) {
                package = caps[1].to_string();
                continue;
            }
            if let Some(caps) = CLASS_RE.captures(line) {
                class = Some(format!("{}.{}", package, &caps[1]));
                continue;
            }
            if line == "}" {
                class = None;
                continue;
            }
            let owner = class.as_deref().ok_or_else(|| QualError::StubParse {
                file: file.to_string(),
                line: line_no,
                message: format!("member outside a class body: `{}`", line),
            })?;
            if let Some(caps) = METHOD_RE.captures(line) {
                let ret = parse_type::<Q>(&caps["ret"], file, line_no)?;
                let params = split_top_level(&caps["params"])
                    .iter()
                    .map(|p| parse_param::<Q>(p, file, line_no))
                    .collect::<Result<Vec<_>>>()?;
                let erasures: Vec<String> = params.iter().map(QualifiedType::erasure).collect();
                let key = format!("{}#{}({})", owner, &caps["name"], erasures.join(","));
                index.methods.insert(key, MethodSig { params, ret });
            } else if let Some(caps) = FIELD_RE.captures(line) {
                let ty = parse_type::<Q>(&caps["ty"], file, line_no)?;
                index
                    .fields
                    .insert(format!("{}#{}", owner, &caps["name"]), ty);
            } else {
                return Err(QualError::StubParse {
                    file: file.to_string(),
                    line: line_no,
                    message: format!("unrecognized member declaration: `{}`", line),
                });
            }
        }
        Ok(index)
    }

    #[must_use]
    pub fn method(&self, key: &str) -> Option<&MethodSig<Q>> {
        self.methods.get(key)
    }

    #[must_use]
    pub fn field(&self, owner_erasure: &str, name: &str) -> Option<&QualifiedType<Q>> {
        self.fields.get(&format!("{}#{}", owner_erasure, name))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len() + self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty() && self.fields.is_empty()
    }
}

/// Split a comma-separated list at angle-bracket depth zero.
fn split_top_level(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in s.chars() {
        match c {
            '<' | '(' => {
                depth += 1;
                current.push(c);
            }
            '>' | ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                out.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    let last = current.trim();
    if !last.is_empty() {
        out.push(last.to_string());
    }
    out
}

/// Parse a parameter, dropping an optional trailing parameter name.
fn parse_param<Q: Qualifier>(param: &str, file: &str, line: usize) -> Result<QualifiedType<Q>> {
    let tokens = tokenize_top_level(param);
    let plain: Vec<&String> = tokens.iter().filter(|t| !t.starts_with('@')).collect();
    let type_text = if plain.len() >= 2 {
        // Last bare token is the parameter name.
        let name = plain[plain.len() - 1].as_str();
        param
            .trim_end()
            .strip_suffix(name)
            .unwrap_or(param)
            .trim_end()
    } else {
        param.trim()
    };
    parse_type(type_text, file, line)
}

/// Whitespace tokenization at angle-bracket depth zero.
fn tokenize_top_level(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in s.chars() {
        match c {
            '<' | '(' => {
                depth += 1;
                current.push(c);
            }
            '>' | ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Parse one annotated type: `@Anno... Base<Args>[]...` or a wildcard.
fn parse_type<Q: Qualifier>(text: &str, file: &str, line: usize) -> Result<QualifiedType<Q>> {
    let err = |message: String| QualError::StubParse {
        file: file.to_string(),
        line,
        message,
    };

    let mut tokens = tokenize_top_level(text);
    let mut annotations = Vec::new();
    while tokens.first().is_some_and(|t| t.starts_with('@')) {
        let token = tokens.remove(0);
        let caps = ANNOTATION_RE
            .captures(&token)
            .ok_or_else(|| err(format!("malformed annotation `{}`", token)))?;
        let values = caps.name("values").map_or_else(Vec::new, |m| {
            split_top_level(m.as_str().trim_matches(|c| c == '{' || c == '}'))
                .into_iter()
                .map(|v| v.trim_matches('"').to_string())
                .collect()
        });
        annotations.push(AnnotationMirror {
            name: caps[1].to_string(),
            values,
        });
    }
    let qualifier = annotations
        .iter()
        .find_map(Q::from_annotation)
        .unwrap_or_else(Q::default_qualifier);

    let base = tokens.join(" ");
    if base.is_empty() {
        return Err(err(format!("missing type in `{}`", text)));
    }

    // Wildcards.
    if base == "?" {
        return Ok(QualifiedType::wildcard_unbounded(qualifier));
    }
    if let Some(bound) = base.strip_prefix("? extends ") {
        return Ok(QualifiedType::wildcard_extends(
            qualifier,
            parse_type(bound.trim(), file, line)?,
        ));
    }
    if let Some(bound) = base.strip_prefix("? super ") {
        return Ok(QualifiedType {
            qualifier,
            shape: TypeShape::Wildcard {
                upper: None,
                lower: Some(Box::new(parse_type(bound.trim(), file, line)?)),
            },
        });
    }

    // Trailing array dimensions.
    let mut dims = 0usize;
    let mut core = base.as_str();
    while let Some(stripped) = core.strip_suffix("[]") {
        dims += 1;
        core = stripped.trim_end();
    }

    let mut ty = if let Some(open) = core.find('<') {
        if !core.ends_with('>') {
            return Err(err(format!("unbalanced type arguments in `{}`", core)));
        }
        let name = &core[..open];
        let args = split_top_level(&core[open + 1..core.len() - 1])
            .iter()
            .map(|a| parse_type(a, file, line))
            .collect::<Result<Vec<_>>>()?;
        QualifiedType::declared_with(qualifier.clone(), name, args)
    } else if PRIMITIVES.contains(&core) {
        QualifiedType::primitive(qualifier.clone(), core)
    } else {
        QualifiedType::declared(qualifier.clone(), core)
    };

    for _ in 0..dims {
        ty = QualifiedType::array(Q::default_qualifier(), ty);
    }
    Ok(ty)
}

/// A compilation unit layered over a stub index. Element lookups try
/// the unit first; stub declarations fill the gaps.
pub struct StubbedUnit<'a, Q> {
    pub unit: &'a CompilationUnit<Q>,
    pub stubs: &'a StubIndex<Q>,
}

impl<'a, Q: Qualifier> StubbedUnit<'a, Q> {
    #[must_use]
    pub fn new(unit: &'a CompilationUnit<Q>, stubs: &'a StubIndex<Q>) -> Self {
        Self { unit, stubs }
    }
}

impl<Q: Qualifier> HostModel<Q> for StubbedUnit<'_, Q> {
    fn declared_type(&self, function: &str, local: &str) -> Option<&QualifiedType<Q>> {
        self.unit.declared_type(function, local)
    }

    fn method_signature(&self, key: &str) -> Option<&MethodSig<Q>> {
        self.unit
            .method_signature(key)
            .or_else(|| self.stubs.method(key))
    }

    fn field_type(&self, owner_erasure: &str, name: &str) -> Option<&QualifiedType<Q>> {
        self.unit
            .field_type(owner_erasure, name)
            .or_else(|| self.stubs.field(owner_erasure, name))
    }

    fn declared_annotations(&self, element: &str) -> &[AnnotationMirror] {
        self.unit.declared_annotations(element)
    }

    fn declaration_of(&self, function: &str) -> Option<&FunctionModel<Q>> {
        self.unit.declaration_of(function)
    }

    fn type_parameters(&self, erasure: &str) -> Option<&[TypeParam<Q>]> {
        self.unit.type_parameters(erasure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qualifier::Nullness;
    use std::io::Write;

    const STUB: &str = r#"
package java.lang;

class System {
    @Nullable String getenv(String name);
    @NonNull String lineSeparator();
}

class String {
    @NonNull String CASE_INSENSITIVE_ORDER;
}
"#;

    #[test]
    fn parses_methods_and_fields() {
        let index: StubIndex<Nullness> = StubIndex::parse("test.astub", STUB).expect("parse");
        let getenv = index
            .method("java.lang.System#getenv(String)")
            .expect("getenv");
        assert_eq!(getenv.ret.qualifier, Nullness::Nullable);
        assert_eq!(getenv.params.len(), 1);
        // Unannotated parameter defaults to the hierarchy top.
        assert_eq!(getenv.params[0].qualifier, Nullness::Nullable);

        let sep = index
            .method("java.lang.System#lineSeparator()")
            .expect("lineSeparator");
        assert_eq!(sep.ret.qualifier, Nullness::NonNull);

        let field = index
            .field("java.lang.String", "CASE_INSENSITIVE_ORDER")
            .expect("field");
        assert_eq!(field.qualifier, Nullness::NonNull);
    }

    #[test]
    fn generic_types_keep_argument_annotations() {
        let stub = "package java.util;\nclass Map {\n    @Nullable Map<@NonNull String, @Nullable String> copy(Map<String, String> m);\n}\n";
        let index: StubIndex<Nullness> = StubIndex::parse("map.astub", stub).expect("parse");
        let sig = index.method("java.util.Map#copy(Map)").expect("copy");
        match &sig.ret.shape {
            TypeShape::Declared { name, args } => {
                assert_eq!(name, "Map");
                assert_eq!(args[0].qualifier, Nullness::NonNull);
                assert_eq!(args[1].qualifier, Nullness::Nullable);
            }
            other => panic!("unexpected shape: {:?}", other),
        }
    }

    #[test]
    fn parse_error_reports_file_and_line() {
        let bad = "package p;\nclass C {\n    not a member\n}\n";
        let err = StubIndex::<Nullness>::parse("bad.astub", bad).expect_err("parse error");
        match err {
            QualError::StubParse { file, line, .. } => {
                assert_eq!(file, "bad.astub");
                assert_eq!(line, 3);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn member_outside_class_is_an_error() {
        let bad = "package p;\nString f();\n";
        assert!(StubIndex::<Nullness>::parse("bad.astub", bad).is_err());
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(STUB.as_bytes()).expect("write stub");
        let index: StubIndex<Nullness> = StubIndex::load(file.path()).expect("load");
        assert!(!index.is_empty());
        assert!(index.method("java.lang.System#getenv(String)").is_some());
    }

    #[test]
    fn unit_declarations_shadow_stubs() {
        let index: StubIndex<Nullness> = StubIndex::parse("test.astub", STUB).expect("parse");
        let mut unit: CompilationUnit<Nullness> = CompilationUnit::new("Test.java");
        unit.add_method(
            "java.lang.System#getenv(String)",
            MethodSig {
                params: vec![QualifiedType::declared(
                    Nullness::Nullable,
                    "java.lang.String",
                )],
                ret: QualifiedType::declared(Nullness::NonNull, "java.lang.String"),
            },
        );
        let host = StubbedUnit::new(&unit, &index);
        let sig = host
            .method_signature("java.lang.System#getenv(String)")
            .expect("signature");
        // The unit's non-null return wins over the stub's nullable one.
        assert_eq!(sig.ret.qualifier, Nullness::NonNull);
        // Elements only in the stub are still visible.
        assert!(host
            .method_signature("java.lang.System#lineSeparator()")
            .is_some());
    }
}
