//! Source scanning: finds tagged functions and collects their metadata.

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::path::Path;

use serde::Serialize;
use syn::visit::Visit;
use syn::{
    Attribute, Expr, FnArg, Item, ItemFn, Lit, Meta, Pat, ReturnType, Type, TypeReference, UseTree,
};

use crate::error::{ScanError, ScanResult};
use crate::marker::ToolMarker;
use crate::metadata::{ScannedParam, SkillFunctionMetadata};
use crate::types::{map_type, render, result_ok_type};

/// Crate roots that never need installing in a sandbox.
const BUILTIN_CRATES: &[&str] = &["std", "core", "alloc", "crate", "self", "super", "skill_macros"];

/// Non-fatal finding reported while scanning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScanWarning {
    /// Function the warning applies to, or `None` for file-level findings.
    pub function: Option<String>,
    /// Human-readable message.
    pub message: String,
}

impl Display for ScanWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.function {
            Some(function) => write!(f, "{function}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Result of scanning one skill source file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Skill that was scanned.
    pub skill: String,
    /// Tagged functions in source order.
    pub functions: Vec<SkillFunctionMetadata>,
    /// Validation findings; never fatal.
    pub warnings: Vec<ScanWarning>,
    /// External crates the source imports, sorted and de-duplicated.
    pub imported_crates: Vec<String>,
}

impl ScanReport {
    /// Returns `true` when no tagged functions were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Reads and scans a skill source file.
///
/// # Errors
///
/// Returns [`ScanError::Io`] when the file cannot be read and
/// [`ScanError::Parse`] when it is not valid Rust.
pub fn scan_file(skill: &str, path: &Path) -> ScanResult<ScanReport> {
    let source = std::fs::read_to_string(path).map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    scan_source(skill, &source)
}

/// Scans skill source text for tagged tool functions.
///
/// Only top-level functions carrying the `#[tool]` marker are considered;
/// names starting with `_` are private and skipped. A file without tagged
/// functions yields an empty report.
///
/// # Errors
///
/// Returns [`ScanError::Parse`] with the offending line and column when the
/// source is not valid Rust or a marker is malformed.
pub fn scan_source(skill: &str, source: &str) -> ScanResult<ScanReport> {
    let file = syn::parse_file(source)?;

    let mut report = ScanReport {
        skill: skill.to_owned(),
        ..ScanReport::default()
    };
    let mut crates = BTreeSet::new();

    for item in &file.items {
        match item {
            Item::Fn(function) => {
                if let Some(marker) = ToolMarker::from_attrs(&function.attrs)? {
                    if function.sig.ident.to_string().starts_with('_') {
                        continue;
                    }
                    if let Some(metadata) = scan_function(skill, function, marker, &mut report) {
                        report.functions.push(metadata);
                    }
                }
            }
            Item::Use(item) => collect_use_roots(&item.tree, &mut crates),
            Item::ExternCrate(item) => {
                crates.insert(item.ident.to_string());
            }
            _ => {}
        }
    }

    if has_mixed_indentation(source) {
        report.warnings.push(ScanWarning {
            function: None,
            message: "mixed tabs and spaces in indentation".into(),
        });
    }

    report.imported_crates = crates
        .into_iter()
        .filter(|name| !BUILTIN_CRATES.contains(&name.as_str()))
        .collect();

    tracing::debug!(
        skill,
        functions = report.functions.len(),
        warnings = report.warnings.len(),
        "scanned skill source"
    );
    Ok(report)
}

fn scan_function(
    skill: &str,
    function: &ItemFn,
    marker: ToolMarker,
    report: &mut ScanReport,
) -> Option<SkillFunctionMetadata> {
    let name = function.sig.ident.to_string();
    if marker.sandboxed && function.sig.asyncness.is_some() {
        report
            .warnings
            .push(warning(&name, "async functions cannot run sandboxed; skipped"));
        return None;
    }
    let mut params = Vec::with_capacity(function.sig.inputs.len());

    for input in &function.sig.inputs {
        let FnArg::Typed(typed) = input else {
            report.warnings.push(warning(&name, "methods cannot be tools; skipped"));
            return None;
        };
        let Pat::Ident(ident) = typed.pat.as_ref() else {
            report
                .warnings
                .push(warning(&name, "destructured parameters are not supported; skipped"));
            return None;
        };
        // The sandbox decodes arguments into owned values; only a top-level
        // borrow can be taken from them at the call site.
        if marker.sandboxed && has_nested_reference(&typed.ty) {
            report.warnings.push(warning(
                &name,
                &format!(
                    "parameter `{}` borrows below the top level, which sandboxed functions cannot decode; skipped",
                    ident.ident
                ),
            ));
            return None;
        }
        let declared = map_type(&typed.ty);
        params.push(ScannedParam {
            name: ident.ident.to_string(),
            type_name: render(&typed.ty),
            has_default: declared.is_optional(),
            declared,
        });
    }

    let (return_type, return_type_name, returns_result) = match &function.sig.output {
        ReturnType::Default => (None, None, false),
        ReturnType::Type(_, ty) => match result_ok_type(ty) {
            Some(ok) => (Some(map_type(ok)), Some(render(ok)), true),
            None => (Some(map_type(ty)), Some(render(ty)), false),
        },
    };

    let docstring = doc_text(&function.attrs);
    match &docstring {
        None => report.warnings.push(warning(&name, "missing doc comment")),
        Some(doc) if !params.is_empty() && !doc.contains("# Arguments") => {
            report
                .warnings
                .push(warning(&name, "doc comment has no `# Arguments` section"));
        }
        Some(_) => {}
    }

    Some(SkillFunctionMetadata {
        skill: skill.to_owned(),
        function: name,
        params,
        return_type,
        return_type_name,
        returns_result,
        docstring,
        requires_isolation: marker.sandboxed,
        timeout: marker.timeout,
        line: function.sig.ident.span().start().line,
    })
}

fn warning(function: &str, message: &str) -> ScanWarning {
    ScanWarning {
        function: Some(function.to_owned()),
        message: message.to_owned(),
    }
}

/// Joins `///` doc lines, dropping the single leading space rustdoc adds.
fn doc_text(attrs: &[Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(expr) => match &expr.lit {
                    Lit::Str(text) => Some(text.value()),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        })
        .map(|line| line.strip_prefix(' ').map(str::to_owned).unwrap_or(line))
        .collect();
    let text = lines.join("\n");
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_owned())
}

fn has_nested_reference(ty: &Type) -> bool {
    struct FindReference(bool);

    impl<'ast> Visit<'ast> for FindReference {
        fn visit_type_reference(&mut self, _: &'ast TypeReference) {
            self.0 = true;
        }
    }

    let inner = match ty {
        Type::Reference(reference) => reference.elem.as_ref(),
        other => other,
    };
    let mut finder = FindReference(false);
    finder.visit_type(inner);
    finder.0
}

fn collect_use_roots(tree: &UseTree, crates: &mut BTreeSet<String>) {
    match tree {
        UseTree::Path(path) => {
            crates.insert(path.ident.to_string());
        }
        UseTree::Name(name) => {
            crates.insert(name.ident.to_string());
        }
        UseTree::Rename(rename) => {
            crates.insert(rename.ident.to_string());
        }
        UseTree::Group(group) => {
            for item in &group.items {
                collect_use_roots(item, crates);
            }
        }
        UseTree::Glob(_) => {}
    }
}

fn has_mixed_indentation(source: &str) -> bool {
    let mut tabs = false;
    let mut spaces = false;
    for line in source.lines() {
        let indent: String = line.chars().take_while(|c| *c == ' ' || *c == '\t').collect();
        tabs |= indent.contains('\t');
        spaces |= indent.contains(' ');
        if tabs && spaces {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use skill_schema::{DeclaredType, TypeTag, generate_schema};

    const MATH: &str = r#"
use std::collections::HashMap;
use serde_json::{json, Value};
use rand::Rng;
extern crate regex;

/// Add two numbers together.
///
/// # Arguments
///
/// * `a` - first operand
/// * `b` - second operand
#[tool]
pub fn add(a: i64, b: i64) -> i64 {
    a + b
}

/// Roll a die.
#[tool(sandboxed, timeout = 5)]
pub fn roll(sides: Option<u32>) -> Result<u32, String> {
    Ok(rand::thread_rng().gen_range(1..=sides.unwrap_or(6)))
}

#[tool]
fn _hidden() {}

fn helper(x: i32) -> i32 { x }
"#;

    #[test]
    fn finds_tagged_functions_in_order() {
        let report = scan_source("math", MATH).unwrap();
        let names: Vec<&str> = report.functions.iter().map(|f| f.function.as_str()).collect();
        assert_eq!(names, vec!["add", "roll"]);

        let add = &report.functions[0];
        assert_eq!(add.skill, "math");
        assert_eq!(add.required_params().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(add.return_tag(), Some(TypeTag::Integer));
        assert!(!add.requires_isolation);
        assert!(add.docstring.as_deref().unwrap().starts_with("Add two numbers together."));
        assert_eq!(add.line, 14);
    }

    #[test]
    fn marker_options_and_result_returns() {
        let report = scan_source("math", MATH).unwrap();
        let roll = &report.functions[1];
        assert!(roll.requires_isolation);
        assert_eq!(roll.timeout, Some(std::time::Duration::from_secs(5)));
        assert!(roll.returns_result);
        assert_eq!(roll.return_type, Some(DeclaredType::Integer));
        assert!(roll.params[0].has_default);
        assert_eq!(roll.params[0].type_name, "Option<u32>");
    }

    #[test]
    fn collects_external_crates_only() {
        let report = scan_source("math", MATH).unwrap();
        assert_eq!(report.imported_crates, vec!["rand", "regex", "serde_json"]);
    }

    #[test]
    fn warns_about_missing_argument_docs() {
        let report = scan_source("math", MATH).unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].function.as_deref(), Some("roll"));
    }

    #[test]
    fn undocumented_function_warns() {
        let report = scan_source("s", "#[tool]\nfn ping() -> bool { true }\n").unwrap();
        assert_eq!(report.functions.len(), 1);
        assert_eq!(report.warnings[0].message, "missing doc comment");
    }

    #[test]
    fn untagged_file_yields_empty_report() {
        let report = scan_source("s", "fn main() {}").unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn syntax_error_reports_location() {
        let err = scan_source("s", "fn ok() {}\nfn broken(x: ) {}\n").unwrap_err();
        assert!(matches!(err, ScanError::Parse { line: 2, .. }));
    }

    #[test]
    fn unknown_parameter_surfaces_at_schema_time() {
        let report = scan_source("s", "/// Draw.\n#[tool]\nfn draw(w: Widget) {}\n").unwrap();
        let meta = &report.functions[0];
        assert_eq!(meta.params[0].declared, DeclaredType::Unknown("Widget".into()));
        assert!(generate_schema(&meta.signature("s_draw")).is_err());
    }

    #[test]
    fn methods_are_skipped_with_warning() {
        let report = scan_source("s", "/// x\n#[tool]\nfn f(self) {}\n").unwrap();
        assert!(report.is_empty());
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn async_sandboxed_functions_are_skipped() {
        let source = "/// x\n#[tool(sandboxed)]\nasync fn fetch() -> u8 { 1 }\n\n/// y\n#[tool]\nasync fn local() -> u8 { 2 }\n";
        let report = scan_source("s", source).unwrap();
        let names: Vec<&str> = report.functions.iter().map(|f| f.function.as_str()).collect();
        assert_eq!(names, vec!["local"]);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].function.as_deref(), Some("fetch"));
    }

    #[test]
    fn sandboxed_parameters_only_borrow_at_the_top_level() {
        let source = r"
/// a
#[tool(sandboxed)]
fn top(text: &str, items: &[u32], name: String) {}

/// b
#[tool(sandboxed)]
fn maybe(text: Option<&str>) {}

/// c
#[tool(sandboxed)]
fn many(words: Vec<&str>) {}

/// d
#[tool(sandboxed)]
fn slices(words: &[&str]) {}

/// e
#[tool]
fn native(text: Option<&str>) {}
";
        let report = scan_source("s", source).unwrap();
        let names: Vec<&str> = report.functions.iter().map(|f| f.function.as_str()).collect();
        assert_eq!(names, vec!["top", "native"]);
        let skipped: Vec<&str> = report
            .warnings
            .iter()
            .filter(|w| w.message.ends_with("skipped"))
            .filter_map(|w| w.function.as_deref())
            .collect();
        assert_eq!(skipped, vec!["maybe", "many", "slices"]);
    }

    #[test]
    fn mixed_indentation_is_reported() {
        let source = "fn a() {\n\tlet x = 1;\n    let y = 2;\n}\n";
        let report = scan_source("s", source).unwrap();
        assert!(report.warnings.iter().any(|w| w.function.is_none()));
    }

    #[test]
    fn scan_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.rs");
        std::fs::write(&path, MATH).unwrap();
        assert_eq!(scan_file("math", &path).unwrap().functions.len(), 2);

        assert!(matches!(
            scan_file("math", &dir.path().join("missing.rs")),
            Err(ScanError::Io { .. })
        ));
    }
}
