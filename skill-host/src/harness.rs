//! Builds the program that runs one skill function inside a sandbox session,
//! and reads its result back.
//!
//! The skill source is re-emitted with its tool markers removed, followed by
//! a `main` that decodes named JSON arguments, calls the function and prints
//! exactly one `SANDBOX_RESULT: <json>` line.

use proc_macro2::{Literal, TokenStream};
use quote::{format_ident, quote};
use serde_json::Value;
use skill_scanner::{SkillFunctionMetadata, ToolMarker};
use skill_tools::{ToolError, ToolResult};
use syn::visit_mut::{self, VisitMut};
use syn::{File, Item, ItemFn, Type, UseTree};

use crate::native::SkillContext;

/// Prefix of the line carrying the function's result.
pub const RESULT_PREFIX: &str = "SANDBOX_RESULT:";

/// Crates every harness depends on.
const HARNESS_CRATES: &[&str] = &["serde", "serde_json"];

const STDERR_TAIL_LINES: usize = 10;

/// Generates the sandbox program for `function` called with `args`.
///
/// # Errors
///
/// Returns [`ToolError::Execution`] when the source no longer parses or a
/// parameter type cannot be re-read.
pub fn build_harness(
    source: &str,
    function: &SkillFunctionMetadata,
    context: &SkillContext,
    args: &Value,
) -> ToolResult<String> {
    let mut file = syn::parse_file(source).map_err(|err| {
        ToolError::execution(format!("skill `{}` no longer parses: {err}", function.skill))
    })?;
    StripMarkers.visit_file_mut(&mut file);
    file.items.retain(|item| !is_reserved(item));

    let mut decoders = Vec::with_capacity(function.params.len());
    let mut call_args = Vec::with_capacity(function.params.len());
    for param in &function.params {
        let ty: Type = syn::parse_str(&param.type_name).map_err(|err| {
            ToolError::execution(format!("parameter `{}` has unreadable type: {err}", param.name))
        })?;
        let ident = format_ident!("{}", param.name);
        let name = Literal::string(&param.name);
        let (owned, borrowed) = owned_type(&ty);
        decoders.push(quote! {
            let #ident: #owned = __decode(&args, #name)?;
        });
        call_args.push(if borrowed { quote!(&#ident) } else { quote!(#ident) });
    }

    let callee = format_ident!("{}", function.function);
    let call = if function.returns_result {
        quote!(#callee(#(#call_args),*).map_err(|err| err.to_string())?)
    } else {
        quote!(#callee(#(#call_args),*))
    };

    let skill_dir = Literal::string(&context.skill_dir().display().to_string());
    let skill_name = Literal::string(context.skill_name());
    let encoded_args = Literal::string(&args.to_string());
    let prefix = Literal::string(&format!("{RESULT_PREFIX} {{}}"));
    let entry = entry_point(&decoders, &call, &skill_dir, &skill_name, &encoded_args, &prefix);

    Ok(quote!(#file #entry).to_string())
}

/// Libraries a harness for a skill importing `imported` needs.
#[must_use]
pub fn harness_libraries(imported: &[String]) -> Vec<String> {
    let mut libraries: Vec<String> = imported
        .iter()
        .cloned()
        .chain(HARNESS_CRATES.iter().map(|name| (*name).to_owned()))
        .collect();
    libraries.sort_unstable();
    libraries.dedup();
    libraries
}

/// Extracts the function result from a harness run.
///
/// # Errors
///
/// Returns [`ToolError::Execution`] when the function reported failure or no
/// result line was printed, and [`ToolError::Serialization`] when the result
/// line is not valid JSON.
pub fn parse_output(stdout: &str, stderr: &str) -> ToolResult<Value> {
    let Some(line) = stdout
        .lines()
        .rev()
        .find_map(|line| line.trim_start().strip_prefix(RESULT_PREFIX))
    else {
        return Err(ToolError::execution(format!(
            "sandbox produced no result: {}",
            stderr_tail(stderr)
        )));
    };

    let report: Value = serde_json::from_str(line.trim())
        .map_err(|err| ToolError::serialization(format!("unparseable sandbox result: {err}")))?;
    if report.get("success").and_then(Value::as_bool) == Some(true) {
        return Ok(report.get("result").cloned().unwrap_or(Value::Null));
    }
    Err(ToolError::execution(
        report
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("sandboxed function failed"),
    ))
}

fn entry_point(
    decoders: &[TokenStream],
    call: &TokenStream,
    skill_dir: &Literal,
    skill_name: &Literal,
    encoded_args: &Literal,
    prefix: &Literal,
) -> TokenStream {
    quote! {
        #[allow(dead_code)]
        const SKILL_DIR: &str = #skill_dir;
        #[allow(dead_code)]
        const SKILL_NAME: &str = #skill_name;
        const __SANDBOX_ARGS: &str = #encoded_args;

        fn __decode<T: serde::de::DeserializeOwned>(
            args: &serde_json::Value,
            name: &str,
        ) -> Result<T, String> {
            let value = args.get(name).cloned().unwrap_or(serde_json::Value::Null);
            serde_json::from_value(value).map_err(|err| format!("invalid argument `{name}`: {err}"))
        }

        fn __run() -> Result<serde_json::Value, String> {
            let args: serde_json::Value =
                serde_json::from_str(__SANDBOX_ARGS).map_err(|err| err.to_string())?;
            #(#decoders)*
            let result = #call;
            serde_json::to_value(result).map_err(|err| format!("result is not serializable: {err}"))
        }

        fn main() {
            let report = match __run() {
                Ok(result) => serde_json::json!({ "success": true, "result": result }),
                Err(error) => serde_json::json!({ "success": false, "error": error }),
            };
            println!(#prefix, report);
        }
    }
}

/// Owned type to decode into, and whether the call site must borrow it.
fn owned_type(ty: &Type) -> (TokenStream, bool) {
    let Type::Reference(reference) = ty else {
        return (quote!(#ty), false);
    };
    let owned = match reference.elem.as_ref() {
        Type::Path(path) if path.path.is_ident("str") => quote!(String),
        Type::Slice(slice) => {
            let elem = &slice.elem;
            quote!(Vec<#elem>)
        }
        other => quote!(#other),
    };
    (owned, true)
}

fn is_reserved(item: &Item) -> bool {
    match item {
        Item::Fn(function) => function.sig.ident == "main",
        Item::Const(constant) => constant.ident == "SKILL_DIR" || constant.ident == "SKILL_NAME",
        Item::Use(item) => matches!(&item.tree, UseTree::Path(path) if path.ident == "skill_macros"),
        _ => false,
    }
}

struct StripMarkers;

impl VisitMut for StripMarkers {
    fn visit_item_fn_mut(&mut self, item: &mut ItemFn) {
        item.attrs.retain(|attr| !ToolMarker::is_marker(attr));
        visit_mut::visit_item_fn_mut(self, item);
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.trim().lines().collect();
    if lines.is_empty() {
        return "no output".to_owned();
    }
    lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n")
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use skill_scanner::scan_source;

    use super::*;

    const SOURCE: &str = r#"
use skill_macros::tool;
use regex::Regex;

/// Count words matching a pattern.
#[tool(sandboxed)]
pub fn count(text: &str, pattern: String, limit: Option<usize>) -> Result<usize, String> {
    let re = Regex::new(&pattern).map_err(|e| e.to_string())?;
    Ok(re.find_iter(text).take(limit.unwrap_or(usize::MAX)).count())
}

fn main() {}
"#;

    fn harness() -> File {
        let report = scan_source("words", SOURCE).unwrap();
        let context = SkillContext::new("/skills/words", "words");
        let code = build_harness(
            SOURCE,
            &report.functions[0],
            &context,
            &json!({"text": "a b", "pattern": "\\w"}),
        )
        .unwrap();
        syn::parse_file(&code).unwrap()
    }

    fn functions(file: &File) -> Vec<&ItemFn> {
        file.items
            .iter()
            .filter_map(|item| match item {
                Item::Fn(function) => Some(function),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn harness_is_valid_rust_without_markers() {
        let file = harness();
        let functions = functions(&file);
        let names: Vec<String> = functions.iter().map(|f| f.sig.ident.to_string()).collect();
        assert_eq!(names, vec!["count", "__decode", "__run", "main"]);
        assert!(functions[0].attrs.iter().all(|attr| !ToolMarker::is_marker(attr)));
        assert!(!file.items.iter().any(is_marker_import));
    }

    fn is_marker_import(item: &Item) -> bool {
        matches!(item, Item::Use(u) if matches!(&u.tree, UseTree::Path(p) if p.ident == "skill_macros"))
    }

    #[test]
    fn harness_injects_context_and_decodes_owned_arguments() {
        let file = harness();
        let code = quote!(#file).to_string();
        assert!(code.contains("const SKILL_NAME : & str = \"words\""));
        assert!(code.contains("let text : String = __decode (& args , \"text\")"));
        assert!(code.contains("count (& text , pattern , limit) . map_err"));
    }

    #[test]
    fn libraries_include_harness_crates() {
        let libraries = harness_libraries(&["regex".to_owned(), "serde".to_owned()]);
        assert_eq!(libraries, vec!["regex", "serde", "serde_json"]);
    }

    #[test]
    fn parses_success_and_failure_reports() {
        let stdout = "noise\nSANDBOX_RESULT: {\"success\": true, \"result\": {\"n\": 2}}\n";
        assert_eq!(parse_output(stdout, "").unwrap(), json!({"n": 2}));

        let failed = "SANDBOX_RESULT: {\"success\": false, \"error\": \"bad pattern\"}";
        assert_eq!(
            parse_output(failed, "").unwrap_err(),
            ToolError::execution("bad pattern")
        );
    }

    #[test]
    fn missing_or_garbled_results() {
        let err = parse_output("", "thread 'main' panicked at src/main.rs\n").unwrap_err();
        assert!(err.to_string().contains("panicked"));

        let err = parse_output("SANDBOX_RESULT: {not json", "").unwrap_err();
        assert!(matches!(err, ToolError::Serialization { .. }));
    }
}
