//! Per-language library defaults and preload snippets.

use skill_primitives::Language;

const PYTHON_STANDARD: &[&str] = &["requests", "json", "pathlib", "datetime", "os", "sys"];
const JAVASCRIPT_STANDARD: &[&str] = &["axios", "lodash", "moment"];

const PYTHON_BUILTINS: &[&str] = &["json", "pathlib", "datetime", "os", "sys", "time", "traceback"];
const PYTHON_PRELOADABLE: &[&str] = &[
    "requests",
    "json",
    "pathlib",
    "datetime",
    "os",
    "sys",
    "numpy",
    "pandas",
    "matplotlib",
    "seaborn",
];

/// Libraries every session of `language` is prepared with.
#[must_use]
pub const fn standard_libraries(language: Language) -> &'static [&'static str] {
    match language {
        Language::Python => PYTHON_STANDARD,
        Language::JavaScript => JAVASCRIPT_STANDARD,
        Language::Rust | Language::Go => &[],
    }
}

/// Returns `true` for modules that ship with the language and need no install.
#[must_use]
pub fn is_builtin_module(language: Language, library: &str) -> bool {
    match language {
        Language::Python => PYTHON_BUILTINS.contains(&library),
        Language::Rust => matches!(library, "std" | "core" | "alloc"),
        Language::JavaScript | Language::Go => false,
    }
}

/// Small program used to trigger library installation.
pub(crate) const fn install_probe(language: Language) -> &'static str {
    match language {
        Language::Python => "print('Installation complete')",
        Language::JavaScript => "console.log('Installation complete');",
        Language::Rust => "fn main() {\n    println!(\"Installation complete\");\n}\n",
        Language::Go => {
            "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tfmt.Println(\"Installation complete\")\n}\n"
        }
    }
}

/// Code that imports `libraries` so later runs skip the load cost.
///
/// Returns `None` when nothing in `libraries` is known to be preloadable.
#[must_use]
pub fn preload_code(language: Language, libraries: &[String]) -> Option<String> {
    let lines: Vec<String> = match language {
        Language::Python => libraries
            .iter()
            .filter(|lib| PYTHON_PRELOADABLE.contains(&lib.as_str()))
            .map(|lib| format!("import {lib}"))
            .collect(),
        Language::JavaScript => libraries
            .iter()
            .filter(|lib| JAVASCRIPT_STANDARD.contains(&lib.as_str()))
            .map(|lib| format!("const {lib} = require('{lib}');"))
            .collect(),
        Language::Rust | Language::Go => Vec::new(),
    };
    if lines.is_empty() {
        return None;
    }

    let done = match language {
        Language::JavaScript => "console.log('Libraries preloaded successfully');",
        _ => "print('Libraries preloaded successfully')",
    };
    Some(format!("{}\n{done}", lines.join("\n")))
}

/// Standard libraries merged with `requested`, sorted and de-duplicated.
pub(crate) fn merged_libraries(language: Language, requested: &[String]) -> Vec<String> {
    let mut libraries: Vec<String> = standard_libraries(language)
        .iter()
        .map(|lib| (*lib).to_owned())
        .chain(requested.iter().cloned())
        .collect();
    libraries.sort_unstable();
    libraries.dedup();
    libraries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_preload_imports_known_libraries_only() {
        let libraries = vec!["requests".to_owned(), "obscure".to_owned()];
        let code = preload_code(Language::Python, &libraries).unwrap();
        assert!(code.starts_with("import requests\n"));
        assert!(!code.contains("obscure"));
    }

    #[test]
    fn javascript_preload_requires_modules() {
        let code = preload_code(Language::JavaScript, &["lodash".to_owned()]).unwrap();
        assert!(code.contains("const lodash = require('lodash');"));
        assert!(preload_code(Language::Rust, &["serde".to_owned()]).is_none());
    }

    #[test]
    fn merges_standard_and_requested() {
        let merged = merged_libraries(Language::JavaScript, &["lodash".into(), "zod".into()]);
        assert_eq!(merged, vec!["axios", "lodash", "moment", "zod"]);
        assert!(is_builtin_module(Language::Python, "json"));
        assert!(!is_builtin_module(Language::Python, "requests"));
    }
}
