//! Metadata extracted for each discovered tool function.

use std::time::Duration;

use serde::Serialize;
use skill_schema::{DeclaredType, ParamSpec, Signature, TypeTag};

/// One parameter of a scanned function.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScannedParam {
    /// Parameter name as written in the source.
    pub name: String,
    /// The Rust type as written, normalised for display.
    pub type_name: String,
    /// Declared type derived from the Rust type.
    pub declared: DeclaredType,
    /// Whether the parameter may be omitted (`Option<T>` parameters).
    pub has_default: bool,
}

/// Everything the host needs to register a tool without compiling its skill.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkillFunctionMetadata {
    /// Skill the function belongs to.
    pub skill: String,
    /// Function name.
    pub function: String,
    /// Ordered parameters.
    pub params: Vec<ScannedParam>,
    /// Declared return type; for `Result<T, E>` this is `T`.
    pub return_type: Option<DeclaredType>,
    /// The return type as written, if any.
    pub return_type_name: Option<String>,
    /// Whether the function returns a `Result`.
    pub returns_result: bool,
    /// Doc comment text with the leading `///` stripped.
    pub docstring: Option<String>,
    /// Set by `#[tool(sandboxed)]`.
    pub requires_isolation: bool,
    /// Per-tool timeout override from `#[tool(timeout = N)]`.
    pub timeout: Option<Duration>,
    /// 1-based source line of the function.
    pub line: usize,
}

impl SkillFunctionMetadata {
    /// Builds the declared signature under the given tool name.
    ///
    /// The description is the first paragraph of the docstring, falling back
    /// to a generic description when the function is undocumented.
    #[must_use]
    pub fn signature(&self, tool_name: &str) -> Signature {
        let mut signature = Signature::new(tool_name).with_description(self.summary());
        for param in &self.params {
            let mut spec = ParamSpec::new(&param.name, param.declared.clone());
            if param.has_default {
                spec = spec.with_default();
            }
            signature = signature.param(spec);
        }
        match &self.return_type {
            Some(ty) => signature.returns(ty.clone()),
            None => signature,
        }
    }

    /// Tag of the return type, when it resolves.
    #[must_use]
    pub fn return_tag(&self) -> Option<TypeTag> {
        self.return_type.as_ref().and_then(DeclaredType::tag)
    }

    /// Names of parameters that must be supplied.
    pub fn required_params(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|param| !param.has_default)
            .map(|param| param.name.as_str())
    }

    fn summary(&self) -> String {
        self.docstring
            .as_deref()
            .and_then(|doc| doc.split("\n\n").next())
            .map(|first| first.trim().replace('\n', " "))
            .filter(|first| !first.is_empty())
            .unwrap_or_else(|| format!("{} from skill {}", self.function, self.skill))
    }
}
