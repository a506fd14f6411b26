//! Lazy invokers for scanned skill functions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use skill_primitives::{Language, SkillName};
use skill_sandbox::{SandboxError, SandboxPool};
use skill_scanner::SkillFunctionMetadata;
use skill_tools::{Invoker, Tool, ToolError, ToolResult};
use tracing::debug;

use crate::harness::{build_harness, parse_output};
use crate::native::{NativeSkills, SkillContext};

/// Runs a skill function through the sandbox pool.
pub(crate) struct SandboxedFunction {
    pub(crate) pool: Arc<SandboxPool>,
    pub(crate) skill: SkillName,
    pub(crate) metadata: SkillFunctionMetadata,
    pub(crate) source: Arc<str>,
    pub(crate) context: SkillContext,
    pub(crate) libraries: Vec<String>,
    pub(crate) timeout: Duration,
}

#[async_trait]
impl Tool for SandboxedFunction {
    async fn invoke(&self, input: Value) -> ToolResult<Value> {
        let code = build_harness(&self.source, &self.metadata, &self.context, &input)?;
        debug!(
            skill = %self.skill,
            function = %self.metadata.function,
            "dispatching to sandbox"
        );
        let output = self
            .pool
            .execute(
                &self.skill,
                Language::Rust,
                &code,
                &self.libraries,
                self.timeout,
            )
            .await
            .map_err(sandbox_failure)?;
        parse_output(&output.stdout, &output.stderr)
    }
}

/// Dispatches to the natively linked implementation, looked up per call.
pub(crate) fn native_invoker(
    natives: Arc<NativeSkills>,
    skill: SkillName,
    function: String,
    context: SkillContext,
) -> Invoker {
    Invoker::blocking(move |args| {
        natives
            .call(skill.as_str(), &function, &context, args)
            .unwrap_or_else(|| {
                Err(ToolError::execution(format!(
                    "no native implementation linked for `{skill}::{function}`"
                )))
            })
    })
}

fn sandbox_failure(err: SandboxError) -> ToolError {
    match err {
        SandboxError::Timeout { bound } => ToolError::TimeoutExceeded { bound },
        err if err.is_setup() => ToolError::isolation(err.to_string()),
        err => ToolError::execution(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sandbox_errors_map_to_tool_errors() {
        let bound = Duration::from_secs(3);
        assert_eq!(
            sandbox_failure(SandboxError::Timeout { bound }),
            ToolError::TimeoutExceeded { bound }
        );
        let setup = sandbox_failure(SandboxError::Setup {
            key: "math_rust".into(),
            reason: "no image".into(),
        });
        assert!(matches!(setup, ToolError::IsolationSetup { .. }));
        assert!(matches!(
            sandbox_failure(SandboxError::Closed),
            ToolError::Execution { .. }
        ));
    }

    #[test]
    fn missing_native_implementation_is_an_execution_error() {
        let invoker = native_invoker(
            Arc::new(NativeSkills::new()),
            SkillName::new("math").unwrap(),
            "add".into(),
            SkillContext::new("/skills/math", "math"),
        );
        let Invoker::Blocking(call) = invoker else {
            panic!("native invokers are blocking");
        };
        let err = call(Value::Null).unwrap_err();
        assert!(err.to_string().contains("math::add"));
    }
}
