//! Fixtures shared by unit tests.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use skill_primitives::Language;
use skill_sandbox::{
    PoolConfig, RunOutput, SandboxPool, SandboxProvider, SandboxResult, SandboxSession,
};
use skill_tools::ToolEvents;

use crate::host::{HostConfig, SkillHost};
use crate::native::NativeSkills;

pub(crate) const MATH: &str = r"
use skill_macros::tool;

/// Add two integers.
///
/// # Arguments
///
/// * `a` - left
/// * `b` - right
#[tool]
pub fn add(a: i64, b: i64) -> i64 {
    a + b
}

/// Roll a die in isolation.
#[tool(sandboxed, timeout = 5)]
pub fn roll() -> u32 {
    4
}
";

/// Answers every run with a harness-style result line.
pub(crate) struct EchoProvider;

struct EchoSession;

#[async_trait]
impl SandboxSession for EchoSession {
    async fn run(
        &self,
        code: &str,
        _libraries: &[String],
        _timeout: Duration,
    ) -> SandboxResult<RunOutput> {
        let report = json!({
            "success": true,
            "result": { "has_context": code.contains("SKILL_NAME") },
        });
        Ok(RunOutput {
            exit_code: 0,
            stdout: format!("SANDBOX_RESULT: {report}\n"),
            stderr: String::new(),
        })
    }

    async fn close(&self) -> SandboxResult<()> {
        Ok(())
    }
}

#[async_trait]
impl SandboxProvider for EchoProvider {
    async fn open(&self, _language: Language) -> SandboxResult<Box<dyn SandboxSession>> {
        Ok(Box::new(EchoSession))
    }
}

pub(crate) fn host(root: &Path) -> Arc<SkillHost> {
    let pool = SandboxPool::new(Arc::new(EchoProvider), PoolConfig::default());
    Arc::new(SkillHost::new(
        HostConfig::new(root),
        Arc::new(pool),
        Arc::new(NativeSkills::new()),
        Arc::new(ToolEvents::new()),
    ))
}

pub(crate) fn write_skill(root: &Path, name: &str, source: &str) {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("main.rs"), source).unwrap();
}
