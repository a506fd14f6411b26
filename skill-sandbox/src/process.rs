//! Sandbox provider that runs code as local child processes.
//!
//! Each session owns a temporary working directory that holds the program
//! and any libraries installed into it. Nothing here isolates the code from
//! the host; use it for development and tests, or behind a real container.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use skill_primitives::Language;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{SandboxError, SandboxResult};
use crate::preload::is_builtin_module;
use crate::provider::{RunOutput, SandboxProvider, SandboxSession};

/// Opens sessions backed by local interpreters and toolchains.
#[derive(Debug, Clone)]
pub struct LocalProcessProvider {
    programs: HashMap<Language, String>,
}

impl LocalProcessProvider {
    /// Uses `python3`, `node`, `cargo` and `go` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        let programs = [
            (Language::Python, "python3"),
            (Language::JavaScript, "node"),
            (Language::Rust, "cargo"),
            (Language::Go, "go"),
        ]
        .into_iter()
        .map(|(language, program)| (language, program.to_owned()))
        .collect();
        Self { programs }
    }

    /// Overrides the executable used for `language`.
    #[must_use]
    pub fn with_program(mut self, language: Language, program: impl Into<String>) -> Self {
        self.programs.insert(language, program.into());
        self
    }

    fn program(&self, language: Language) -> String {
        self.programs
            .get(&language)
            .cloned()
            .unwrap_or_else(|| language.as_str().to_owned())
    }
}

impl Default for LocalProcessProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SandboxProvider for LocalProcessProvider {
    async fn open(&self, language: Language) -> SandboxResult<Box<dyn SandboxSession>> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("skill-{language}-"))
            .tempdir()?;
        if language == Language::Go {
            tokio::fs::write(dir.path().join("go.mod"), "module sandbox\n\ngo 1.21\n").await?;
        }
        info!(%language, dir = %dir.path().display(), "opened local process session");

        Ok(Box::new(LocalProcessSession {
            language,
            program: self.program(language),
            dir: Mutex::new(Some(dir)),
            installed: Mutex::new(BTreeSet::new()),
        }))
    }
}

struct LocalProcessSession {
    language: Language,
    program: String,
    dir: Mutex<Option<TempDir>>,
    installed: Mutex<BTreeSet<String>>,
}

impl LocalProcessSession {
    fn workdir(&self) -> SandboxResult<PathBuf> {
        self.dir
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|dir| dir.path().to_path_buf())
            .ok_or(SandboxError::Closed)
    }

    fn missing(&self, libraries: &[String]) -> Vec<String> {
        let installed = self.installed.lock().unwrap_or_else(PoisonError::into_inner);
        libraries
            .iter()
            .filter(|lib| !is_builtin_module(self.language, lib) && !installed.contains(*lib))
            .cloned()
            .collect()
    }

    async fn install(
        &self,
        dir: &Path,
        libraries: &[String],
        timeout: Duration,
    ) -> SandboxResult<RunOutput> {
        debug!(language = %self.language, ?libraries, "installing libraries");
        let output = match self.language {
            Language::Python => {
                let mut args = vec!["-m", "pip", "install", "--quiet", "--target", "site"];
                args.extend(libraries.iter().map(String::as_str));
                exec(dir, &self.program, &args, timeout).await?
            }
            Language::JavaScript => {
                let mut args = vec!["install", "--silent", "--prefix", "."];
                args.extend(libraries.iter().map(String::as_str));
                exec(dir, "npm", &args, timeout).await?
            }
            Language::Rust => {
                let mut all = self.installed.lock().unwrap_or_else(PoisonError::into_inner).clone();
                all.extend(libraries.iter().cloned());
                tokio::fs::create_dir_all(dir.join("src")).await?;
                tokio::fs::write(dir.join("src/main.rs"), "fn main() {}\n").await?;
                tokio::fs::write(dir.join("Cargo.toml"), rust_manifest(&all)).await?;
                exec(dir, &self.program, &["fetch", "--quiet"], timeout).await?
            }
            Language::Go => {
                let mut args = vec!["get"];
                args.extend(libraries.iter().map(String::as_str));
                exec(dir, &self.program, &args, timeout).await?
            }
        };

        if output.success() {
            self.installed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend(libraries.iter().cloned());
        }
        Ok(output)
    }

    async fn execute(&self, dir: &Path, code: &str, timeout: Duration) -> SandboxResult<RunOutput> {
        match self.language {
            Language::Python => {
                tokio::fs::write(dir.join("main.py"), code).await?;
                exec(dir, &self.program, &["main.py"], timeout).await
            }
            Language::JavaScript => {
                tokio::fs::write(dir.join("main.js"), code).await?;
                exec(dir, &self.program, &["main.js"], timeout).await
            }
            Language::Rust => {
                let installed = self.installed.lock().unwrap_or_else(PoisonError::into_inner).clone();
                tokio::fs::create_dir_all(dir.join("src")).await?;
                tokio::fs::write(dir.join("Cargo.toml"), rust_manifest(&installed)).await?;
                tokio::fs::write(dir.join("src/main.rs"), code).await?;
                exec(dir, &self.program, &["run", "--quiet"], timeout).await
            }
            Language::Go => {
                tokio::fs::write(dir.join("main.go"), code).await?;
                exec(dir, &self.program, &["run", "main.go"], timeout).await
            }
        }
    }
}

#[async_trait]
impl SandboxSession for LocalProcessSession {
    async fn run(
        &self,
        code: &str,
        libraries: &[String],
        timeout: Duration,
    ) -> SandboxResult<RunOutput> {
        let dir = self.workdir()?;
        let missing = self.missing(libraries);
        if !missing.is_empty() {
            let installed = self.install(&dir, &missing, timeout).await?;
            if !installed.success() {
                return Ok(installed);
            }
        }
        self.execute(&dir, code, timeout).await
    }

    async fn close(&self) -> SandboxResult<()> {
        let dir = self.dir.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(dir) = dir {
            debug!(language = %self.language, "removing session directory");
            dir.close()?;
        }
        Ok(())
    }
}

async fn exec(dir: &Path, program: &str, args: &[&str], timeout: Duration) -> SandboxResult<RunOutput> {
    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(dir)
        .env("PYTHONPATH", dir.join("site"))
        .env("NODE_PATH", dir.join("node_modules"))
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let output = tokio::time::timeout(timeout, command.output())
        .await
        .map_err(|_| SandboxError::Timeout { bound: timeout })??;

    Ok(RunOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

fn rust_manifest(dependencies: &BTreeSet<String>) -> String {
    let mut manifest = String::from(
        "[package]\nname = \"sandbox\"\nversion = \"0.0.0\"\nedition = \"2021\"\n\n[dependencies]\n",
    );
    for dependency in dependencies {
        manifest.push_str(dependency);
        manifest.push_str(" = \"*\"\n");
    }
    manifest
}
