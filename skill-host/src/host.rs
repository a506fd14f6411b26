//! Loading skill directories into tool registries.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use skill_primitives::{RegistryId, SkillName};
use skill_sandbox::SandboxPool;
use skill_scanner::{ScanWarning, SkillFunctionMetadata, scan_source};
use skill_schema::generate_schema;
use skill_tools::{Invoker, RegisteredTool, ToolEvents, ToolRegistry};
use tracing::{debug, info, warn};

use crate::error::{HostError, HostResult};
use crate::harness::harness_libraries;
use crate::invoker::{SandboxedFunction, native_invoker};
use crate::native::{NativeSkills, SkillContext};

/// Where skills live and how sandboxed calls are bounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    skills_dir: PathBuf,
    entry_file: String,
    sandbox_timeout: Duration,
}

impl HostConfig {
    /// Loads skills from `skills_dir` using `main.rs` entry files.
    #[must_use]
    pub fn new(skills_dir: impl Into<PathBuf>) -> Self {
        Self {
            skills_dir: skills_dir.into(),
            entry_file: "main.rs".to_owned(),
            sandbox_timeout: Duration::from_secs(60),
        }
    }

    /// Sets the entry file name looked up in each skill directory.
    #[must_use]
    pub fn with_entry_file(mut self, entry_file: impl Into<String>) -> Self {
        self.entry_file = entry_file.into();
        self
    }

    /// Sets the execution bound for sandboxed functions without their own timeout.
    #[must_use]
    pub const fn with_sandbox_timeout(mut self, timeout: Duration) -> Self {
        self.sandbox_timeout = timeout;
        self
    }

    /// Skills root directory.
    #[must_use]
    pub fn skills_dir(&self) -> &Path {
        &self.skills_dir
    }

    /// Entry file name.
    #[must_use]
    pub fn entry_file(&self) -> &str {
        &self.entry_file
    }

    /// Default sandbox execution bound.
    #[must_use]
    pub const fn sandbox_timeout(&self) -> Duration {
        self.sandbox_timeout
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self::new("./skills")
    }
}

/// A skill whose tools were registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadedSkill {
    /// Skill name.
    pub name: SkillName,
    /// Registered tool names, in source order.
    pub tools: Vec<String>,
    /// Functions that could not be registered.
    pub skipped: Vec<LoadFailure>,
    /// Source validation warnings.
    pub warnings: Vec<ScanWarning>,
    /// External crates the skill imports.
    pub imported_crates: Vec<String>,
}

/// A skill or function that failed to load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadFailure {
    /// Skill directory name.
    pub skill: String,
    /// Function name, when only one function failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    /// What went wrong.
    pub error: String,
}

impl LoadFailure {
    fn skill(skill: impl Into<String>, error: &impl fmt::Display) -> Self {
        Self {
            skill: skill.into(),
            function: None,
            error: error.to_string(),
        }
    }
}

/// Skills added or removed since a registry's previous load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkillChanges {
    /// Skills present now but not at the previous load.
    pub new_skills: Vec<SkillName>,
    /// Skills present at the previous load but gone now.
    pub removed_skills: Vec<SkillName>,
}

impl SkillChanges {
    /// Returns `true` when any skill appeared or disappeared.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.new_skills.is_empty() || !self.removed_skills.is_empty()
    }

    fn between(previous: &BTreeSet<SkillName>, current: &BTreeSet<SkillName>) -> Self {
        Self {
            new_skills: current.difference(previous).cloned().collect(),
            removed_skills: previous.difference(current).cloned().collect(),
        }
    }
}

/// Outcome of loading a skills directory into one registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Registry that was loaded.
    pub registry: RegistryId,
    /// Skills whose tools were registered.
    pub skills: Vec<LoadedSkill>,
    /// Skills that failed to load entirely.
    pub failures: Vec<LoadFailure>,
    /// Changes since this registry's previous load.
    #[serde(flatten)]
    pub changes: SkillChanges,
}

impl LoadReport {
    /// Total number of tools registered.
    #[must_use]
    pub fn tool_count(&self) -> usize {
        self.skills.iter().map(|skill| skill.tools.len()).sum()
    }

    /// Every registered tool name.
    pub fn tool_names(&self) -> impl Iterator<Item = &str> {
        self.skills
            .iter()
            .flat_map(|skill| skill.tools.iter().map(String::as_str))
    }
}

/// Loads skills from disk and keeps registries in step with them.
///
/// Registering a skill never runs it: sandboxed functions are routed through
/// the [`SandboxPool`] when called, and the rest dispatch to implementations
/// in the [`NativeSkills`] catalog.
pub struct SkillHost {
    pub(crate) config: HostConfig,
    pub(crate) pool: Arc<SandboxPool>,
    pub(crate) natives: Arc<NativeSkills>,
    pub(crate) events: Arc<ToolEvents>,
    pub(crate) loaded: Mutex<HashMap<RegistryId, BTreeSet<SkillName>>>,
}

impl fmt::Debug for SkillHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkillHost")
            .field("config", &self.config)
            .field("pool", &self.pool)
            .field("natives", &self.natives)
            .finish_non_exhaustive()
    }
}

impl SkillHost {
    /// Creates a host.
    #[must_use]
    pub fn new(
        config: HostConfig,
        pool: Arc<SandboxPool>,
        natives: Arc<NativeSkills>,
        events: Arc<ToolEvents>,
    ) -> Self {
        Self {
            config,
            pool,
            natives,
            events,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Returns the sandbox pool.
    #[must_use]
    pub fn pool(&self) -> &Arc<SandboxPool> {
        &self.pool
    }

    /// Returns the native implementation catalog.
    #[must_use]
    pub fn natives(&self) -> &Arc<NativeSkills> {
        &self.natives
    }

    /// Returns the change notifier.
    #[must_use]
    pub fn events(&self) -> &Arc<ToolEvents> {
        &self.events
    }

    /// Directory of `skill`.
    #[must_use]
    pub fn skill_dir(&self, skill: &SkillName) -> PathBuf {
        self.config.skills_dir.join(skill.as_str())
    }

    /// Loads every skill into `registry` and keeps it refreshed.
    ///
    /// The registry is published on the change notifier so that skills created
    /// through any other registry trigger a reload of this one.
    pub fn install(self: &Arc<Self>, registry: &Arc<ToolRegistry>) -> LoadReport {
        let host = Arc::clone(self);
        registry.on_reload(move |registry| {
            host.load_all(registry);
        });
        self.events.publish_registry(registry);
        self.load_all(registry)
    }

    /// Scans every skill directory and registers its tools as `<skill>_<function>`.
    ///
    /// A skill that fails to load is reported and skipped; its previously
    /// registered tools are left in place. Tools of skills whose directories
    /// disappeared since the previous load are removed.
    pub fn load_all(&self, registry: &ToolRegistry) -> LoadReport {
        let (present, failures) = self.discover();
        let mut report = LoadReport {
            registry: registry.id(),
            skills: Vec::new(),
            failures,
            changes: SkillChanges::default(),
        };

        for skill in &present {
            match self.load_skill(registry, skill) {
                Ok(loaded) => report.skills.push(loaded),
                Err(err) => {
                    warn!(%skill, error = %err, "skill failed to load");
                    report.failures.push(LoadFailure::skill(skill.as_str(), &err));
                }
            }
        }

        let current: BTreeSet<SkillName> = present.into_iter().collect();
        let previous = self
            .lock_loaded()
            .insert(registry.id(), current.clone())
            .unwrap_or_default();
        report.changes = SkillChanges::between(&previous, &current);
        for skill in &report.changes.removed_skills {
            registry.remove_skill_tools(skill);
        }

        info!(
            registry = %registry.id(),
            skills = report.skills.len(),
            tools = report.tool_count(),
            failures = report.failures.len(),
            new = report.changes.new_skills.len(),
            removed = report.changes.removed_skills.len(),
            "skills loaded"
        );
        report
    }

    /// Reports skills added or removed since `registry` last loaded, without loading.
    #[must_use]
    pub fn check_changes(&self, registry: &ToolRegistry) -> SkillChanges {
        let current: BTreeSet<SkillName> = self.discover().0.into_iter().collect();
        let previous = self
            .lock_loaded()
            .get(&registry.id())
            .cloned()
            .unwrap_or_default();
        SkillChanges::between(&previous, &current)
    }

    /// Reloads `registry` only when skills were added or removed.
    pub fn sync(&self, registry: &ToolRegistry) -> Option<LoadReport> {
        if self.check_changes(registry).has_changes() {
            Some(self.load_all(registry))
        } else {
            debug!(registry = %registry.id(), "no skill changes detected");
            None
        }
    }

    /// Scans one skill and registers its tools, replacing earlier registrations.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Io`] when the entry file cannot be read and
    /// [`HostError::Scan`] when it does not parse. Functions whose signatures
    /// cannot be turned into schemas are skipped, not errors.
    pub fn load_skill(&self, registry: &ToolRegistry, skill: &SkillName) -> HostResult<LoadedSkill> {
        let dir = self.skill_dir(skill);
        let path = dir.join(&self.config.entry_file);
        let source = std::fs::read_to_string(&path).map_err(|err| HostError::io(&path, err))?;
        let scan = scan_source(skill.as_str(), &source).map_err(|source| HostError::Scan {
            skill: skill.to_string(),
            source,
        })?;
        for warning in &scan.warnings {
            debug!(%skill, %warning, "skill source warning");
        }

        let source: Arc<str> = source.into();
        let context = SkillContext::new(&dir, skill.as_str());
        let libraries = harness_libraries(&scan.imported_crates);
        let mut loaded = LoadedSkill {
            name: skill.clone(),
            tools: Vec::with_capacity(scan.functions.len()),
            skipped: Vec::new(),
            warnings: scan.warnings,
            imported_crates: scan.imported_crates,
        };

        for function in scan.functions {
            let tool_name = format!("{skill}_{}", function.function);
            let schema = match generate_schema(&function.signature(&tool_name)) {
                Ok(schema) => schema,
                Err(err) => {
                    warn!(%skill, function = %function.function, error = %err, "function skipped");
                    loaded.skipped.push(LoadFailure {
                        skill: skill.to_string(),
                        function: Some(function.function.clone()),
                        error: err.to_string(),
                    });
                    continue;
                }
            };

            let entry = if function.requires_isolation {
                self.sandboxed_entry(schema, skill, function, &source, &context, &libraries)
            } else {
                let timeout = function.timeout;
                let invoker = native_invoker(
                    Arc::clone(&self.natives),
                    skill.clone(),
                    function.function,
                    context.clone(),
                );
                let entry = RegisteredTool::new(schema, invoker);
                match timeout {
                    Some(timeout) => entry.with_timeout(timeout),
                    None => entry,
                }
            };
            registry.register(entry.for_skill(skill.clone()));
            loaded.tools.push(tool_name);
        }

        for stale in registry.skill_tool_names(skill) {
            if !loaded.tools.contains(&stale) {
                registry.unregister(&stale);
            }
        }
        Ok(loaded)
    }

    fn sandboxed_entry(
        &self,
        schema: skill_schema::ToolSchema,
        skill: &SkillName,
        metadata: SkillFunctionMetadata,
        source: &Arc<str>,
        context: &SkillContext,
        libraries: &[String],
    ) -> RegisteredTool {
        let timeout = metadata.timeout.unwrap_or(self.config.sandbox_timeout);
        let pool_config = self.pool.config();
        // The caller's deadline also covers preparing a fresh session.
        let deadline = timeout + pool_config.install_timeout() + pool_config.preload_timeout();
        let function = SandboxedFunction {
            pool: Arc::clone(&self.pool),
            skill: skill.clone(),
            metadata,
            source: Arc::clone(source),
            context: context.clone(),
            libraries: libraries.to_vec(),
            timeout,
        };
        RegisteredTool::new(schema, Invoker::from_tool(function))
            .with_isolation(true)
            .with_timeout(deadline)
    }

    /// Lists skill directories that have an entry file, sorted by name.
    fn discover(&self) -> (Vec<SkillName>, Vec<LoadFailure>) {
        let root = &self.config.skills_dir;
        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = %root.display(), error = %err, "skills directory unavailable");
                return (Vec::new(), Vec::new());
            }
        };

        let mut skills = Vec::new();
        let mut failures = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !path.is_dir() {
                continue;
            }
            if !path.join(&self.config.entry_file).is_file() {
                debug!(skill = %name, "directory has no entry file; skipped");
                continue;
            }
            match SkillName::new(&name) {
                Ok(skill) => skills.push(skill),
                Err(err) => failures.push(LoadFailure::skill(name, &err)),
            }
        }
        skills.sort();
        (skills, failures)
    }

    pub(crate) fn lock_loaded(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<RegistryId, BTreeSet<SkillName>>> {
        self.loaded.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use skill_tools::{FailureKind, ToolOutput};

    use super::*;
    use crate::testing::{MATH, host, write_skill};

    #[tokio::test]
    async fn registers_scanned_functions_as_prefixed_tools() {
        let root = tempfile::tempdir().unwrap();
        write_skill(root.path(), "math", MATH);
        let host = host(root.path());
        let registry = Arc::new(ToolRegistry::new());

        let report = host.install(&registry);
        assert_eq!(registry.names(), vec!["math_add", "math_roll"]);
        assert_eq!(report.tool_count(), 2);
        assert_eq!(report.changes.new_skills, vec![SkillName::new("math").unwrap()]);
        assert!(report.failures.is_empty());

        let roll = registry.get("math_roll").unwrap();
        assert!(roll.requires_isolation());
        assert_eq!(roll.timeout(), Some(Duration::from_secs(5 + 120 + 60)));
        assert_eq!(roll.schema().required().count(), 0);
        let add = registry.get("math_add").unwrap();
        assert_eq!(add.schema().required().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn native_functions_dispatch_lazily() {
        let root = tempfile::tempdir().unwrap();
        write_skill(root.path(), "math", MATH);
        let host = host(root.path());
        let registry = ToolRegistry::new();
        host.load_all(&registry);

        let output = registry.invoke("math_add", json!({"a": 2, "b": 3})).await;
        assert_eq!(output.failure().unwrap().kind, FailureKind::Execution);

        host.natives().register("math", "add", |context, args| {
            assert_eq!(context.skill_name(), "math");
            Ok(json!(args["a"].as_i64().unwrap_or(0) + args["b"].as_i64().unwrap_or(0)))
        });
        let output = registry.invoke("math_add", json!({"a": 2, "b": 3})).await;
        assert_eq!(output, ToolOutput::Success(json!(5)));
    }

    #[tokio::test]
    async fn sandboxed_functions_run_through_the_pool() {
        let root = tempfile::tempdir().unwrap();
        write_skill(root.path(), "math", MATH);
        let host = host(root.path());
        let registry = ToolRegistry::new();
        host.load_all(&registry);

        let output = registry.invoke("math_roll", json!({})).await;
        assert_eq!(output, ToolOutput::Success(json!({"has_context": true})));
        assert_eq!(host.pool().stats().total_sessions, 1);
    }

    #[tokio::test]
    async fn one_broken_skill_does_not_block_others() {
        let root = tempfile::tempdir().unwrap();
        write_skill(root.path(), "math", MATH);
        write_skill(root.path(), "broken", "#[tool]\nfn oops( {}\n");
        write_skill(root.path(), "Bad-Name", MATH);
        std::fs::create_dir_all(root.path().join(".hidden")).unwrap();
        let host = host(root.path());
        let registry = ToolRegistry::new();

        let report = host.load_all(&registry);
        assert_eq!(report.tool_count(), 2);
        let failed: Vec<&str> = report.failures.iter().map(|f| f.skill.as_str()).collect();
        assert_eq!(failed.len(), 2);
        assert!(failed.contains(&"broken"));
        assert!(failed.contains(&"Bad-Name"));
    }

    #[tokio::test]
    async fn unresolvable_functions_are_skipped() {
        let root = tempfile::tempdir().unwrap();
        let source = format!("{MATH}\n/// Draw.\n#[tool]\npub fn draw(w: Widget) {{}}\n");
        write_skill(root.path(), "math", &source);
        let host = host(root.path());
        let registry = ToolRegistry::new();

        let report = host.load_all(&registry);
        assert_eq!(report.skills[0].tools, vec!["math_add", "math_roll"]);
        assert_eq!(report.skills[0].skipped[0].function.as_deref(), Some("draw"));
        assert!(registry.get("math_draw").is_none());
    }

    #[tokio::test]
    async fn tracks_new_and_removed_skills_per_registry() {
        let root = tempfile::tempdir().unwrap();
        write_skill(root.path(), "math", MATH);
        let host = host(root.path());
        let registry = ToolRegistry::new();
        host.load_all(&registry);
        assert!(!host.check_changes(&registry).has_changes());
        assert!(host.sync(&registry).is_none());

        write_skill(root.path(), "dice", "/// Roll.\n#[tool]\nfn roll() -> u8 { 4 }\n");
        std::fs::remove_dir_all(root.path().join("math")).unwrap();
        let changes = host.check_changes(&registry);
        assert_eq!(changes.new_skills, vec![SkillName::new("dice").unwrap()]);
        assert_eq!(changes.removed_skills, vec![SkillName::new("math").unwrap()]);

        let report = host.sync(&registry).unwrap();
        assert!(report.changes.has_changes());
        assert_eq!(registry.names(), vec!["dice_roll"]);

        // A second registry sees every present skill as new.
        let other = ToolRegistry::new();
        let report = host.load_all(&other);
        assert_eq!(report.changes.new_skills, vec![SkillName::new("dice").unwrap()]);
    }

    #[tokio::test]
    async fn edited_skills_drop_deleted_functions() {
        let root = tempfile::tempdir().unwrap();
        write_skill(root.path(), "math", MATH);
        let host = host(root.path());
        let registry = ToolRegistry::new();
        host.load_all(&registry);

        write_skill(root.path(), "math", "/// Add.\n#[tool]\npub fn add() -> i64 { 1 }\n");
        host.load_all(&registry);
        assert_eq!(registry.names(), vec!["math_add"]);
    }

    #[test]
    fn missing_skills_dir_loads_nothing() {
        let root = tempfile::tempdir().unwrap();
        let host = host(&root.path().join("absent"));
        let report = host.load_all(&ToolRegistry::new());
        assert_eq!(report.tool_count(), 0);
        assert!(report.failures.is_empty());
    }
}
