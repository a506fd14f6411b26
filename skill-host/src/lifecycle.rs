//! Creating and removing skills at runtime.

use std::path::Path;

use skill_primitives::SkillName;
use skill_scanner::scan_source;
use skill_tools::{ToolChangeEvent, ToolRegistry};
use tracing::info;

use crate::error::{HostError, HostResult};
use crate::host::{LoadReport, SkillHost};

/// Outcome of removing a skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovedSkill {
    /// Tools unregistered from the removing registry.
    pub tools: usize,
    /// Sandbox sessions torn down.
    pub sessions: usize,
    /// Other registries that reloaded.
    pub reloaded: usize,
}

impl SkillHost {
    /// Creates a skill directory and makes its tools available everywhere.
    ///
    /// The source is scanned before anything is written, so a skill that does
    /// not parse is never created. When `source` is `None` a starter skill is
    /// written instead. The creating registry is reloaded directly; every
    /// other published registry reloads through the change notifier.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::InvalidName`] for an unusable name,
    /// [`HostError::AlreadyExists`] when the directory exists,
    /// [`HostError::Scan`] when the source does not parse and
    /// [`HostError::Io`] when writing fails.
    pub fn create_skill(
        &self,
        registry: &ToolRegistry,
        name: &str,
        source: Option<&str>,
    ) -> HostResult<LoadReport> {
        let skill = SkillName::new(name)?;
        let dir = self.skill_dir(&skill);
        if dir.exists() {
            return Err(HostError::AlreadyExists(skill.to_string()));
        }

        let template;
        let source = match source {
            Some(source) => source,
            None => {
                template = skill_template(&skill);
                &template
            }
        };
        scan_source(skill.as_str(), source).map_err(|source| HostError::Scan {
            skill: skill.to_string(),
            source,
        })?;

        write_file(&dir.join(self.config().entry_file()), source)?;
        write_file(&dir.join("README.md"), &readme_template(&skill))?;
        let scripts = dir.join("scripts");
        std::fs::create_dir_all(&scripts).map_err(|err| HostError::io(&scripts, err))?;
        info!(%skill, dir = %dir.display(), "skill created");

        let report = self.load_all(registry);
        self.events
            .publish_change(&ToolChangeEvent::created(skill, registry.id()));
        self.events.broadcast_reload(registry.id());
        Ok(report)
    }

    /// Deletes a skill directory, its tools and its sandbox sessions.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::InvalidName`] for an unusable name,
    /// [`HostError::NotFound`] when the directory does not exist and
    /// [`HostError::Io`] when it cannot be deleted.
    pub async fn remove_skill(&self, registry: &ToolRegistry, name: &str) -> HostResult<RemovedSkill> {
        let skill = SkillName::new(name)?;
        let dir = self.skill_dir(&skill);
        if !dir.is_dir() {
            return Err(HostError::NotFound(skill.to_string()));
        }
        tokio::fs::remove_dir_all(&dir)
            .await
            .map_err(|err| HostError::io(&dir, err))?;

        let tools = registry.remove_skill_tools(&skill);
        if let Some(known) = self.lock_loaded().get_mut(&registry.id()) {
            known.remove(&skill);
        }
        let sessions = self.pool.cleanup_skill_all(&skill).await;
        info!(%skill, tools, sessions, "skill removed");

        self.events
            .publish_change(&ToolChangeEvent::removed(skill, registry.id()));
        let reloaded = self.events.broadcast_reload(registry.id());
        Ok(RemovedSkill {
            tools,
            sessions,
            reloaded,
        })
    }
}

/// Starter source for a new skill.
#[must_use]
pub fn skill_template(skill: &SkillName) -> String {
    format!(
        r#"//! {skill} skill.

use skill_macros::tool;

/// Process input for the {skill} skill.
///
/// # Arguments
///
/// * `input_data` - input to process
#[tool(sandboxed)]
pub fn process(input_data: String) -> serde_json::Value {{
    serde_json::json!({{
        "success": true,
        "skill": SKILL_NAME,
        "input_received": input_data,
        "message": format!("Processed by {{}} skill", SKILL_NAME),
    }})
}}
"#
    )
}

fn readme_template(skill: &SkillName) -> String {
    format!(
        "# {skill} skill\n\n## Description\nWhat this skill does.\n\n## Functions\n- `process`: entry point of this skill\n\n## Scripts\nHelper scripts live in `scripts/`.\n"
    )
}

fn write_file(path: &Path, contents: &str) -> HostResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| HostError::io(parent, err))?;
    }
    std::fs::write(path, contents).map_err(|err| HostError::io(path, err))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;
    use skill_tools::ChangeKind;

    use super::*;
    use crate::testing::host;

    fn record_changes(host: &SkillHost) -> Arc<Mutex<Vec<(ChangeKind, String)>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        host.events().subscribe_change(move |event| {
            sink.lock()
                .unwrap()
                .push((event.kind, event.skill.to_string()));
            Ok(())
        });
        seen
    }

    #[tokio::test]
    async fn created_skills_reach_every_registry() {
        let root = tempfile::tempdir().unwrap();
        let host = host(root.path());
        let seen = record_changes(&host);
        let creator = Arc::new(ToolRegistry::new());
        let observer = Arc::new(ToolRegistry::new());
        host.install(&creator);
        host.install(&observer);

        let report = host.create_skill(&creator, "notes", None).unwrap();
        assert_eq!(report.tool_names().collect::<Vec<_>>(), vec!["notes_process"]);
        assert!(root.path().join("notes/README.md").is_file());
        assert!(root.path().join("notes/scripts").is_dir());
        assert_eq!(observer.names(), vec!["notes_process"]);
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[(ChangeKind::Created, "notes".to_owned())]
        );

        let output = observer.invoke("notes_process", json!({"input_data": "hi"})).await;
        assert!(output.is_success());
    }

    #[tokio::test]
    async fn invalid_creations_write_nothing() {
        let root = tempfile::tempdir().unwrap();
        let host = host(root.path());
        let registry = ToolRegistry::new();

        let err = host
            .create_skill(&registry, "broken", Some("#[tool]\nfn f( {}"))
            .unwrap_err();
        assert!(matches!(err, HostError::Scan { .. }));
        assert!(!root.path().join("broken").exists());

        assert!(matches!(
            host.create_skill(&registry, "Not Valid", None),
            Err(HostError::InvalidName(_))
        ));

        host.create_skill(&registry, "notes", None).unwrap();
        assert!(matches!(
            host.create_skill(&registry, "notes", None),
            Err(HostError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn removing_a_skill_clears_tools_sessions_and_peers() {
        let root = tempfile::tempdir().unwrap();
        let host = host(root.path());
        let seen = record_changes(&host);
        let creator = Arc::new(ToolRegistry::new());
        let observer = Arc::new(ToolRegistry::new());
        host.install(&creator);
        host.install(&observer);
        host.create_skill(&creator, "notes", None).unwrap();
        creator
            .invoke("notes_process", json!({"input_data": "warm"}))
            .await;

        let removed = host.remove_skill(&creator, "notes").await.unwrap();
        assert_eq!(removed.tools, 1);
        assert_eq!(removed.sessions, 1);
        assert_eq!(removed.reloaded, 1);
        assert!(creator.is_empty());
        assert!(observer.is_empty());
        assert!(host.pool().is_empty());
        assert!(!root.path().join("notes").exists());
        assert_eq!(seen.lock().unwrap().last().unwrap().0, ChangeKind::Removed);

        assert!(matches!(
            host.remove_skill(&creator, "notes").await,
            Err(HostError::NotFound(_))
        ));
    }

    #[test]
    fn template_scans_as_one_sandboxed_tool() {
        let skill = SkillName::new("notes").unwrap();
        let report = scan_source("notes", &skill_template(&skill)).unwrap();
        assert_eq!(report.functions.len(), 1);
        assert_eq!(report.functions[0].function, "process");
        assert!(report.functions[0].requires_isolation);
        assert!(report.warnings.is_empty());
        assert_eq!(report.imported_crates, Vec::<String>::new());
    }
}
