//! One-stop assembly of the runtime components.

use std::fmt;
use std::sync::Arc;

use skill_chunker::{ChunkerConfig, ResultChunker};
use skill_config::{ConfigResult, RuntimeConfig};
use skill_host::{LoadReport, NativeSkills, SkillHost};
use skill_sandbox::{SandboxPool, SandboxProvider};
use skill_tools::{DeadlineConfig, DeadlineExecutor, ToolEvents, ToolRegistry};
use tracing::info;

/// Sandbox pool, skill host and change notifier built from one configuration.
///
/// Every registry opened through the runtime shares the pool and the
/// notifier, so a skill created through one registry shows up in all of them.
pub struct SkillRuntime {
    config: RuntimeConfig,
    deadline: DeadlineConfig,
    chunker: ChunkerConfig,
    events: Arc<ToolEvents>,
    host: Arc<SkillHost>,
}

impl fmt::Debug for SkillRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkillRuntime")
            .field("config", &self.config)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl SkillRuntime {
    /// Builds a runtime whose native skills come from `inventory` bindings.
    ///
    /// # Errors
    ///
    /// Returns [`skill_config::ConfigError::Invalid`] when the configuration
    /// does not validate.
    pub fn new(config: RuntimeConfig, provider: Arc<dyn SandboxProvider>) -> ConfigResult<Self> {
        Self::with_natives(config, provider, Arc::new(NativeSkills::from_inventory()))
    }

    /// Builds a runtime with an explicit native skill catalog.
    ///
    /// # Errors
    ///
    /// Same as [`SkillRuntime::new`].
    pub fn with_natives(
        config: RuntimeConfig,
        provider: Arc<dyn SandboxProvider>,
        natives: Arc<NativeSkills>,
    ) -> ConfigResult<Self> {
        config.validate()?;
        let pool = Arc::new(SandboxPool::new(provider, config.pool_config()?));
        let events = Arc::new(ToolEvents::new());
        let host = Arc::new(SkillHost::new(
            config.host_config(),
            pool,
            natives,
            Arc::clone(&events),
        ));
        Ok(Self {
            deadline: config.deadline_config()?,
            chunker: config.chunker_config()?,
            config,
            events,
            host,
        })
    }

    /// Opens a registry loaded with every skill and kept in step with changes.
    pub fn open_registry(&self) -> (Arc<ToolRegistry>, LoadReport) {
        let registry = Arc::new(
            ToolRegistry::new()
                .with_executor(DeadlineExecutor::new(self.deadline))
                .with_chunker(ResultChunker::new(self.chunker)),
        );
        let report = self.host.install(&registry);
        info!(registry = %registry.id(), tools = registry.len(), "registry opened");
        (registry, report)
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Returns the skill host.
    #[must_use]
    pub fn host(&self) -> &Arc<SkillHost> {
        &self.host
    }

    /// Returns the change notifier.
    #[must_use]
    pub fn events(&self) -> &Arc<ToolEvents> {
        &self.events
    }

    /// Returns the sandbox pool.
    #[must_use]
    pub fn pool(&self) -> &Arc<SandboxPool> {
        self.host.pool()
    }

    /// Tears down every sandbox session, returning how many were released.
    pub async fn shutdown(&self) -> usize {
        let released = self.pool().cleanup_all().await;
        info!(released, "skill runtime shut down");
        released
    }
}
