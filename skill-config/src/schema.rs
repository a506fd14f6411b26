//! Strongly typed configuration schema.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use skill_chunker::ChunkerConfig;
use skill_host::HostConfig;
use skill_sandbox::PoolConfig;
use skill_tools::DeadlineConfig;

use crate::error::{ConfigError, ConfigResult};

/// Root of the configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// `[pool]`
    pub pool: PoolSection,
    /// `[timeouts]`
    pub timeouts: TimeoutSection,
    /// `[chunking]`
    pub chunking: ChunkingSection,
    /// `[skills]`
    pub skills: SkillsSection,
}

/// Sandbox pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSection {
    /// Maximum live sessions.
    pub max_sessions: usize,
    /// Session time-to-live.
    pub session_ttl_secs: u64,
    /// Library installation deadline.
    pub install_timeout_secs: u64,
    /// Preload deadline.
    pub preload_timeout_secs: u64,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            max_sessions: 5,
            session_ttl_secs: 3600,
            install_timeout_secs: 120,
            preload_timeout_secs: 60,
        }
    }
}

/// Tool deadlines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutSection {
    /// Deadline for tools without their own.
    pub default_tool_secs: u64,
    /// Execution bound for sandboxed functions without their own.
    pub sandbox_execution_secs: u64,
    /// Tool calls allowed to run at once.
    pub max_concurrent_calls: usize,
}

impl Default for TimeoutSection {
    fn default() -> Self {
        Self {
            default_tool_secs: 30,
            sandbox_execution_secs: 60,
            max_concurrent_calls: 32,
        }
    }
}

/// Result size budgets, in characters of serialized JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChunkingSection {
    /// Results up to this size pass through unchanged.
    pub max_result_size: usize,
    /// Budget per chunk.
    pub chunk_size: usize,
    /// Object fields at or above this size are chunked.
    pub field_threshold: usize,
    /// Chunks returned per field, sequence or text.
    pub max_chunks: usize,
    /// How far back to look for a sentence end when splitting text.
    pub sentence_window: usize,
}

impl Default for ChunkingSection {
    fn default() -> Self {
        Self {
            max_result_size: 32_000,
            chunk_size: 24_000,
            field_threshold: 24_000,
            max_chunks: 2,
            sentence_window: 2_000,
        }
    }
}

/// Skill discovery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SkillsSection {
    /// Root directory holding one directory per skill.
    pub dir: PathBuf,
    /// Entry file inside each skill directory.
    pub entry_file: String,
}

impl Default for SkillsSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./skills"),
            entry_file: "main.rs".to_owned(),
        }
    }
}

impl RuntimeConfig {
    /// Checks every value, reporting the first one out of range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for zero capacities or durations, an
    /// empty entry file name, or a chunk budget above the result budget.
    pub fn validate(&self) -> ConfigResult<()> {
        let checks: [(bool, &'static str, &'static str); 10] = [
            (self.pool.max_sessions == 0, "pool.max_sessions", "must be at least 1"),
            (self.pool.session_ttl_secs == 0, "pool.session_ttl_secs", "must be positive"),
            (self.pool.install_timeout_secs == 0, "pool.install_timeout_secs", "must be positive"),
            (self.pool.preload_timeout_secs == 0, "pool.preload_timeout_secs", "must be positive"),
            (self.timeouts.default_tool_secs == 0, "timeouts.default_tool_secs", "must be positive"),
            (
                self.timeouts.sandbox_execution_secs == 0,
                "timeouts.sandbox_execution_secs",
                "must be positive",
            ),
            (
                self.timeouts.max_concurrent_calls == 0,
                "timeouts.max_concurrent_calls",
                "must be at least 1",
            ),
            (self.chunking.max_chunks == 0, "chunking.max_chunks", "must be at least 1"),
            (
                self.chunking.chunk_size > self.chunking.max_result_size,
                "chunking.chunk_size",
                "cannot exceed chunking.max_result_size",
            ),
            (self.skills.entry_file.is_empty(), "skills.entry_file", "must not be empty"),
        ];
        match checks.into_iter().find(|(failed, ..)| *failed) {
            Some((_, field, reason)) => Err(ConfigError::Invalid { field, reason }),
            None => {
                self.chunker_config()?;
                Ok(())
            }
        }
    }

    /// Sandbox pool configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `max_sessions` is zero.
    pub fn pool_config(&self) -> ConfigResult<PoolConfig> {
        let max_sessions = NonZeroUsize::new(self.pool.max_sessions).ok_or(ConfigError::Invalid {
            field: "pool.max_sessions",
            reason: "must be at least 1",
        })?;
        Ok(
            PoolConfig::new(max_sessions, Duration::from_secs(self.pool.session_ttl_secs))
                .with_install_timeout(Duration::from_secs(self.pool.install_timeout_secs))
                .with_preload_timeout(Duration::from_secs(self.pool.preload_timeout_secs)),
        )
    }

    /// Tool deadline configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `max_concurrent_calls` is zero.
    pub fn deadline_config(&self) -> ConfigResult<DeadlineConfig> {
        let concurrency =
            NonZeroUsize::new(self.timeouts.max_concurrent_calls).ok_or(ConfigError::Invalid {
                field: "timeouts.max_concurrent_calls",
                reason: "must be at least 1",
            })?;
        Ok(DeadlineConfig::new(
            Duration::from_secs(self.timeouts.default_tool_secs),
            concurrency,
        ))
    }

    /// Result chunker configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a budget or cap is zero.
    pub fn chunker_config(&self) -> ConfigResult<ChunkerConfig> {
        let chunking = &self.chunking;
        ChunkerConfig::from_limits(
            chunking.max_result_size,
            chunking.chunk_size,
            chunking.field_threshold,
            chunking.max_chunks,
            chunking.sentence_window,
        )
        .map_err(|_| ConfigError::Invalid {
            field: "chunking",
            reason: "budgets and caps must be at least 1",
        })
    }

    /// Skill host configuration.
    #[must_use]
    pub fn host_config(&self) -> HostConfig {
        HostConfig::new(&self.skills.dir)
            .with_entry_file(&self.skills.entry_file)
            .with_sandbox_timeout(Duration::from_secs(self.timeouts.sandbox_execution_secs))
    }
}
