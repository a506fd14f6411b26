//! Session pool keyed by skill and language.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use skill_primitives::{Language, SessionId, SkillName};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{SandboxError, SandboxResult};
use crate::preload::{install_probe, is_builtin_module, merged_libraries, preload_code};
use crate::provider::{SandboxProvider, SandboxSession};

/// Pool capacity, session lifetime and preparation deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    max_sessions: NonZeroUsize,
    session_ttl: Duration,
    install_timeout: Duration,
    preload_timeout: Duration,
}

impl PoolConfig {
    /// Creates a configuration with the given capacity and time-to-live.
    #[must_use]
    pub const fn new(max_sessions: NonZeroUsize, session_ttl: Duration) -> Self {
        Self {
            max_sessions,
            session_ttl,
            install_timeout: Duration::from_secs(120),
            preload_timeout: Duration::from_secs(60),
        }
    }

    /// Sets the deadline for installing libraries into a new session.
    #[must_use]
    pub const fn with_install_timeout(mut self, timeout: Duration) -> Self {
        self.install_timeout = timeout;
        self
    }

    /// Sets the deadline for the preload step.
    #[must_use]
    pub const fn with_preload_timeout(mut self, timeout: Duration) -> Self {
        self.preload_timeout = timeout;
        self
    }

    /// Maximum number of live sessions.
    #[must_use]
    pub const fn max_sessions(&self) -> NonZeroUsize {
        self.max_sessions
    }

    /// Age at which a session is replaced instead of reused.
    #[must_use]
    pub const fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Library installation deadline.
    #[must_use]
    pub const fn install_timeout(&self) -> Duration {
        self.install_timeout
    }

    /// Preload deadline.
    #[must_use]
    pub const fn preload_timeout(&self) -> Duration {
        self.preload_timeout
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(
            NonZeroUsize::new(5).expect("non-zero"),
            Duration::from_secs(3600),
        )
    }
}

/// Identity of a pooled session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SessionKey {
    /// Owning skill.
    pub skill: SkillName,
    /// Session language.
    pub language: Language,
}

impl SessionKey {
    /// Creates a key.
    #[must_use]
    pub fn new(skill: SkillName, language: Language) -> Self {
        Self { skill, language }
    }
}

impl Display for SessionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.skill, self.language)
    }
}

struct PooledSession {
    id: SessionId,
    session: Arc<dyn SandboxSession>,
    libraries: Vec<String>,
    created: Instant,
    created_at: DateTime<Utc>,
    last_used: Mutex<Instant>,
    executions: AtomicU64,
}

impl PooledSession {
    fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created)
    }

    fn record_use(&self) -> u64 {
        *self.last_used.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
        self.executions.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Output of one execution in a pooled session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionOutput {
    /// Whether the code exited successfully.
    pub success: bool,
    /// Process exit code.
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Skill the session belongs to.
    pub skill: SkillName,
    /// Session language.
    pub language: Language,
    /// Session the code ran in.
    pub session_id: SessionId,
    /// Executions performed by the session, including this one.
    pub execution_count: u64,
    /// Libraries the session was prepared with plus the requested ones.
    pub libraries_used: Vec<String>,
}

/// Snapshot of one live session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    /// Key rendered as `<skill>_<language>`.
    pub key: String,
    /// Owning skill.
    pub skill: SkillName,
    /// Session language.
    pub language: Language,
    /// Session identity.
    pub session_id: SessionId,
    /// Wall-clock creation time.
    pub created_at: DateTime<Utc>,
    /// Seconds since creation.
    pub age_secs: f64,
    /// Seconds since the last execution.
    pub idle_secs: f64,
    /// Executions performed.
    pub execution_count: u64,
    /// Libraries the session was prepared with.
    pub preloaded_libraries: Vec<String>,
}

/// Snapshot of the whole pool.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    /// Number of live sessions.
    pub total_sessions: usize,
    /// Configured capacity.
    pub max_sessions: usize,
    /// Per-session details, oldest first.
    pub sessions: Vec<SessionStats>,
}

type CreationGate = Arc<tokio::sync::Mutex<()>>;

/// Pool of sandbox sessions, at most one per [`SessionKey`].
///
/// Bookkeeping locks are held only to read or update the session map. Session
/// creation is serialized per key; execution is not serialized at all.
pub struct SandboxPool {
    provider: Arc<dyn SandboxProvider>,
    config: PoolConfig,
    sessions: Mutex<HashMap<SessionKey, Arc<PooledSession>>>,
    creation: Mutex<HashMap<SessionKey, CreationGate>>,
}

impl fmt::Debug for SandboxPool {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SandboxPool")
            .field("config", &self.config)
            .field("sessions", &self.len())
            .finish_non_exhaustive()
    }
}

impl SandboxPool {
    /// Creates an empty pool backed by `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn SandboxProvider>, config: PoolConfig) -> Self {
        Self {
            provider,
            config,
            sessions: Mutex::new(HashMap::new()),
            creation: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_sessions().len()
    }

    /// Returns `true` when no session is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `code` in the session for `(skill, language)`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Setup`] when a session cannot be opened,
    /// [`SandboxError::Timeout`] when the run exceeds `timeout`, and
    /// [`SandboxError::Execution`] when the session fails to run the code.
    /// Code that runs and exits non-zero is not an error.
    pub async fn execute(
        &self,
        skill: &SkillName,
        language: Language,
        code: &str,
        libraries: &[String],
        timeout: Duration,
    ) -> SandboxResult<ExecutionOutput> {
        let key = SessionKey::new(skill.clone(), language);
        let pooled = self.acquire(&key, libraries).await?;

        debug!(%key, session = %pooled.id, "executing in pooled session");
        let run = tokio::time::timeout(timeout, pooled.session.run(code, libraries, timeout)).await;
        let output = match run {
            Ok(Ok(output)) => output,
            Ok(Err(SandboxError::Timeout { bound })) => return Err(SandboxError::Timeout { bound }),
            Ok(Err(err)) => {
                return Err(SandboxError::Execution {
                    key: key.to_string(),
                    reason: err.to_string(),
                });
            }
            Err(_) => {
                warn!(%key, timeout_ms = timeout.as_millis(), "sandbox execution timed out");
                return Err(SandboxError::Timeout { bound: timeout });
            }
        };

        let execution_count = pooled.record_use();
        let mut libraries_used = pooled.libraries.clone();
        libraries_used.extend(
            libraries
                .iter()
                .filter(|lib| !pooled.libraries.contains(lib))
                .cloned(),
        );
        debug!(%key, execution_count, exit_code = output.exit_code, "execution complete");

        Ok(ExecutionOutput {
            success: output.success(),
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            skill: key.skill,
            language,
            session_id: pooled.id,
            execution_count,
            libraries_used,
        })
    }

    /// Synchronous form of [`execute`](Self::execute) for callers without a runtime.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute), plus [`SandboxError::BridgePanicked`]
    /// when the bridging thread fails.
    pub fn execute_blocking(
        &self,
        skill: &SkillName,
        language: Language,
        code: &str,
        libraries: &[String],
        timeout: Duration,
    ) -> SandboxResult<ExecutionOutput> {
        crate::bridge::block_on(self.execute(skill, language, code, libraries, timeout))?
    }

    /// Tears down the session for `(skill, language)`, returning whether it existed.
    pub async fn cleanup_skill(&self, skill: &SkillName, language: Language) -> bool {
        let key = SessionKey::new(skill.clone(), language);
        let removed = self.lock_sessions().remove(&key);
        self.prune_gates();
        match removed {
            Some(pooled) => {
                close(&key, &pooled).await;
                true
            }
            None => false,
        }
    }

    /// Tears down every session of `skill`, in any language.
    pub async fn cleanup_skill_all(&self, skill: &SkillName) -> usize {
        let removed: Vec<(SessionKey, Arc<PooledSession>)> = {
            let mut sessions = self.lock_sessions();
            let keys: Vec<SessionKey> = sessions
                .keys()
                .filter(|key| &key.skill == skill)
                .cloned()
                .collect();
            keys.into_iter()
                .filter_map(|key| sessions.remove(&key).map(|pooled| (key, pooled)))
                .collect()
        };
        self.prune_gates();
        join_all(removed.iter().map(|(key, pooled)| close(key, pooled))).await;
        removed.len()
    }

    /// Tears down every session, returning how many were released.
    ///
    /// Sessions are closed concurrently. Safe to call repeatedly and when
    /// sessions have already gone away.
    pub async fn cleanup_all(&self) -> usize {
        let drained: Vec<(SessionKey, Arc<PooledSession>)> =
            self.lock_sessions().drain().collect();
        self.prune_gates();
        join_all(drained.iter().map(|(key, pooled)| close(key, pooled))).await;
        info!(released = drained.len(), "all sandbox sessions cleaned up");
        drained.len()
    }

    /// Reports every live session.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let now = Instant::now();
        let sessions = self.lock_sessions();
        let mut details: Vec<SessionStats> = sessions
            .iter()
            .map(|(key, pooled)| {
                let last_used = *pooled.last_used.lock().unwrap_or_else(PoisonError::into_inner);
                SessionStats {
                    key: key.to_string(),
                    skill: key.skill.clone(),
                    language: key.language,
                    session_id: pooled.id,
                    created_at: pooled.created_at,
                    age_secs: pooled.age(now).as_secs_f64(),
                    idle_secs: now.saturating_duration_since(last_used).as_secs_f64(),
                    execution_count: pooled.executions.load(Ordering::SeqCst),
                    preloaded_libraries: pooled.libraries.clone(),
                }
            })
            .collect();
        details.sort_by(|a, b| b.age_secs.total_cmp(&a.age_secs));

        PoolStats {
            total_sessions: sessions.len(),
            max_sessions: self.config.max_sessions.get(),
            sessions: details,
        }
    }

    async fn acquire(
        &self,
        key: &SessionKey,
        libraries: &[String],
    ) -> SandboxResult<Arc<PooledSession>> {
        let gate = self.creation_gate(key);
        let _creating = gate.lock().await;

        let expired = {
            let mut sessions = self.lock_sessions();
            match sessions.get(key) {
                Some(pooled) if pooled.age(Instant::now()) < self.config.session_ttl => {
                    debug!(%key, session = %pooled.id, "reusing sandbox session");
                    return Ok(Arc::clone(pooled));
                }
                Some(_) => sessions.remove(key),
                None => None,
            }
        };
        if let Some(old) = expired {
            info!(%key, session = %old.id, "sandbox session expired");
            close(key, &old).await;
        }

        let pooled = Arc::new(self.create(key, libraries).await?);

        let evicted = {
            let mut sessions = self.lock_sessions();
            let victim = if sessions.len() >= self.config.max_sessions.get() {
                sessions
                    .iter()
                    .min_by_key(|(_, pooled)| pooled.created)
                    .map(|(key, _)| key.clone())
                    .and_then(|oldest| sessions.remove(&oldest).map(|pooled| (oldest, pooled)))
            } else {
                None
            };
            sessions.insert(key.clone(), Arc::clone(&pooled));
            victim
        };
        if let Some((old_key, old)) = evicted {
            info!(key = %old_key, session = %old.id, "evicting oldest sandbox session");
            self.prune_gates();
            close(&old_key, &old).await;
        }

        Ok(pooled)
    }

    async fn create(&self, key: &SessionKey, requested: &[String]) -> SandboxResult<PooledSession> {
        info!(%key, "creating sandbox session");
        let session: Arc<dyn SandboxSession> = self
            .provider
            .open(key.language)
            .await
            .map_err(|err| SandboxError::Setup {
                key: key.to_string(),
                reason: err.to_string(),
            })?
            .into();

        let libraries = merged_libraries(key.language, requested);
        let third_party: Vec<String> = libraries
            .iter()
            .filter(|lib| !is_builtin_module(key.language, lib))
            .cloned()
            .collect();

        if !third_party.is_empty() {
            prepare(
                key,
                "install",
                session.as_ref(),
                install_probe(key.language),
                &third_party,
                self.config.install_timeout,
            )
            .await;
        }
        if let Some(code) = preload_code(key.language, &libraries) {
            prepare(
                key,
                "preload",
                session.as_ref(),
                &code,
                &[],
                self.config.preload_timeout,
            )
            .await;
        }

        let now = Instant::now();
        Ok(PooledSession {
            id: SessionId::random(),
            session,
            libraries,
            created: now,
            created_at: Utc::now(),
            last_used: Mutex::new(now),
            executions: AtomicU64::new(0),
        })
    }

    fn creation_gate(&self, key: &SessionKey) -> CreationGate {
        let mut gates = self.creation.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(gates.entry(key.clone()).or_default())
    }

    /// Drops creation gates that nobody holds and whose key has no session.
    fn prune_gates(&self) {
        let sessions = self.lock_sessions();
        self.creation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|key, gate| Arc::strong_count(gate) > 1 || sessions.contains_key(key));
    }

    fn lock_sessions(&self) -> std::sync::MutexGuard<'_, HashMap<SessionKey, Arc<PooledSession>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs a preparation step; failures are logged and otherwise ignored.
async fn prepare(
    key: &SessionKey,
    step: &'static str,
    session: &dyn SandboxSession,
    code: &str,
    libraries: &[String],
    timeout: Duration,
) {
    match tokio::time::timeout(timeout, session.run(code, libraries, timeout)).await {
        Ok(Ok(output)) if output.success() => {
            debug!(%key, step, libraries = ?libraries, "session prepared");
        }
        Ok(Ok(output)) => {
            warn!(%key, step, exit_code = output.exit_code, stderr = %output.stderr, "session preparation reported problems");
        }
        Ok(Err(err)) => warn!(%key, step, error = %err, "session preparation failed"),
        Err(_) => warn!(%key, step, timeout_ms = timeout.as_millis(), "session preparation timed out"),
    }
}

async fn close(key: &SessionKey, pooled: &PooledSession) {
    match pooled.session.close().await {
        Ok(()) => debug!(%key, session = %pooled.id, "sandbox session closed"),
        Err(err) => warn!(%key, session = %pooled.id, error = %err, "error closing sandbox session"),
    }
}
