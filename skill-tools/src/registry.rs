//! Runtime registry for tool schemas and invokers.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use skill_chunker::{ChunkOutcome, ChunkedResult, ResultChunker};
use skill_primitives::{RegistryId, SkillName};
use skill_schema::{Signature, ToolSchema, generate_schema};
use tracing::{debug, info, warn};

use crate::deadline::DeadlineExecutor;
use crate::error::{ToolError, ToolFailure, ToolResult};
use crate::tool::Invoker;

/// A tool entry: schema, invoker and execution settings.
///
/// Entries are immutable; re-registering a name swaps in a new entry.
#[derive(Debug, Clone)]
pub struct RegisteredTool {
    schema: ToolSchema,
    invoker: Invoker,
    requires_isolation: bool,
    timeout: Option<Duration>,
    skill: Option<SkillName>,
}

impl RegisteredTool {
    /// Creates an entry for `schema` backed by `invoker`.
    #[must_use]
    pub fn new(schema: ToolSchema, invoker: Invoker) -> Self {
        Self {
            schema,
            invoker,
            requires_isolation: false,
            timeout: None,
            skill: None,
        }
    }

    /// Marks the tool as requiring an isolated session.
    #[must_use]
    pub fn with_isolation(mut self, requires_isolation: bool) -> Self {
        self.requires_isolation = requires_isolation;
        self
    }

    /// Overrides the registry's default deadline for this tool.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Records the skill the tool was loaded from.
    #[must_use]
    pub fn for_skill(mut self, skill: SkillName) -> Self {
        self.skill = Some(skill);
        self
    }

    /// Tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// Call schema.
    #[must_use]
    pub fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    /// Invoker.
    #[must_use]
    pub fn invoker(&self) -> &Invoker {
        &self.invoker
    }

    /// Whether the tool runs in an isolated session.
    #[must_use]
    pub const fn requires_isolation(&self) -> bool {
        self.requires_isolation
    }

    /// Per-tool deadline, if set.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Owning skill, if any.
    #[must_use]
    pub fn skill(&self) -> Option<&SkillName> {
        self.skill.as_ref()
    }
}

/// Result of a tool invocation. Invocation never fails outright.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolOutput {
    /// The tool's result, within the size budget.
    Success(Value),
    /// The tool's result, split because it exceeded the size budget.
    Chunked(ChunkedResult),
    /// The invocation failed.
    Failure {
        /// What went wrong.
        error: ToolFailure,
    },
}

impl ToolOutput {
    /// Returns `true` unless the invocation failed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Failure { .. })
    }

    /// Returns the plain result value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the failure record, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&ToolFailure> {
        match self {
            Self::Failure { error } => Some(error),
            _ => None,
        }
    }

    /// Renders the output as JSON for the caller.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|err| Value::String(err.to_string()))
    }
}

type ReloadHook = Arc<dyn Fn(&ToolRegistry) + Send + Sync>;

/// Registry that stores tool entries keyed by name.
pub struct ToolRegistry {
    id: RegistryId,
    tools: RwLock<HashMap<String, Arc<RegisteredTool>>>,
    reload_hooks: RwLock<Vec<ReloadHook>>,
    executor: DeadlineExecutor,
    chunker: Option<ResultChunker>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("id", &self.id)
            .field("registered", &self.names())
            .field("chunking", &self.chunker.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Creates an empty registry with a default executor and no chunking.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: RegistryId::random(),
            tools: RwLock::new(HashMap::new()),
            reload_hooks: RwLock::new(Vec::new()),
            executor: DeadlineExecutor::default(),
            chunker: None,
        }
    }

    /// Uses the given executor for invocations.
    #[must_use]
    pub fn with_executor(mut self, executor: DeadlineExecutor) -> Self {
        self.executor = executor;
        self
    }

    /// Passes successful results through the given chunker.
    #[must_use]
    pub fn with_chunker(mut self, chunker: ResultChunker) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Identity of this registry, used to exclude it from its own broadcasts.
    #[must_use]
    pub const fn id(&self) -> RegistryId {
        self.id
    }

    /// Inserts or replaces a tool, returning the entry it replaced.
    ///
    /// Calls already running against the old entry are unaffected.
    pub fn register(&self, tool: RegisteredTool) -> Option<Arc<RegisteredTool>> {
        let name = tool.name().to_owned();
        let previous = self
            .tools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), Arc::new(tool));
        if previous.is_some() {
            debug!(registry = %self.id, tool = %name, "tool replaced");
        } else {
            info!(registry = %self.id, tool = %name, "tool registered");
        }
        previous
    }

    /// Generates a schema for `signature` and registers it with `invoker`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Schema`] when a parameter type cannot be resolved;
    /// nothing is registered in that case.
    pub fn register_signature(&self, signature: &Signature, invoker: Invoker) -> ToolResult<()> {
        let schema = generate_schema(signature)?;
        self.register(RegisteredTool::new(schema, invoker));
        Ok(())
    }

    /// Removes a tool by name.
    pub fn unregister(&self, name: &str) -> Option<Arc<RegisteredTool>> {
        let removed = self
            .tools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        if removed.is_some() {
            info!(registry = %self.id, tool = name, "tool unregistered");
        }
        removed
    }

    /// Removes every tool loaded from `skill`, returning how many were removed.
    pub fn remove_skill_tools(&self, skill: &SkillName) -> usize {
        let mut tools = self.tools.write().unwrap_or_else(PoisonError::into_inner);
        let before = tools.len();
        tools.retain(|_, tool| tool.skill() != Some(skill));
        let removed = before - tools.len();
        drop(tools);
        if removed > 0 {
            info!(registry = %self.id, %skill, removed, "skill tools removed");
        }
        removed
    }

    /// Names of the tools loaded from `skill`, sorted.
    #[must_use]
    pub fn skill_tool_names(&self, skill: &SkillName) -> Vec<String> {
        let mut names: Vec<String> = self
            .tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|tool| tool.skill() == Some(skill))
            .map(|tool| tool.name().to_owned())
            .collect();
        names.sort_unstable();
        names
    }

    /// Returns the entry registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<RegisteredTool>> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Returns schemas for `names`, in the given order, skipping unknown names.
    pub fn schemas_for<I, S>(&self, names: I) -> Vec<ToolSchema>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tools = self.tools.read().unwrap_or_else(PoisonError::into_inner);
        names
            .into_iter()
            .filter_map(|name| tools.get(name.as_ref()).map(|tool| tool.schema.clone()))
            .collect()
    }

    /// Returns every schema, ordered by tool name.
    #[must_use]
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.schemas_for(self.names())
    }

    /// Returns the registered tool names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort_unstable();
        names
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` when no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invokes a tool under its deadline, returning the raw result.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] for unregistered names,
    /// [`ToolError::Execution`] when a required argument is missing or the
    /// tool fails, and [`ToolError::TimeoutExceeded`] when the deadline passes.
    pub async fn call(&self, name: &str, args: Value) -> ToolResult<Value> {
        let tool = self.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_owned(),
        })?;
        check_arguments(tool.schema(), &args)?;

        let timeout = tool
            .timeout
            .unwrap_or_else(|| self.executor.config().default_timeout());
        debug!(
            registry = %self.id,
            tool = name,
            timeout_ms = timeout.as_millis(),
            "invoking tool"
        );
        self.executor.invoke(&tool.invoker, args, timeout).await
    }

    /// Invokes a tool and always returns a well-formed output.
    ///
    /// Errors of any kind, including timeouts and panics, are converted into
    /// [`ToolOutput::Failure`]. Oversized results are chunked when a chunker
    /// is configured.
    pub async fn invoke(&self, name: &str, args: Value) -> ToolOutput {
        match self.call(name, args).await {
            Ok(value) => match self.chunker.map(|chunker| chunker.process(&value)) {
                Some(ChunkOutcome::Chunked(chunked)) => ToolOutput::Chunked(chunked),
                _ => ToolOutput::Success(value),
            },
            Err(err) => {
                warn!(
                    registry = %self.id,
                    tool = name,
                    kind = ?err.kind(),
                    error = %err,
                    "tool invocation failed"
                );
                ToolOutput::Failure {
                    error: ToolFailure::new(name, &err),
                }
            }
        }
    }

    /// Adds a routine that refreshes this registry, run by [`ToolRegistry::reload`].
    pub fn on_reload<F>(&self, hook: F)
    where
        F: Fn(&ToolRegistry) + Send + Sync + 'static,
    {
        self.reload_hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(hook));
    }

    /// Runs every reload routine, returning how many ran.
    pub fn reload(&self) -> usize {
        let hooks: Vec<ReloadHook> = self
            .reload_hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for hook in &hooks {
            hook(self);
        }
        debug!(registry = %self.id, hooks = hooks.len(), "registry reloaded");
        hooks.len()
    }
}

fn check_arguments(schema: &ToolSchema, args: &Value) -> ToolResult<()> {
    let provided = match args {
        Value::Object(map) => Some(map),
        Value::Null => None,
        other => {
            return Err(ToolError::execution(format!(
                "arguments must be a JSON object, got {other}"
            )));
        }
    };
    if let Some(missing) = schema
        .required()
        .find(|name| provided.is_none_or(|map| !map.contains_key(*name)))
    {
        return Err(ToolError::execution(format!(
            "missing required argument `{missing}`"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use skill_chunker::ChunkerConfig;
    use skill_schema::TypeTag;

    use super::*;
    use crate::deadline::DeadlineConfig;
    use crate::error::FailureKind;

    fn add_signature() -> Signature {
        Signature::new("add")
            .with_description("Add two numbers")
            .param_of::<i64>("a")
            .param_of::<i64>("b")
            .returns_of::<i64>()
    }

    fn add_invoker() -> Invoker {
        Invoker::from_tool(|args: Value| async move {
            let a = args["a"].as_i64().unwrap_or_default();
            let b = args["b"].as_i64().unwrap_or_default();
            Ok(json!(a + b))
        })
    }

    fn sleepy(name: &str, delay: Duration) -> RegisteredTool {
        let schema = generate_schema(&Signature::new(name)).unwrap();
        RegisteredTool::new(
            schema,
            Invoker::from_tool(move |_: Value| async move {
                tokio::time::sleep(delay).await;
                Ok(json!("done"))
            }),
        )
    }

    #[tokio::test]
    async fn register_and_invoke_tool() {
        let registry = ToolRegistry::new();
        registry
            .register_signature(&add_signature(), add_invoker())
            .unwrap();

        let schemas = registry.schemas_for(["add"]);
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].required().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(
            schemas[0]
                .parameters()
                .iter()
                .all(|p| p.tag() == TypeTag::Integer)
        );

        let output = registry.invoke("add", json!({ "a": 2, "b": 3 })).await;
        assert_eq!(output, ToolOutput::Success(json!(5)));
    }

    #[tokio::test]
    async fn schemas_follow_request_order_and_skip_unknown() {
        let registry = ToolRegistry::new();
        registry.register(sleepy("first", Duration::ZERO));
        registry.register(sleepy("second", Duration::ZERO));

        let names: Vec<String> = registry
            .schemas_for(["second", "missing", "first"])
            .iter()
            .map(|schema| schema.name().to_owned())
            .collect();
        assert_eq!(names, vec!["second", "first"]);
        assert_eq!(registry.names(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn unknown_tool_becomes_failure() {
        let registry = ToolRegistry::new();
        let output = registry.invoke("missing", Value::Null).await;
        let failure = output.failure().expect("failure");
        assert_eq!(failure.kind, FailureKind::UnknownTool);
        assert_eq!(failure.tool, "missing");
        assert_eq!(output.to_value()["error"]["kind"], "unknown_tool");
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_becomes_failure() {
        let registry = ToolRegistry::new();
        registry.register(
            sleepy("slow", Duration::from_secs(1)).with_timeout(Duration::from_millis(10)),
        );

        let output = registry.invoke("slow", json!({})).await;
        assert_eq!(output.failure().unwrap().kind, FailureKind::TimeoutExceeded);
    }

    #[tokio::test]
    async fn missing_arguments_and_panics_are_contained() {
        let registry = ToolRegistry::new();
        registry
            .register_signature(&add_signature(), add_invoker())
            .unwrap();
        let output = registry.invoke("add", json!({ "a": 1 })).await;
        assert_eq!(output.failure().unwrap().kind, FailureKind::Execution);

        let schema = generate_schema(&Signature::new("explode")).unwrap();
        registry.register(RegisteredTool::new(
            schema,
            Invoker::blocking(|_| panic!("bad tool")),
        ));
        let output = registry.invoke("explode", Value::Null).await;
        assert!(output.failure().unwrap().message.contains("bad tool"));
    }

    #[tokio::test(start_paused = true)]
    async fn replacing_a_tool_leaves_in_flight_calls_alone() {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(sleepy("job", Duration::from_millis(50)));

        let in_flight = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.invoke("job", json!({})).await })
        };
        tokio::task::yield_now().await;

        let schema = generate_schema(&Signature::new("job")).unwrap();
        let previous = registry.register(RegisteredTool::new(
            schema,
            Invoker::from_tool(|_: Value| async { Ok(json!("new")) }),
        ));
        assert!(previous.is_some());

        assert_eq!(in_flight.await.unwrap(), ToolOutput::Success(json!("done")));
        assert_eq!(
            registry.invoke("job", json!({})).await,
            ToolOutput::Success(json!("new"))
        );
    }

    #[tokio::test]
    async fn removes_tools_by_skill() {
        let registry = ToolRegistry::new();
        let math = SkillName::new("math").unwrap();
        registry.register(sleepy("math_add", Duration::ZERO).for_skill(math.clone()));
        registry.register(sleepy("math_sub", Duration::ZERO).for_skill(math.clone()));
        registry.register(sleepy("echo", Duration::ZERO));

        assert_eq!(registry.skill_tool_names(&math), vec!["math_add", "math_sub"]);
        assert_eq!(registry.remove_skill_tools(&math), 2);
        assert_eq!(registry.names(), vec!["echo"]);
        assert!(registry.unregister("echo").is_some());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn oversized_results_are_chunked() {
        let config = ChunkerConfig::new(
            NonZeroUsize::new(100).unwrap(),
            NonZeroUsize::new(50).unwrap(),
        );
        let registry = ToolRegistry::new()
            .with_chunker(ResultChunker::new(config))
            .with_executor(DeadlineExecutor::new(DeadlineConfig::default()));
        let schema = generate_schema(&Signature::new("dump")).unwrap();
        registry.register(RegisteredTool::new(
            schema,
            Invoker::blocking(|_| Ok(Value::String("z".repeat(500)))),
        ));

        let ToolOutput::Chunked(chunked) = registry.invoke("dump", Value::Null).await else {
            panic!("expected chunked output");
        };
        assert_eq!(chunked.chunks.len(), 2);
        assert_eq!(chunked.total_chunks, 10);
    }

    #[test]
    fn reload_runs_hooks() {
        let registry = ToolRegistry::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        registry.on_reload(move |registry| {
            counter.fetch_add(1, Ordering::SeqCst);
            registry.register(sleepy("refreshed", Duration::ZERO));
        });

        assert_eq!(registry.reload(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(registry.get("refreshed").is_some());
    }
}
