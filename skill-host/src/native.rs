//! In-process implementations of skill functions.
//!
//! Scanning a skill never compiles it, so functions that run in-process must
//! be linked into the host binary ahead of time. Implementations are either
//! submitted at link time with [`inventory::submit!`] as a
//! [`NativeSkillBinding`], or registered explicitly on a [`NativeSkills`]
//! catalog.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use skill_tools::ToolResult;

/// Where a skill lives, handed to every native call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillContext {
    skill_dir: PathBuf,
    skill_name: String,
}

impl SkillContext {
    /// Creates a context for the skill at `skill_dir`.
    #[must_use]
    pub fn new(skill_dir: impl Into<PathBuf>, skill_name: impl Into<String>) -> Self {
        Self {
            skill_dir: skill_dir.into(),
            skill_name: skill_name.into(),
        }
    }

    /// Skill directory, for locating co-located assets.
    #[must_use]
    pub fn skill_dir(&self) -> &Path {
        &self.skill_dir
    }

    /// Skill name.
    #[must_use]
    pub fn skill_name(&self) -> &str {
        &self.skill_name
    }
}

/// Signature of a natively linked skill function.
pub type NativeFn = fn(&SkillContext, Value) -> ToolResult<Value>;

type NativeHandler = Arc<dyn Fn(&SkillContext, Value) -> ToolResult<Value> + Send + Sync>;

/// Link-time registration of a skill function implementation.
///
/// ```ignore
/// inventory::submit! {
///     skill_host::NativeSkillBinding::new("math", "add", math::add_json)
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct NativeSkillBinding {
    skill: &'static str,
    function: &'static str,
    call: NativeFn,
}

impl NativeSkillBinding {
    /// Binds `call` as the implementation of `skill`'s `function`.
    #[must_use]
    pub const fn new(skill: &'static str, function: &'static str, call: NativeFn) -> Self {
        Self {
            skill,
            function,
            call,
        }
    }

    /// Skill name.
    #[must_use]
    pub const fn skill(&self) -> &'static str {
        self.skill
    }

    /// Function name.
    #[must_use]
    pub const fn function(&self) -> &'static str {
        self.function
    }
}

inventory::collect!(NativeSkillBinding);

/// Catalog of in-process skill implementations keyed by skill and function.
#[derive(Default)]
pub struct NativeSkills {
    handlers: RwLock<HashMap<(String, String), NativeHandler>>,
}

impl fmt::Debug for NativeSkills {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeSkills")
            .field("bindings", &self.len())
            .finish()
    }
}

impl NativeSkills {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog holding every binding submitted with `inventory`.
    #[must_use]
    pub fn from_inventory() -> Self {
        let catalog = Self::new();
        for binding in inventory::iter::<NativeSkillBinding> {
            let call = binding.call;
            catalog.register(binding.skill, binding.function, call);
        }
        tracing::debug!(bindings = catalog.len(), "collected native skill bindings");
        catalog
    }

    /// Registers or replaces the implementation of `skill`'s `function`.
    pub fn register<F>(&self, skill: &str, function: &str, handler: F)
    where
        F: Fn(&SkillContext, Value) -> ToolResult<Value> + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((skill.to_owned(), function.to_owned()), Arc::new(handler));
    }

    /// Runs the implementation of `skill`'s `function`, if one is linked.
    pub fn call(
        &self,
        skill: &str,
        function: &str,
        context: &SkillContext,
        args: Value,
    ) -> Option<ToolResult<Value>> {
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(skill.to_owned(), function.to_owned()))
            .cloned()?;
        Some(handler(context, args))
    }

    /// Returns `true` when `skill`'s `function` has an implementation.
    #[must_use]
    pub fn contains(&self, skill: &str, function: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&(skill.to_owned(), function.to_owned()))
    }

    /// Number of registered implementations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn greet(context: &SkillContext, args: Value) -> ToolResult<Value> {
        Ok(json!({
            "skill": context.skill_name(),
            "greeting": format!("hello {}", args["name"].as_str().unwrap_or("world")),
        }))
    }

    inventory::submit! {
        NativeSkillBinding::new("greeter", "greet", greet)
    }

    #[test]
    fn inventory_bindings_are_collected() {
        let catalog = NativeSkills::from_inventory();
        assert!(catalog.contains("greeter", "greet"));

        let context = SkillContext::new("/skills/greeter", "greeter");
        let result = catalog
            .call("greeter", "greet", &context, json!({"name": "ada"}))
            .unwrap()
            .unwrap();
        assert_eq!(result["greeting"], "hello ada");
        assert_eq!(result["skill"], "greeter");
    }

    #[test]
    fn explicit_registration_and_lookup_miss() {
        let catalog = NativeSkills::new();
        catalog.register("math", "double", |_, args| {
            Ok(json!(args["x"].as_i64().unwrap_or_default() * 2))
        });
        let context = SkillContext::new("/skills/math", "math");
        assert_eq!(
            catalog.call("math", "double", &context, json!({"x": 4})).unwrap().unwrap(),
            json!(8)
        );
        assert!(catalog.call("math", "halve", &context, json!({})).is_none());
        assert_eq!(catalog.len(), 1);
    }
}
