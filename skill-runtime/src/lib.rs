//! Dynamic tool and skill execution runtime.
//!
//! Depend on this crate via `cargo add skill-runtime`. It bundles the runtime
//! crates behind feature flags so downstream users can enable only the
//! components they need. With the default features, [`SkillRuntime`] wires a
//! sandbox pool, skill host and change notifier together from a
//! [`RuntimeConfig`](config::RuntimeConfig).

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use skill_primitives as primitives;

/// Call schemas from declared signatures (enabled by `schema` feature).
#[cfg(feature = "schema")]
pub use skill_schema as schema;

/// Static discovery of tagged skill functions (enabled by `scanner` feature).
#[cfg(feature = "scanner")]
pub use skill_scanner as scanner;

/// The `#[tool]` marker attribute (enabled by `macros` feature).
#[cfg(feature = "macros")]
pub use skill_macros::tool;

/// Tool registry, deadline executor and change notifier (enabled by `tools` feature).
#[cfg(feature = "tools")]
pub use skill_tools as tools;

/// Oversized result chunking (enabled by `chunker` feature).
#[cfg(feature = "chunker")]
pub use skill_chunker as chunker;

/// Sandbox session pool (enabled by `sandbox` feature).
#[cfg(feature = "sandbox")]
pub use skill_sandbox as sandbox;

/// Skill loading and lifecycle (enabled by `host` feature).
#[cfg(feature = "host")]
pub use skill_host as host;

/// Configuration loading (enabled by `config` feature).
#[cfg(feature = "config")]
pub use skill_config as config;

/// Tracing setup (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use skill_telemetry as telemetry;

#[cfg(all(
    feature = "host",
    feature = "config",
    feature = "tools",
    feature = "chunker",
    feature = "sandbox"
))]
mod runtime;

#[cfg(all(
    feature = "host",
    feature = "config",
    feature = "tools",
    feature = "chunker",
    feature = "sandbox"
))]
pub use runtime::SkillRuntime;
