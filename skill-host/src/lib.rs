//! Skill hosting: loading skill directories into tool registries.
//!
//! A [`SkillHost`] scans each `<skills_dir>/<skill>/main.rs`, registers every
//! tagged function as a tool named `<skill>_<function>` and keeps registries
//! consistent as skills are created and removed. Registration never runs a
//! skill. Sandboxed functions run through a generated harness in the
//! [`SandboxPool`](skill_sandbox::SandboxPool); the others dispatch to
//! implementations linked into the host through [`NativeSkills`].

#![warn(missing_docs, clippy::pedantic)]

mod error;
pub mod harness;
mod host;
mod invoker;
mod lifecycle;
mod native;
#[cfg(test)]
mod testing;

pub use error::{HostError, HostResult};
pub use host::{HostConfig, LoadFailure, LoadReport, LoadedSkill, SkillChanges, SkillHost};
pub use lifecycle::{RemovedSkill, skill_template};
pub use native::{NativeFn, NativeSkillBinding, NativeSkills, SkillContext};

/// Re-exported so skills can submit [`NativeSkillBinding`]s.
pub use inventory;
