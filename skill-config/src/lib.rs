//! Configuration for the skill runtime.
//!
//! Every tunable the runtime exposes lives in one TOML document. Every field
//! has a default, so an empty file (or no file) yields a working setup.
//!
//! ```toml
//! [pool]
//! max_sessions = 5
//! session_ttl_secs = 3600
//!
//! [timeouts]
//! default_tool_secs = 30
//!
//! [chunking]
//! max_result_size = 32000
//! max_chunks = 2
//!
//! [skills]
//! dir = "./skills"
//! ```

#![warn(missing_docs, clippy::pedantic)]

mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{from_toml_str, load, load_or_default};
pub use schema::{ChunkingSection, PoolSection, RuntimeConfig, SkillsSection, TimeoutSection};
