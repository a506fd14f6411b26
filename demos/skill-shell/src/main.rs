//! Loads a skills directory and drives it from the command line.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use skill_runtime::SkillRuntime;
use skill_runtime::host::{NativeSkillBinding, SkillContext, inventory};
use skill_runtime::sandbox::LocalProcessProvider;
use skill_runtime::telemetry::{LogFormat, init_tracing};
use skill_runtime::tools::ToolResult;
use tracing::error;

/// Skill runtime shell
#[derive(Parser)]
#[command(name = "skill-shell")]
#[command(about = "Load, inspect and invoke skills")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "skill-runtime.toml")]
    config: PathBuf,

    /// Skills directory, overriding the configuration
    #[arg(short, long)]
    skills: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is unset
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Terse log lines
    #[arg(long)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List loaded tools and load failures
    List,
    /// Print call schemas, for the named tools or all of them
    Schemas {
        /// Tool names, in the order to print
        names: Vec<String>,
    },
    /// Invoke a tool with JSON arguments
    Invoke {
        /// Tool name
        name: String,
        /// Arguments as a JSON object
        #[arg(default_value = "{}")]
        args: String,
    },
    /// Create a skill from a template or a source file
    Create {
        /// Skill name
        name: String,
        /// Source file to use instead of the template
        #[arg(long)]
        source: Option<PathBuf>,
    },
    /// Delete a skill and its tools
    Remove {
        /// Skill name
        name: String,
    },
    /// Invoke a tool, then print sandbox pool statistics
    Stats {
        /// Tool to invoke first
        name: Option<String>,
    },
}

fn greet(_: &SkillContext, args: Value) -> ToolResult<Value> {
    let name = args["name"].as_str().unwrap_or("stranger");
    let mark = if args["excited"].as_bool().unwrap_or(false) { "!" } else { "." };
    Ok(json!(format!("Hello, {name}{mark}")))
}

inventory::submit! {
    NativeSkillBinding::new("greeter", "greet", greet)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let mut config = skill_runtime::config::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(skills) = args.skills {
        config.skills.dir = skills;
    }

    let runtime = SkillRuntime::new(config, Arc::new(LocalProcessProvider::new()))?;
    let (registry, report) = runtime.open_registry();

    match args.command {
        Command::List => {
            for name in registry.names() {
                let isolated = registry
                    .get(&name)
                    .is_some_and(|tool| tool.requires_isolation());
                println!("{name}{}", if isolated { "  [sandboxed]" } else { "" });
            }
            for failure in &report.failures {
                eprintln!("failed: {}: {}", failure.skill, failure.error);
            }
        }
        Command::Schemas { names } => {
            let schemas = if names.is_empty() {
                registry.schemas()
            } else {
                registry.schemas_for(&names)
            };
            print_json(&schemas)?;
        }
        Command::Invoke { name, args } => {
            let input: Value = serde_json::from_str(&args).context("arguments are not JSON")?;
            print_json(&registry.invoke(&name, input).await.to_value())?;
        }
        Command::Create { name, source } => {
            let source = source
                .map(|path| {
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))
                })
                .transpose()?;
            let report = runtime
                .host()
                .create_skill(&registry, &name, source.as_deref())?;
            print_json(&report)?;
        }
        Command::Remove { name } => {
            let removed = runtime.host().remove_skill(&registry, &name).await?;
            println!(
                "removed {} tools and {} sessions",
                removed.tools, removed.sessions
            );
        }
        Command::Stats { name } => {
            if let Some(name) = name {
                registry.invoke(&name, json!({})).await;
            }
            print_json(&runtime.pool().stats())?;
        }
    }

    runtime.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let format = if args.compact {
        LogFormat::Compact
    } else {
        LogFormat::Full
    };
    if let Err(err) = init_tracing(&args.log_level, format) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "skill-shell failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
