//! Command-line front end for acton-toolcall.
//!
//! ```text
//! acton-toolcall tools
//! acton-toolcall validate guest.wat
//! acton-toolcall run guest.wat
//! acton-toolcall call gather_outputs --args '{"task_ids": ["task_01h..."]}'
//! ```

use acton_toolcall::config::{self, ToolCallConfig};
use acton_toolcall::logging::{init_logging, LogLevel};
use acton_toolcall::tasks::TaskStatus;
use acton_toolcall::tools::builtins::BuiltinTools;
use acton_toolcall::tools::{ExecutionMode, ToolCallWrapper, ToolRegistry};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "acton-toolcall", version, about = "Run, schedule and sandbox agent tool calls")]
struct Cli {
    /// Configuration file. Defaults to the standard search paths.
    #[arg(long, global = true, env = "ACTON_TOOLCALL_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides the configured log level.
    #[arg(long, global = true, value_parser = parse_level)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List registered tool definitions as JSON
    Tools,
    /// Compile a WebAssembly text module without running it
    Validate {
        /// `.wat` file
        file: PathBuf,
    },
    /// Run a WebAssembly text module in the sandbox and print its result
    Run {
        /// `.wat` file
        file: PathBuf,
    },
    /// Invoke a tool through the call wrapper
    Call {
        /// Tool name
        tool: String,
        /// JSON arguments
        #[arg(long, default_value = "{}")]
        args: String,
        /// Persist a task and run it after a delay
        #[arg(long)]
        schedule: bool,
        /// Delay for scheduled calls, in milliseconds
        #[arg(long, requires = "schedule")]
        delay_ms: Option<u64>,
        /// Thread that owns the call
        #[arg(long, default_value = "cli")]
        thread: String,
        /// Tool call id
        #[arg(long, default_value = "call")]
        call_id: String,
    },
    /// Show the effective configuration and where it is searched for
    Config,
}

fn parse_level(raw: &str) -> Result<LogLevel, String> {
    match raw.to_ascii_lowercase().as_str() {
        "trace" => Ok(LogLevel::Trace),
        "debug" => Ok(LogLevel::Debug),
        "info" => Ok(LogLevel::Info),
        "warn" => Ok(LogLevel::Warn),
        "error" => Ok(LogLevel::Error),
        _ => Err(format!("unknown log level '{raw}'")),
    }
}

fn load_config(path: Option<&Path>) -> Result<ToolCallConfig> {
    let config = match path {
        Some(path) => config::from_path(path)?,
        None => config::load()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    init_logging(&config.logging)?;

    match cli.command {
        Command::Tools => {
            let mut registry = ToolRegistry::new();
            BuiltinTools::register_all(&mut registry)?;
            println!("{}", serde_json::to_string_pretty(&registry.definitions())?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Validate { file } => {
            let code = read_source(&file)?;
            let services = config.services().await?;
            match services.sandbox.validate(&code) {
                Ok(()) => {
                    println!("{}: ok", file.display());
                    Ok(ExitCode::SUCCESS)
                }
                Err(error) => {
                    eprintln!("{}: {error}", file.display());
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Run { file } => {
            let code = read_source(&file)?;
            let services = config.services().await?;
            match services.sandbox.execute(&code).await {
                Ok(output) => {
                    println!("{}", serde_json::to_string_pretty(&output)?);
                    Ok(ExitCode::SUCCESS)
                }
                Err(error) => {
                    eprintln!("{}: {error}", error.error_type());
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Call {
            tool,
            args,
            schedule,
            delay_ms,
            thread,
            call_id,
        } => {
            let args: Value = serde_json::from_str(&args).context("--args is not valid JSON")?;
            let mode = if schedule {
                ExecutionMode::Schedule
            } else {
                ExecutionMode::Sync
            };

            let mut registry = ToolRegistry::new();
            BuiltinTools::register_all(&mut registry)?;
            let services = config.services().await?;
            let wrapper =
                ToolCallWrapper::new(registry, services, config.scheduler.to_scheduler_config());

            let result = wrapper
                .wrap(
                    &thread,
                    &call_id,
                    &tool,
                    args,
                    mode,
                    delay_ms.map(Duration::from_millis),
                )
                .await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.is_success() {
                return Ok(ExitCode::FAILURE);
            }

            if mode == ExecutionMode::Schedule {
                wrapper.scheduler().idle().await;
                let task = wrapper
                    .services()
                    .task_store
                    .list_thread_tasks(&thread)
                    .await?
                    .into_iter()
                    .find(|task| task.tool_call_id == call_id)
                    .context("scheduled task disappeared from the store")?;
                println!("{}", serde_json::to_string_pretty(&task)?);
                if task.status != TaskStatus::Completed {
                    return Ok(ExitCode::FAILURE);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Config => {
            for path in config::search_paths() {
                let marker = if path.exists() { "found" } else { "missing" };
                println!("# {marker}: {}", path.display());
            }
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("cannot read '{}'", path.display()))
}
