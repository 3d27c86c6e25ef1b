//! Restricted execution of caller-supplied WebAssembly.
//!
//! Guest code is a WebAssembly text module that exports a linear `memory` and
//! a `run` function returning `(ptr, len)` of a UTF-8 JSON document in that
//! memory. [`SandboxExecutor`] compiles the module, checks its imports against
//! the allow-list and runs it in a fresh wasmtime store. A run reaches the
//! host only through the `console` module and allow-listed modules (see
//! [`HostModules`]), is capped at the configured memory limit, and is
//! interrupted at its deadline through epoch interruption.
//!
//! ```rust,ignore
//! use acton_toolcall::sandbox::{SandboxConfig, SandboxExecutor};
//!
//! let sandbox = SandboxExecutor::new(SandboxConfig::default());
//! let output = sandbox
//!     .execute(r#"(module
//!         (memory (export "memory") 1)
//!         (data (i32.const 0) "42")
//!         (func (export "run") (result i32 i32) i32.const 0 i32.const 2))"#)
//!     .await?;
//! ```

mod compile;
mod config;
mod diagnostic;
mod host;
mod limits;

pub use config::{SandboxConfig, DEFAULT_CONSOLE_PREFIX, DEFAULT_MEMORY_LIMIT, DEFAULT_TIMEOUT};
pub use diagnostic::{Diagnostic, Position, Severity};
pub use host::{HostModules, BUILTIN_MODULES};

use crate::error::ToolCallError;
use anyhow::anyhow;
use compile::{ENTRY_POINT, MEMORY_EXPORT};
use host::{DeadlineExceeded, SandboxState};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};
use wasmtime::{Config, Engine, Linker, Module, Store};

/// How often the epoch advances while a guest runs.
const EPOCH_TICK: Duration = Duration::from_millis(10);

/// The process-wide engine. Engines are expensive and thread-safe; stores are
/// per run.
fn engine() -> Result<&'static Engine, ToolCallError> {
    static ENGINE: OnceLock<Result<Engine, String>> = OnceLock::new();
    ENGINE
        .get_or_init(|| {
            let mut config = Config::new();
            config.epoch_interruption(true);
            config.wasm_threads(false);
            Engine::new(&config).map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(|e| ToolCallError::configuration("sandbox.engine", e.clone()))
}

/// Compiles and runs WebAssembly guests.
#[derive(Debug, Clone)]
pub struct SandboxExecutor {
    config: SandboxConfig,
    modules: HostModules,
    console_prefix: Arc<str>,
}

impl Default for SandboxExecutor {
    fn default() -> Self {
        Self::new(SandboxConfig::default())
    }
}

impl SandboxExecutor {
    /// Creates an executor linking the built-in modules on the config's
    /// allow-list.
    #[must_use]
    pub fn new(config: SandboxConfig) -> Self {
        let modules = HostModules::new(config.allowed_modules.iter().cloned());
        let console_prefix = Arc::from(config.console_prefix.as_str());
        Self {
            config,
            modules,
            console_prefix,
        }
    }

    /// Returns the executor's configuration.
    #[must_use]
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Compiles `code` without running it.
    ///
    /// # Errors
    ///
    /// Returns a compilation error carrying every diagnostic if the module
    /// has any error or warning.
    pub fn validate(&self, code: &str) -> Result<(), ToolCallError> {
        compile_module(engine()?, code).map(|_| ())
    }

    /// Compiles and runs `code`, returning the guest's result as JSON.
    ///
    /// The result is the JSON document at the `(ptr, len)` returned by
    /// `run`; a zero length yields `null`. If the guest called
    /// `timers.defer`, the result is held back until the deferral elapses.
    ///
    /// # Errors
    ///
    /// - compilation error if the module does not compile
    /// - module-not-available if the module imports outside the allow-list
    /// - timeout if the deadline passes
    /// - execution error for traps, a memory limit refusal, or a result that
    ///   is not valid JSON
    pub async fn execute(&self, code: &str) -> Result<serde_json::Value, ToolCallError> {
        let engine = engine()?;
        let module = compile_module(engine, code)?;
        self.modules.check_imports(&module)?;
        let linker = self.modules.linker(engine)?;

        let deadline = Instant::now() + self.config.timeout;
        let state = SandboxState::new(
            deadline,
            self.console_prefix.clone(),
            self.config.memory_limit,
        );

        tracing::debug!(
            timeout_ms = duration_ms(self.config.timeout),
            memory_limit = self.config.memory_limit,
            "running guest"
        );
        let (output, ready_at) =
            tokio::task::spawn_blocking(move || run_guest(engine, &linker, &module, state))
                .await
                .map_err(|e| ToolCallError::execution("sandbox", format!("guest run aborted: {e}")))?
                .map_err(|error| self.run_failure(&error, deadline))?;

        if let Some(ready_at) = ready_at {
            if ready_at > deadline {
                tokio::time::sleep_until(deadline.into()).await;
                return Err(self.timed_out());
            }
            tokio::time::sleep_until(ready_at.into()).await;
        }
        Ok(output)
    }

    fn run_failure(&self, error: &anyhow::Error, deadline: Instant) -> ToolCallError {
        if error.downcast_ref::<DeadlineExceeded>().is_some() || Instant::now() >= deadline {
            return self.timed_out();
        }
        let reason = error.root_cause().to_string();
        tracing::debug!(%reason, "guest failed");
        ToolCallError::execution("sandbox", reason)
    }

    fn timed_out(&self) -> ToolCallError {
        tracing::warn!(timeout_ms = duration_ms(self.config.timeout), "guest timed out");
        ToolCallError::timeout(self.config.timeout)
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn compile_module(engine: &Engine, code: &str) -> Result<Module, ToolCallError> {
    compile::compile(engine, code).map_err(|mut diagnostics| {
        diagnostics.sort_by_key(Diagnostic::position);
        ToolCallError::compilation(diagnostics)
    })
}

/// Runs one guest to completion on the current thread, advancing the epoch
/// from a companion thread until the run returns.
fn run_guest(
    engine: &'static Engine,
    linker: &Linker<SandboxState>,
    module: &Module,
    state: SandboxState,
) -> anyhow::Result<(serde_json::Value, Option<Instant>)> {
    let mut store = state.into_store(engine);
    let (stop, ticks) = mpsc::channel::<()>();

    let output = thread::scope(|scope| {
        let stop = stop;
        scope.spawn(move || {
            while let Err(RecvTimeoutError::Timeout) = ticks.recv_timeout(EPOCH_TICK) {
                engine.increment_epoch();
            }
        });
        let output = call_entry_point(linker, &mut store, module);
        drop(stop);
        output
    })?;

    let state = store.data();
    tracing::trace!(memory_used = state.memory_used(), "guest finished");
    Ok((output, state.ready_at()))
}

fn call_entry_point(
    linker: &Linker<SandboxState>,
    store: &mut Store<SandboxState>,
    module: &Module,
) -> anyhow::Result<serde_json::Value> {
    let instance = linker.instantiate(&mut *store, module)?;
    let run = instance.get_typed_func::<(), (i32, i32)>(&mut *store, ENTRY_POINT)?;
    let (ptr, len) = run.call(&mut *store, ())?;
    if len == 0 {
        return Ok(serde_json::Value::Null);
    }

    let memory = instance
        .get_memory(&mut *store, MEMORY_EXPORT)
        .ok_or_else(|| anyhow!("module does not export its memory"))?;
    let start = usize::try_from(ptr).map_err(|_| anyhow!("result pointer {ptr} is negative"))?;
    let len = usize::try_from(len).map_err(|_| anyhow!("result length {len} is negative"))?;
    let bytes = start
        .checked_add(len)
        .and_then(|end| memory.data(&*store).get(start..end))
        .ok_or_else(|| anyhow!("result at {start}+{len} is outside guest memory"))?;
    serde_json::from_slice(bytes).map_err(|e| anyhow!("result is not valid JSON: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::module_returning;
    use serde_json::json;

    const SPIN: &str = r#"(module
        (memory (export "memory") 1)
        (func (export "run") (result i32 i32)
          (loop $spin br $spin)
          unreachable))"#;

    #[test]
    fn validate_accepts_valid_code() {
        let sandbox = SandboxExecutor::default();
        assert!(sandbox.validate(&module_returning("1")).is_ok());
    }

    #[test]
    fn validate_reports_every_diagnostic() {
        let sandbox = SandboxExecutor::default();
        let err = sandbox
            .validate("(module\n  (func (export \"run\") (param i32)))")
            .unwrap_err();
        assert_eq!(err.error_type(), "CompilationError");
        let diagnostics = err.diagnostics().unwrap();
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.iter().all(|d| d.severity == Severity::Error));
        assert_eq!(diagnostics[0].line, 1);
        assert!(diagnostics[0].to_string().contains("expected no parameters"));
    }

    #[test]
    fn validate_reports_syntax_errors_with_position() {
        let err = SandboxExecutor::default()
            .validate("(module\n  (func (export \"run\")\n    (i32.add (i32.const 1) $x)))")
            .unwrap_err();
        let diagnostics = err.diagnostics().unwrap();
        assert!(!diagnostics.is_empty());
        assert_eq!(diagnostics[0].line, 3);
    }

    #[tokio::test]
    async fn execute_returns_json() {
        let output = SandboxExecutor::default()
            .execute(&module_returning(r#"{"message":"Hello World"}"#))
            .await
            .unwrap();
        assert_eq!(output, json!({"message": "Hello World"}));
    }

    #[tokio::test]
    async fn empty_result_is_null() {
        let output = SandboxExecutor::default()
            .execute(&module_returning(""))
            .await
            .unwrap();
        assert_eq!(output, serde_json::Value::Null);
    }

    #[tokio::test]
    async fn result_must_be_json() {
        let err = SandboxExecutor::default()
            .execute(&module_returning("not json"))
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), "ExecutionError");
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[tokio::test]
    async fn execute_rejects_disallowed_modules() {
        let sandbox = SandboxExecutor::new(SandboxConfig::new().with_allowed_modules(["math"]));
        let err = sandbox
            .execute(
                r#"(module
                  (import "timers" "sleep" (func $sleep (param i64)))
                  (memory (export "memory") 1)
                  (func (export "run") (result i32 i32) i32.const 0 i32.const 0))"#,
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), "ModuleNotAvailable");
        assert!(err.to_string().contains("'timers'"));

        let err = sandbox
            .execute(
                r#"(module
                  (import "wasi_snapshot_preview1" "fd_write"
                    (func $fd_write (param i32 i32 i32 i32) (result i32)))
                  (memory (export "memory") 1)
                  (func (export "run") (result i32 i32) i32.const 0 i32.const 0))"#,
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), "ModuleNotAvailable");
    }

    #[tokio::test]
    async fn allowed_host_functions_are_linked() {
        let output = SandboxExecutor::default()
            .execute(
                r#"(module
                  (import "console" "log" (func $log (param i32 i32)))
                  (import "math" "eval" (func $eval (param i32 i32) (result f64)))
                  (memory (export "memory") 1)
                  (data (i32.const 0) "2 * (3 + 4)")
                  (data (i32.const 16) "true")
                  (func (export "run") (result i32 i32)
                    (call $log (i32.const 0) (i32.const 11))
                    (if (f64.ne (call $eval (i32.const 0) (i32.const 11)) (f64.const 14))
                      (then unreachable))
                    i32.const 16
                    i32.const 4))"#,
            )
            .await
            .unwrap();
        assert_eq!(output, json!(true));
    }

    #[tokio::test]
    async fn traps_are_execution_errors() {
        let err = SandboxExecutor::default()
            .execute(
                r#"(module
                  (memory (export "memory") 1)
                  (func (export "run") (result i32 i32) unreachable))"#,
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), "ExecutionError");
        assert!(err.to_string().contains("unreachable"));
    }

    #[tokio::test]
    async fn infinite_loop_times_out() {
        let sandbox =
            SandboxExecutor::new(SandboxConfig::new().with_timeout(Duration::from_millis(100)));
        let started = Instant::now();
        let err = sandbox.execute(SPIN).await.unwrap_err();
        assert_eq!(err.error_type(), "TimeoutError");
        assert!(err.is_retriable());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn sleeping_past_the_deadline_times_out() {
        let sandbox =
            SandboxExecutor::new(SandboxConfig::new().with_timeout(Duration::from_millis(50)));
        let err = sandbox
            .execute(
                r#"(module
                  (import "timers" "sleep" (func $sleep (param i64)))
                  (memory (export "memory") 1)
                  (func (export "run") (result i32 i32)
                    (call $sleep (i64.const 60000))
                    i32.const 0
                    i32.const 0))"#,
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), "TimeoutError");
    }

    const DEFER: &str = r#"(module
        (import "timers" "defer" (func $defer (param i64)))
        (memory (export "memory") 1)
        (data (i32.const 0) "\"done\"")
        (func (export "run") (result i32 i32)
          (call $defer (i64.const 50))
          i32.const 0
          i32.const 6))"#;

    #[tokio::test]
    async fn deferred_result_is_awaited() {
        let started = Instant::now();
        let output = SandboxExecutor::default().execute(DEFER).await.unwrap();
        assert_eq!(output, json!("done"));
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn deferral_past_the_deadline_times_out() {
        let sandbox =
            SandboxExecutor::new(SandboxConfig::new().with_timeout(Duration::from_millis(20)));
        let err = sandbox.execute(DEFER).await.unwrap_err();
        assert_eq!(err.error_type(), "TimeoutError");
    }

    #[tokio::test]
    async fn exceeding_the_memory_limit_is_an_execution_error() {
        let sandbox = SandboxExecutor::new(SandboxConfig::new().with_memory_limit(1024 * 1024));
        let err = sandbox
            .execute(
                r#"(module
                  (memory (export "memory") 100)
                  (func (export "run") (result i32 i32) i32.const 0 i32.const 0))"#,
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), "ExecutionError");
    }

    #[tokio::test]
    async fn runs_share_no_state() {
        let counter = r#"(module
            (memory (export "memory") 1)
            (data (i32.const 0) "0")
            (func (export "run") (result i32 i32)
              (i32.store8 (i32.const 0)
                (i32.add (i32.load8_u (i32.const 0)) (i32.const 1)))
              i32.const 0
              i32.const 1))"#;
        let sandbox = SandboxExecutor::default();
        let first = sandbox.execute(counter).await.unwrap();
        let second = sandbox.execute(counter).await.unwrap();
        assert_eq!(first, json!(1));
        assert_eq!(second, json!(1));
    }
}
