//! Host capabilities linked into guests.
//!
//! A guest reaches the host only through its function imports. Every import is
//! checked against the allow-list before instantiation, and the linker defines
//! nothing beyond the allowed modules, so filesystem, network and process
//! access are unreachable. `console` is always linked; `math` and `timers` are
//! linked when allowed.
//!
//! | import             | signature          | effect                                    |
//! |--------------------|--------------------|-------------------------------------------|
//! | `console.log`      | `(ptr i32, len i32)` | logs a UTF-8 string at info             |
//! | `console.warn`     | `(ptr i32, len i32)` | logs at warn                            |
//! | `console.error`    | `(ptr i32, len i32)` | logs at error                           |
//! | `math.eval`        | `(ptr i32, len i32) -> f64` | evaluates an arithmetic expression |
//! | `timers.sleep`     | `(ms i64)`         | blocks the guest, bounded by the deadline |
//! | `timers.defer`     | `(ms i64)`         | holds the result back until `ms` elapses  |

use crate::error::ToolCallError;
use crate::sandbox::limits::SandboxLimiter;
use anyhow::{anyhow, bail};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wasmtime::{Caller, Engine, Extern, ExternType, Linker, Module, Store, UpdateDeadline};

/// Every module a guest may be allowed to import, besides `console`.
pub const BUILTIN_MODULES: &[&str] = &["math", "timers"];

const CONSOLE: &str = "console";

/// Functions each host module exports.
const EXPORTS: &[(&str, &[&str])] = &[
    (CONSOLE, &["log", "warn", "error"]),
    ("math", &["eval"]),
    ("timers", &["sleep", "defer"]),
];

/// The run passed its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineExceeded;

impl fmt::Display for DeadlineExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("execution deadline exceeded")
    }
}

impl std::error::Error for DeadlineExceeded {}

/// Store data for one guest run: the only host state a guest can touch.
#[derive(Debug)]
pub struct SandboxState {
    deadline: Instant,
    ready_at: Option<Instant>,
    console_prefix: Arc<str>,
    limiter: SandboxLimiter,
}

impl SandboxState {
    #[must_use]
    pub fn new(deadline: Instant, console_prefix: Arc<str>, memory_limit: usize) -> Self {
        Self {
            deadline,
            ready_at: None,
            console_prefix,
            limiter: SandboxLimiter::new(memory_limit),
        }
    }

    /// When a deferred result becomes available, if the guest deferred it.
    #[must_use]
    pub fn ready_at(&self) -> Option<Instant> {
        self.ready_at
    }

    /// Bytes of linear memory the guest was granted.
    #[must_use]
    pub fn memory_used(&self) -> usize {
        self.limiter.memory_used()
    }

    /// Wraps the state in a store that enforces the memory limit and traps
    /// with [`DeadlineExceeded`] at the first epoch tick past the deadline.
    #[must_use]
    pub fn into_store(self, engine: &Engine) -> Store<Self> {
        let mut store = Store::new(engine, self);
        store.limiter(|state| &mut state.limiter);
        store.set_epoch_deadline(1);
        store.epoch_deadline_callback(|ctx| {
            if Instant::now() >= ctx.data().deadline {
                Err(DeadlineExceeded.into())
            } else {
                Ok(UpdateDeadline::Continue(1))
            }
        });
        store
    }
}

/// The host modules a guest may import from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostModules {
    allowed: BTreeSet<String>,
}

impl HostModules {
    /// Allows `console` plus the named built-in modules. Unknown names are
    /// ignored.
    #[must_use]
    pub fn new(allowed: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            allowed: allowed
                .into_iter()
                .map(Into::into)
                .filter(|m: &String| BUILTIN_MODULES.contains(&m.as_str()))
                .collect(),
        }
    }

    fn links(&self, module: &str) -> bool {
        module == CONSOLE || self.allowed.contains(module)
    }

    /// Whether a guest may import `module.name`.
    #[must_use]
    pub fn provides(&self, module: &str, name: &str) -> bool {
        self.links(module)
            && EXPORTS
                .iter()
                .any(|(m, names)| *m == module && names.contains(&name))
    }

    /// Rejects the first import that is not an allowed host function.
    ///
    /// # Errors
    ///
    /// Returns module-not-available naming the requested module.
    pub fn check_imports(&self, module: &Module) -> Result<(), ToolCallError> {
        for import in module.imports() {
            let is_function = matches!(import.ty(), ExternType::Func(_));
            if !is_function || !self.provides(import.module(), import.name()) {
                tracing::warn!(
                    module = import.module(),
                    name = import.name(),
                    "guest requested a capability outside the allow-list"
                );
                return Err(ToolCallError::module_not_available(import.module()));
            }
        }
        Ok(())
    }

    /// Builds a linker defining exactly the allowed modules.
    ///
    /// # Errors
    ///
    /// Returns an execution error if a host function cannot be defined.
    pub fn linker(&self, engine: &Engine) -> Result<Linker<SandboxState>, ToolCallError> {
        let mut linker = Linker::new(engine);
        let define = |linker: &mut Linker<SandboxState>, module: &str| -> anyhow::Result<()> {
            match module {
                CONSOLE => link_console(linker),
                "math" => link_math(linker),
                "timers" => link_timers(linker),
                _ => Ok(()),
            }
        };

        define(&mut linker, CONSOLE)
            .map_err(|e| ToolCallError::execution("sandbox", format!("could not link console: {e}")))?;
        for module in &self.allowed {
            define(&mut linker, module).map_err(|e| {
                ToolCallError::execution("sandbox", format!("could not link {module}: {e}"))
            })?;
        }
        Ok(linker)
    }
}

/// Reads a UTF-8 string out of the guest's exported memory.
fn read_str(caller: &mut Caller<'_, SandboxState>, ptr: i32, len: i32) -> anyhow::Result<String> {
    let memory = caller
        .get_export("memory")
        .and_then(Extern::into_memory)
        .ok_or_else(|| anyhow!("module does not export its memory"))?;
    let start = usize::try_from(ptr).map_err(|_| anyhow!("negative pointer {ptr}"))?;
    let len = usize::try_from(len).map_err(|_| anyhow!("negative length {len}"))?;
    let bytes = start
        .checked_add(len)
        .and_then(|end| memory.data(&*caller).get(start..end))
        .ok_or_else(|| anyhow!("string at {start}+{len} is outside guest memory"))?;
    Ok(std::str::from_utf8(bytes)?.to_string())
}

fn link_console(linker: &mut Linker<SandboxState>) -> anyhow::Result<()> {
    linker.func_wrap(
        CONSOLE,
        "log",
        |mut caller: Caller<'_, SandboxState>, ptr: i32, len: i32| -> anyhow::Result<()> {
            let line = read_str(&mut caller, ptr, len)?;
            tracing::info!("{} {}", caller.data().console_prefix, line);
            Ok(())
        },
    )?;
    linker.func_wrap(
        CONSOLE,
        "warn",
        |mut caller: Caller<'_, SandboxState>, ptr: i32, len: i32| -> anyhow::Result<()> {
            let line = read_str(&mut caller, ptr, len)?;
            tracing::warn!("{} {}", caller.data().console_prefix, line);
            Ok(())
        },
    )?;
    linker.func_wrap(
        CONSOLE,
        "error",
        |mut caller: Caller<'_, SandboxState>, ptr: i32, len: i32| -> anyhow::Result<()> {
            let line = read_str(&mut caller, ptr, len)?;
            tracing::error!("{} {}", caller.data().console_prefix, line);
            Ok(())
        },
    )?;
    Ok(())
}

/// Evaluates an arithmetic expression such as `2 * (3 + 4)`.
pub fn eval_expression(expression: &str) -> anyhow::Result<f64> {
    let mut namespace = |_: &str, _: Vec<f64>| -> Option<f64> { None };
    fasteval::ez_eval(expression, &mut namespace)
        .map_err(|e| anyhow!("math.eval could not evaluate '{expression}': {e}"))
}

fn link_math(linker: &mut Linker<SandboxState>) -> anyhow::Result<()> {
    linker.func_wrap(
        "math",
        "eval",
        |mut caller: Caller<'_, SandboxState>, ptr: i32, len: i32| -> anyhow::Result<f64> {
            let expression = read_str(&mut caller, ptr, len)?;
            eval_expression(&expression)
        },
    )?;
    Ok(())
}

/// Longest delay a timer accepts: one day.
const MAX_DELAY_MS: i64 = 86_400_000;

fn delay_from(ms: i64, function: &str) -> anyhow::Result<Duration> {
    if !(0..=MAX_DELAY_MS).contains(&ms) {
        bail!("{function} needs a delay between 0 and {MAX_DELAY_MS} ms, got {ms}");
    }
    Ok(Duration::from_millis(ms.unsigned_abs()))
}

fn link_timers(linker: &mut Linker<SandboxState>) -> anyhow::Result<()> {
    linker.func_wrap(
        "timers",
        "sleep",
        |caller: Caller<'_, SandboxState>, ms: i64| -> anyhow::Result<()> {
            let delay = delay_from(ms, "timers.sleep")?;
            let remaining = caller
                .data()
                .deadline
                .saturating_duration_since(Instant::now());
            if delay > remaining {
                std::thread::sleep(remaining);
                return Err(DeadlineExceeded.into());
            }
            std::thread::sleep(delay);
            Ok(())
        },
    )?;
    linker.func_wrap(
        "timers",
        "defer",
        |mut caller: Caller<'_, SandboxState>, ms: i64| -> anyhow::Result<()> {
            let ready_at = Instant::now() + delay_from(ms, "timers.defer")?;
            let state = caller.data_mut();
            state.ready_at = Some(state.ready_at.map_or(ready_at, |at| at.max(ready_at)));
            Ok(())
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_is_always_provided() {
        let modules = HostModules::new(Vec::<String>::new());
        assert!(modules.provides("console", "log"));
        assert!(!modules.provides("math", "eval"));
    }

    #[test]
    fn allow_list_gates_modules_and_functions() {
        let modules = HostModules::new(["math"]);
        assert!(modules.provides("math", "eval"));
        assert!(!modules.provides("math", "exec"));
        assert!(!modules.provides("timers", "sleep"));
        assert!(!modules.provides("wasi_snapshot_preview1", "fd_write"));
    }

    #[test]
    fn unknown_names_are_never_linked() {
        let modules = HostModules::new(["fs", "math"]);
        assert_eq!(modules, HostModules::new(["math"]));
    }

    #[test]
    fn math_eval_uses_expression_parser() {
        assert_eq!(eval_expression("2 * (3 + 4)").unwrap(), 14.0);
        assert!(eval_expression("2 +").is_err());
    }

    #[test]
    fn delays_are_bounded() {
        assert_eq!(delay_from(250, "t").unwrap(), Duration::from_millis(250));
        assert!(delay_from(-1, "t").is_err());
        assert!(delay_from(MAX_DELAY_MS + 1, "t").is_err());
    }
}
