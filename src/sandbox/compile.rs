//! Guest compilation.
//!
//! Source is a WebAssembly text module. It is parsed with `wast` so syntax and
//! name-resolution errors carry a line and column, then validated and compiled
//! by wasmtime, then checked for the exports a run needs.

use crate::sandbox::diagnostic::{Diagnostic, Position};
use wasmtime::{Engine, ExternType, Module, ValType};
use wast::core::{ModuleField, ModuleKind};
use wast::parser::{self, ParseBuffer};
use wast::token::Span;
use wast::Wat;

/// Function a guest exports to be run: `[] -> [ptr i32, len i32]`.
pub const ENTRY_POINT: &str = "run";

/// Memory a guest exports for strings and its result.
pub const MEMORY_EXPORT: &str = "memory";

/// Compiles `source`, or returns every diagnostic found.
pub fn compile(engine: &Engine, source: &str) -> Result<Module, Vec<Diagnostic>> {
    let mut diagnostics = Vec::new();
    let Some((bytes, origin)) = encode(source, &mut diagnostics) else {
        return Err(diagnostics);
    };

    match Module::new(engine, &bytes) {
        Ok(module) => {
            check_exports(&module, origin, &mut diagnostics);
            if diagnostics.is_empty() {
                Ok(module)
            } else {
                Err(diagnostics)
            }
        }
        Err(error) => {
            diagnostics.push(Diagnostic::error(
                origin,
                format!("invalid module: {}", error.root_cause()),
            ));
            Err(diagnostics)
        }
    }
}

fn position(span: Span, source: &str) -> Position {
    let (line, column) = span.linecol_in(source);
    Position::new(
        u32::try_from(line + 1).unwrap_or(u32::MAX),
        u32::try_from(column + 1).unwrap_or(u32::MAX),
    )
}

/// Parses and encodes the text module. Returns the binary and the position
/// of the `(module` form.
fn encode(source: &str, diagnostics: &mut Vec<Diagnostic>) -> Option<(Vec<u8>, Position)> {
    let syntax = |error: wast::Error| Diagnostic::error(position(error.span(), source), error.message());

    let buffer = match ParseBuffer::new(source) {
        Ok(buffer) => buffer,
        Err(error) => {
            diagnostics.push(syntax(error));
            return None;
        }
    };
    let mut wat = match parser::parse::<Wat>(&buffer) {
        Ok(wat) => wat,
        Err(error) => {
            diagnostics.push(syntax(error));
            return None;
        }
    };

    let origin = match &wat {
        Wat::Module(module) => {
            let origin = position(module.span, source);
            if let ModuleKind::Text(fields) = &module.kind {
                if fields.iter().any(|f| matches!(f, ModuleField::Start(_))) {
                    diagnostics.push(Diagnostic::warning(
                        origin,
                        "start function runs during instantiation, before `run`",
                    ));
                }
            }
            origin
        }
        Wat::Component(component) => {
            diagnostics.push(Diagnostic::error(
                position(component.span, source),
                "components are not supported; write a core `(module ...)`",
            ));
            return None;
        }
    };

    match wat.encode() {
        Ok(bytes) => Some((bytes, origin)),
        Err(error) => {
            diagnostics.push(syntax(error));
            None
        }
    }
}

fn check_exports(module: &Module, origin: Position, diagnostics: &mut Vec<Diagnostic>) {
    match module.get_export(ENTRY_POINT) {
        Some(ExternType::Func(ty)) => {
            let returns_slice = ty.params().len() == 0
                && ty.results().len() == 2
                && ty.results().all(|t| matches!(t, ValType::I32));
            if !returns_slice {
                diagnostics.push(Diagnostic::error(
                    origin,
                    format!(
                        "export `{ENTRY_POINT}` takes {} parameter(s) and returns {} value(s); expected no parameters and (i32, i32)",
                        ty.params().len(),
                        ty.results().len()
                    ),
                ));
            }
        }
        Some(_) => diagnostics.push(Diagnostic::error(
            origin,
            format!("export `{ENTRY_POINT}` must be a function"),
        )),
        None => diagnostics.push(Diagnostic::error(
            origin,
            format!("module must export a function `{ENTRY_POINT}` returning (ptr i32, len i32)"),
        )),
    }

    if !matches!(module.get_export(MEMORY_EXPORT), Some(ExternType::Memory(_))) {
        diagnostics.push(Diagnostic::error(
            origin,
            format!("module must export its linear memory as `{MEMORY_EXPORT}`"),
        ));
    }
}
