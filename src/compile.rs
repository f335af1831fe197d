//! # Compile Entry Point
//!
//! `compile()` is the library's single entry point: lex, parse, register
//! declarations, drive every dataset, and hand back the resulting
//! collections plus any accumulated warnings. Grounded on the teacher's
//! top-level `compile`/`run` pipeline in `lib.rs`, which performs the same
//! parse-then-evaluate shape over a Datalog program.

use crate::ast::Statement;
use crate::config::Config;
use crate::context::{self, GeneratorContext};
use crate::error::VagueError;
use crate::eval;
use crate::generator::dataset;
use crate::parser;
use crate::registry::{self, GeneratorFn, StatementParser};
use crate::rng::{Rng, Seed};
use crate::value::{Record, RecordHandle, ResolvingValue, Value};
use crate::warning::Warning;
use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves `import NAME from PATH` statements: callers supply the source
/// text for every path a program might import, since the core library
/// never touches a filesystem directly.
pub type ImportSources = HashMap<String, String>;

/// Everything a successful `compile` call produced.
pub struct CompileOutput {
    pub datasets: IndexMap<String, Vec<Record>>,
    pub warnings: Vec<Warning>,
}

impl CompileOutput {
    pub fn collection(&self, name: &str) -> Option<&[Record]> {
        self.datasets.get(name).map(Vec::as_slice)
    }
}

/// Follows `Value::Ref` handles back into `datasets` so serialization embeds
/// the referenced record rather than a bare collection/index pair.
impl crate::value::HandleResolver for CompileOutput {
    fn resolve(&self, handle: &RecordHandle) -> Option<&Record> {
        self.datasets.get(&handle.collection)?.get(handle.index)
    }
}

struct ResolvingRows<'a> {
    records: &'a [Record],
    resolver: &'a CompileOutput,
}

impl<'a> Serialize for ResolvingRows<'a> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.records.len()))?;
        for record in self.records {
            let value = Value::Record(record.clone());
            seq.serialize_element(&ResolvingValue {
                value: &value,
                resolver: self.resolver,
            })?;
        }
        seq.end()
    }
}

impl Serialize for CompileOutput {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.datasets.len()))?;
        for (name, records) in &self.datasets {
            map.serialize_entry(
                name,
                &ResolvingRows {
                    records,
                    resolver: self,
                },
            )?;
        }
        map.end()
    }
}

/// Compiles one top-level source file against `seed`/`config`, resolving any
/// `import` statements against `imports`. The returned `CompileOutput` is
/// self-contained: its `Value::Ref` handles all resolve within its own
/// `datasets` map.
pub fn compile(
    source: &str,
    seed: Seed,
    config: Config,
    imports: &ImportSources,
) -> Result<CompileOutput, VagueError> {
    let registry_guard = registry::global().read();
    let registry = &*registry_guard;

    let program = parser::parse_with_registry(source, registry)?;
    let rng = Rng::new(seed);
    let mut ctx = GeneratorContext::new(config, registry, rng);

    register_declarations(&program.statements, imports, registry, &mut ctx)?;

    for statement in &program.statements {
        if let Statement::Dataset(def) = statement {
            dataset::run_dataset(def, &mut ctx)?;
        }
    }

    Ok(CompileOutput {
        datasets: ctx.datasets,
        warnings: ctx.warnings.into_vec(),
    })
}

/// First pass over the program: schemas, contexts, distributions, `let`
/// bindings, and imports are all registered before any dataset runs, so a
/// dataset may reference a schema declared later in the same file.
fn register_declarations(
    statements: &[Statement],
    imports: &ImportSources,
    registry: &crate::registry::PluginRegistry,
    ctx: &mut GeneratorContext,
) -> Result<(), VagueError> {
    for statement in statements {
        match statement {
            Statement::Import { name, path } => {
                let source_text = imports.get(path).ok_or_else(|| {
                    VagueError::Fatal(format!("unresolved import path '{path}' (aliased '{name}')"))
                })?;
                let imported = parser::parse_with_registry(source_text, registry)?;
                context::merge_import(ctx, name, &imported)?;
            }
            Statement::Schema(schema) => {
                ctx.schemas.insert(schema.name.clone(), schema.clone());
            }
            Statement::Context(context_def) => {
                ctx.contexts.insert(context_def.name.clone(), context_def.clone());
            }
            Statement::Distribution(dist) => {
                ctx.distributions.insert(dist.name.clone(), dist.clone());
            }
            Statement::Let { name, value } => {
                let resolved = eval::eval(value, ctx, None)?;
                ctx.lets.insert(name.clone(), resolved);
            }
            Statement::Dataset(_) => {
                // Driven in the second pass, once every declaration is known.
            }
        }
    }
    Ok(())
}

/// Registers a named generator function in the process-wide plugin registry
/// (spec §4.8's `registerPlugin`).
pub fn register_plugin(name: impl Into<String>, f: GeneratorFn) {
    registry::global().write().register_generator(name, f);
}

/// Removes a previously-registered generator, falling back to "undefined
/// generator" behavior for any field that still names it.
pub fn unregister_plugin(name: &str) {
    registry::global().write().unregister_generator(name);
}

/// Registers a new lexer keyword. Returns `false` if it collides with a
/// built-in keyword.
pub fn register_keyword(word: &str) -> bool {
    registry::global().write().register_keyword(word)
}

/// Registers a fallback statement-level syntax extension.
pub fn register_statement_parser(parser: Arc<dyn StatementParser>) {
    registry::global().write().register_statement_parser(parser);
}

/// Restores the process-wide plugin registry to its builtins-only state.
pub fn reset_plugins() {
    registry::reset_global();
}
