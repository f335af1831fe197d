//! # Plugin Registry
//!
//! A process-wide, resettable registry for the three extension points spec
//! callers can hook into: lexer keywords, statement-level syntax, and named
//! generator functions (spec §4.8). Grounded on the teacher's
//! `storage::catalog` module, which holds similarly-shaped mutable global
//! state behind a `parking_lot::RwLock` rather than a `Mutex`, because reads
//! (one per lex/parse/generate call) vastly outnumber writes (one per
//! `registerPlugin`).

pub mod builtin;

use crate::ast::Statement;
use crate::config::Config;
use crate::error::VagueError;
use crate::lexer::{KeywordTable, Token};
use crate::rng::Rng;
use crate::value::{Record, Value};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// What a generator function call sees of the record under construction.
/// A trait, not a concrete struct, so [`GeneratorFn`] doesn't have to depend
/// on `crate::context` (which itself depends on the registry for plugin
/// lookups during generation).
pub trait GeneratorEnv {
    fn rng(&mut self) -> &mut Rng;
    fn current_record(&self) -> &Record;
    fn parent_record(&self) -> Option<&Record>;
    fn config(&self) -> &Config;
}

pub type GeneratorFn =
    Arc<dyn Fn(&[Value], &mut dyn GeneratorEnv) -> Result<Value, VagueError> + Send + Sync>;

/// Attempts to parse one statement out of the token stream. Returns the
/// parsed statement and the number of tokens it consumed, or `None` if this
/// parser doesn't recognize what's at `tokens[pos]`.
pub trait StatementParser: Send + Sync {
    fn try_parse(&self, tokens: &[Token], pos: usize) -> Option<(Statement, usize)>;
}

#[derive(Default)]
pub struct PluginRegistry {
    keywords: KeywordTable,
    generators: HashMap<String, GeneratorFn>,
    statement_parsers: Vec<Arc<dyn StatementParser>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        let mut registry = PluginRegistry::default();
        builtin::install(&mut registry);
        registry
    }

    pub fn keywords(&self) -> &KeywordTable {
        &self.keywords
    }

    /// Registers a new lexer keyword. Returns `false` if it shadows a
    /// built-in keyword (rejected, per spec §4.2).
    pub fn register_keyword(&mut self, word: &str) -> bool {
        self.keywords.register(word)
    }

    pub fn register_generator(&mut self, name: impl Into<String>, f: GeneratorFn) {
        self.generators.insert(name.into(), f);
    }

    pub fn generator(&self, name: &str) -> Option<&GeneratorFn> {
        self.generators.get(name)
    }

    pub fn register_statement_parser(&mut self, parser: Arc<dyn StatementParser>) {
        self.statement_parsers.push(parser);
    }

    pub fn try_parse_statement(&self, tokens: &[Token], pos: usize) -> Option<(Statement, usize)> {
        self.statement_parsers
            .iter()
            .find_map(|p| p.try_parse(tokens, pos))
    }

    pub fn unregister_generator(&mut self, name: &str) {
        self.generators.remove(name);
    }
}

/// The process-wide registry callers mutate via `register_plugin`/
/// `unregister_plugin` (spec §4.8). Resettable, since a long-lived test
/// process or REPL must be able to return to a clean slate between runs.
static GLOBAL_REGISTRY: OnceLock<RwLock<PluginRegistry>> = OnceLock::new();

pub fn global() -> &'static RwLock<PluginRegistry> {
    GLOBAL_REGISTRY.get_or_init(|| RwLock::new(PluginRegistry::new()))
}

/// Replaces the global registry with a fresh, builtins-only instance.
pub fn reset_global() {
    *global().write() = PluginRegistry::new();
}
