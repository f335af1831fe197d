//! # Generator Context
//!
//! The single mutable state threaded through field/instance/dataset
//! generation: resolved schemas, `let` bindings, the dataset map (collection
//! name -> records generated so far, in declaration order), unique-value
//! pools, the seeded RNG, retry limits, and accumulated warnings. Grounded
//! on the teacher's `schema::Catalog`, which plays the same "one struct, one
//! lock-free pass per compile" role for Datalog's relation definitions.

use crate::ast::*;
use crate::config::Config;
use crate::error::VagueError;
use crate::registry::{GeneratorEnv, PluginRegistry};
use crate::rng::Rng;
use crate::unique_pool::UniquePool;
use crate::value::{Record, Value};
use crate::warning::{Warning, WarningCollector};
use chrono::NaiveDate;
use indexmap::IndexMap;
use std::collections::HashMap;

/// The reference date the deterministic clock offsets from — see
/// [`GeneratorContext::today`].
const CLOCK_EPOCH_YEAR: i32 = 2024;
const CLOCK_EPOCH_MONTH: u32 = 1;
const CLOCK_EPOCH_DAY: u32 = 1;
const CLOCK_WINDOW_DAYS: i64 = 3650;

pub struct GeneratorContext<'a> {
    pub config: Config,
    pub registry: &'a PluginRegistry,
    pub rng: Rng,
    pub warnings: WarningCollector,

    /// Cached result of [`GeneratorContext::today`]; sampled from the RNG
    /// at most once per compilation so every date-typed field and every
    /// `now`/`today` builtin call agrees on "today" for that run.
    clock_today: Option<NaiveDate>,

    pub schemas: HashMap<String, SchemaDefinition>,
    pub contexts: HashMap<String, ContextDefinition>,
    pub distributions: HashMap<String, DistributionDefinition>,
    pub lets: HashMap<String, Value>,

    /// Records generated so far, keyed by collection name, in the order
    /// they were produced. Consulted by `any of`, `^parent`, and
    /// `previous(field)`.
    pub datasets: IndexMap<String, Vec<Record>>,

    pub unique_pool: UniquePool,
    sequence_counters: HashMap<(String, String), i64>,

    /// The record currently under construction, and its immediate parent
    /// (if the enclosing collection is `perParent`), used by field
    /// generators before the record is appended to `datasets`.
    pub current_collection: Option<String>,
    pub current_schema: Option<String>,
    pub current_field: Option<String>,
    pub current_record: Record,
    pub current_parent: Option<Record>,
}

impl<'a> GeneratorContext<'a> {
    pub fn new(config: Config, registry: &'a PluginRegistry, rng: Rng) -> Self {
        GeneratorContext {
            config,
            registry,
            rng,
            warnings: WarningCollector::new(),
            clock_today: None,
            schemas: HashMap::new(),
            contexts: HashMap::new(),
            distributions: HashMap::new(),
            lets: HashMap::new(),
            datasets: IndexMap::new(),
            unique_pool: UniquePool::new(),
            sequence_counters: HashMap::new(),
            current_collection: None,
            current_schema: None,
            current_field: None,
            current_record: Record::new(),
            current_parent: None,
        }
    }

    /// The deterministic "now" every date-typed field and `now`/`today`
    /// builtin anchors on: an offset sampled from the seeded RNG against a
    /// fixed epoch, not a wall-clock read, so `(source, seed)` alone
    /// determines it (spec invariant: the RNG is the only source of
    /// nondeterminism). Sampled once and cached for the rest of the
    /// compilation.
    pub fn today(&mut self) -> NaiveDate {
        if let Some(date) = self.clock_today {
            return date;
        }
        let epoch = NaiveDate::from_ymd_opt(CLOCK_EPOCH_YEAR, CLOCK_EPOCH_MONTH, CLOCK_EPOCH_DAY)
            .expect("valid calendar constant");
        let offset = self.rng.int_range(0, CLOCK_WINDOW_DAYS);
        let date = epoch + chrono::Duration::days(offset);
        self.clock_today = Some(date);
        date
    }

    pub fn next_sequence(&mut self, field: &str, start: i64, step: i64) -> i64 {
        let collection = self.current_collection.clone().unwrap_or_default();
        let counter = self
            .sequence_counters
            .entry((collection, field.to_string()))
            .or_insert(start - step);
        *counter += step;
        *counter
    }

    pub fn previous_record(&self, field: &str) -> Option<&Value> {
        let name = self.current_collection.as_deref()?;
        let records = self.datasets.get(name)?;
        records.last().and_then(|r| r.get(field))
    }

    pub fn lookup_schema(&self, name: &QualifiedName) -> Option<&SchemaDefinition> {
        self.schemas
            .get(&name.to_string())
            .or_else(|| self.schemas.get(name.parts.last()?))
    }

    pub fn push_warning(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }
}

impl<'a> GeneratorEnv for GeneratorContext<'a> {
    fn rng(&mut self) -> &mut Rng {
        &mut self.rng
    }

    fn current_record(&self) -> &Record {
        &self.current_record
    }

    fn parent_record(&self) -> Option<&Record> {
        self.current_parent.as_ref()
    }

    fn config(&self) -> &Config {
        &self.config
    }
}

/// Merges an imported program's top-level definitions into `ctx`'s
/// namespaces under `alias.` prefixes, per spec's `import NAME from PATH`.
pub fn merge_import(
    ctx: &mut GeneratorContext,
    alias: &str,
    program: &Program,
) -> Result<(), VagueError> {
    for statement in &program.statements {
        match statement {
            Statement::Schema(schema) => {
                let mut schema = schema.clone();
                schema.name = format!("{alias}.{}", schema.name);
                ctx.schemas.insert(schema.name.clone(), schema);
            }
            Statement::Context(context) => {
                let mut context = context.clone();
                context.name = format!("{alias}.{}", context.name);
                ctx.contexts.insert(context.name.clone(), context);
            }
            Statement::Distribution(distribution) => {
                let mut distribution = distribution.clone();
                distribution.name = format!("{alias}.{}", distribution.name);
                ctx.distributions.insert(distribution.name.clone(), distribution);
            }
            Statement::Let { .. } | Statement::Dataset(_) | Statement::Import { .. } => {
                // Datasets and further imports aren't re-exported; `let`
                // bindings are file-local.
            }
        }
    }
    Ok(())
}
