//! # Vague
//!
//! A declarative language for generating realistic, constraint-respecting
//! synthetic datasets. A program declares `schema`s (the shape of one kind
//! of record, with fields drawn from primitives, ranges, superpositions, or
//! arbitrary expressions), then one or more `dataset`s that say how many of
//! each schema to produce and how they nest.
//!
//! ```text
//! schema User {
//!     id: unique int
//!     name: faker.name()
//!     age: 18..65
//! }
//!
//! dataset Sample {
//!     users: 100 of User
//! }
//! ```
//!
//! The pipeline is a straight line: [`lexer`] tokenizes, [`parser`] builds
//! the [`ast`], [`compile::compile`] walks the program twice (declarations,
//! then datasets), and [`generator`] does the actual row-by-row work —
//! [`generator::field`] for one field, [`generator::instance`] for one
//! record, [`generator::dataset`] for one collection. [`eval`] is the
//! expression interpreter both the field generator and constraint checker
//! call into. [`context`] is the mutable state threaded through all of it;
//! [`registry`] is the process-wide extension point for plugin-defined
//! generators, keywords, and statement syntax.
//!
//! Fatal problems ([`error::VagueError`]) abort `compile` with no partial
//! result; recoverable ones ([`warning::Warning`]) accumulate in the
//! returned [`compile::CompileOutput`] instead.

pub mod ast;
pub mod compile;
pub mod config;
pub mod context;
pub mod error;
pub mod eval;
pub mod generator;
pub mod lexer;
pub mod parser;
pub mod registry;
pub mod rng;
pub mod unique_pool;
pub mod value;
pub mod warning;

pub use compile::{compile, CompileOutput, ImportSources};
pub use config::Config;
pub use error::{VagueError, VagueResult};
pub use rng::Seed;
pub use warning::Warning;
