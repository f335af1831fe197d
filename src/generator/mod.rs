//! # Generation Pipeline
//!
//! Three layers, narrowest first: [`field`] turns one field definition into
//! a value, [`instance`] assembles a whole record (retrying until its
//! `assume`s hold), and [`dataset`] drives a dataset's collections in order,
//! wiring up `perParent` nesting and deferred `then`-block mutations.

pub mod dataset;
pub mod field;
pub mod instance;
