//! # Dataset Driver
//!
//! Walks a [`DatasetDefinition`]'s collections in declaration order,
//! resolving `perParent` nesting and batching `then`-block mutations until
//! each collection has fully closed. Grounded on the teacher's dataflow
//! driver, which runs one operator per declared relation; collections here
//! are driven in textual order instead, since `perParent` already encodes
//! the only ordering dependency the language has.

use crate::ast::*;
use crate::context::GeneratorContext;
use crate::error::VagueError;
use crate::generator::{field, instance};

pub fn run_dataset(dataset: &DatasetDefinition, ctx: &mut GeneratorContext) -> Result<(), VagueError> {
    for collection in &dataset.collections {
        run_collection(dataset, collection, ctx)?;
    }
    Ok(())
}

fn run_collection(
    dataset: &DatasetDefinition,
    collection: &CollectionDefinition,
    ctx: &mut GeneratorContext,
) -> Result<(), VagueError> {
    let schema = ctx
        .lookup_schema(&collection.schema)
        .cloned()
        .ok_or_else(|| VagueError::UnknownSchemaReference(collection.schema.to_string()))?;

    ctx.datasets.entry(collection.name.clone()).or_default();
    ctx.current_collection = Some(collection.name.clone());

    // (index within this collection, index within the parent collection)
    let mut pending: Vec<(usize, Option<usize>)> = Vec::new();

    match &collection.per_parent {
        Some(parent_name) => {
            let parent_count = ctx.datasets.get(parent_name).map(Vec::len).unwrap_or(0);
            for parent_index in 0..parent_count {
                let parent_snapshot = ctx.datasets[parent_name][parent_index].clone();
                ctx.current_parent = Some(parent_snapshot);
                let n = field::resolve_cardinality(&collection.cardinality, ctx)?;
                for _ in 0..n {
                    let (record, _then) = instance::generate_instance_with_then(
                        &schema,
                        ctx,
                        &collection.overrides,
                        dataset.violating,
                    )?;
                    let records = ctx
                        .datasets
                        .get_mut(&collection.name)
                        .expect("collection registered above");
                    let own_index = records.len();
                    records.push(record);
                    pending.push((own_index, Some(parent_index)));
                }
            }
            ctx.current_parent = None;
        }
        None => {
            let n = field::resolve_cardinality(&collection.cardinality, ctx)?;
            for _ in 0..n {
                let (record, _then) =
                    instance::generate_instance_with_then(&schema, ctx, &collection.overrides, dataset.violating)?;
                let records = ctx
                    .datasets
                    .get_mut(&collection.name)
                    .expect("collection registered above");
                let own_index = records.len();
                records.push(record);
                pending.push((own_index, None));
            }
        }
    }

    if schema.then.is_some() {
        run_pending_then(&schema, &collection.name, collection.per_parent.as_deref(), &pending, ctx);
    }

    ctx.current_collection = None;
    Ok(())
}

/// Runs a schema's `then` block against every instance produced for this
/// collection, only after the whole collection has closed — a forward
/// reference inside `value` to a not-yet-generated sibling collection still
/// resolves to `null`, same as any other identifier miss.
fn run_pending_then(
    schema: &SchemaDefinition,
    collection_name: &str,
    parent_name: Option<&str>,
    pending: &[(usize, Option<usize>)],
    ctx: &mut GeneratorContext,
) {
    let Some(then) = schema.then.clone() else {
        return;
    };
    for &(own_index, parent_index) in pending {
        let own_record = match ctx.datasets.get(collection_name).and_then(|v| v.get(own_index)) {
            Some(r) => r.clone(),
            None => continue,
        };
        let parent_record = match (parent_name, parent_index) {
            (Some(pname), Some(pidx)) => ctx.datasets.get(pname).and_then(|v| v.get(pidx)).cloned(),
            _ => None,
        };

        let mutations =
            instance::resolve_then_mutations(&then, &schema.name, &own_record, parent_record.as_ref(), ctx);

        for mutation in mutations {
            match mutation.target {
                instance::MutationTarget::Own(field_name) => {
                    if let Some(record) = ctx.datasets.get_mut(collection_name).and_then(|v| v.get_mut(own_index)) {
                        instance::apply_to_field(record, &field_name, mutation.op, mutation.value);
                    }
                }
                instance::MutationTarget::Parent(field_name) => {
                    if let (Some(pname), Some(pidx)) = (parent_name, parent_index) {
                        if let Some(record) = ctx.datasets.get_mut(pname).and_then(|v| v.get_mut(pidx)) {
                            instance::apply_to_field(record, &field_name, mutation.op, mutation.value);
                        }
                    }
                }
            }
        }
    }
}
