//! # Instance Generator
//!
//! Produces one record for a schema: resolves the effective (base-merged)
//! field list, runs the constraint-retry loop, and applies `refine`/`then`
//! blocks (spec §4.6). Grounded on the teacher's per-row materialization
//! pass, generalized from "apply column defaults" to "retry until every
//! `assume` holds".

use crate::ast::*;
use crate::context::GeneratorContext;
use crate::error::VagueError;
use crate::eval;
use crate::generator::field::{self, FieldOutcome};
use crate::value::{Record, Value};
use crate::warning::{ConstraintMode, Warning};
use std::collections::{HashMap, HashSet};

/// Generates one record, applying `overrides` (from a `CollectionDefinition`
/// or `context` block) before normal field generation runs.
pub fn generate_instance(
    schema: &SchemaDefinition,
    ctx: &mut GeneratorContext,
    overrides: &[(String, Expression)],
) -> Result<Record, VagueError> {
    let (record, _then) = generate_instance_with_then(schema, ctx, overrides, false)?;
    Ok(record)
}

/// Same as [`generate_instance`] but also returns the schema's `then` block,
/// for the dataset driver to schedule after the collection closes.
pub fn generate_instance_with_then(
    schema: &SchemaDefinition,
    ctx: &mut GeneratorContext,
    overrides: &[(String, Expression)],
    violating: bool,
) -> Result<(Record, Option<ThenBlock>), VagueError> {
    let fields = effective_fields(schema, ctx);
    let cap = ctx.config.retries.constraint;

    let mut last_record = Record::new();
    for attempt in 0..cap.max(1) {
        let saved_schema = ctx.current_schema.clone();
        ctx.current_schema = Some(schema.name.clone());
        ctx.current_record = Record::new();

        apply_overrides(schema, overrides, &fields, ctx);
        generate_non_computed(&fields, &schema.name, ctx)?;
        evaluate_computed(&fields, &schema.name, ctx)?;

        let record = ctx.current_record.clone();
        let satisfied = evaluate_assumptions(&schema.assumptions, ctx, violating)?;
        last_record = record;
        ctx.current_schema = saved_schema;

        if satisfied {
            apply_refine(schema, ctx)?;
            return Ok((ctx.current_record.clone(), schema.then.clone()));
        }
        if attempt + 1 == cap {
            ctx.push_warning(Warning::ConstraintRetryLimit {
                scope: schema.name.clone(),
                attempts: cap,
                mode: if violating {
                    ConstraintMode::Violating
                } else {
                    ConstraintMode::Satisfying
                },
            });
        }
    }
    Ok((last_record, schema.then.clone()))
}

/// Inherits fields from an imported `base` schema (own fields override by
/// name, keeping the base's relative order for everything not overridden).
fn effective_fields(schema: &SchemaDefinition, ctx: &GeneratorContext) -> Vec<FieldDefinition> {
    let Some(base_name) = &schema.base else {
        return schema.fields.clone();
    };
    let Some(base) = ctx.lookup_schema(base_name) else {
        return schema.fields.clone();
    };
    let own_names: HashSet<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
    let mut fields: Vec<FieldDefinition> = base
        .fields
        .iter()
        .filter(|f| !own_names.contains(f.name.as_str()))
        .cloned()
        .collect();
    fields.extend(schema.fields.clone());
    fields
}

fn apply_overrides(
    schema: &SchemaDefinition,
    overrides: &[(String, Expression)],
    fields: &[FieldDefinition],
    ctx: &mut GeneratorContext,
) {
    let known: HashSet<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    for (name, expr) in overrides {
        if !known.contains(name.as_str()) {
            if let Some(base) = &schema.base {
                ctx.push_warning(Warning::UnknownFieldInBase {
                    schema: schema.name.clone(),
                    field: name.clone(),
                    import_source: base.to_string(),
                });
            }
        }
        if let Ok(value) = eval::eval(expr, ctx, None) {
            ctx.current_record.insert(name.clone(), value);
        }
    }
}

fn generate_non_computed(fields: &[FieldDefinition], schema_name: &str, ctx: &mut GeneratorContext) -> Result<(), VagueError> {
    for def in fields {
        if def.flags.computed || ctx.current_record.contains_key(&def.name) {
            continue;
        }
        match field::generate_field(def, schema_name, ctx)? {
            FieldOutcome::Value(v) => {
                ctx.current_record.insert(def.name.clone(), v);
            }
            FieldOutcome::Omitted | FieldOutcome::Deferred => {}
        }
    }
    Ok(())
}

fn evaluate_computed(fields: &[FieldDefinition], schema_name: &str, ctx: &mut GeneratorContext) -> Result<(), VagueError> {
    let computed: Vec<&FieldDefinition> = fields
        .iter()
        .filter(|f| f.flags.computed && !ctx.current_record.contains_key(&f.name))
        .collect();
    if computed.is_empty() {
        return Ok(());
    }
    let order = topological_order(&computed, schema_name)?;
    for def in order {
        if let Some(when) = &def.when {
            if !eval::eval(when, ctx, None)?.truthy() {
                continue;
            }
        }
        let Some(expr) = &def.computed_expr else {
            continue;
        };
        ctx.current_field = Some(def.name.clone());
        let value = eval::eval(expr, ctx, None)?;
        let value = if def.flags.unique {
            field::enforce_unique(ctx, schema_name, &def.name, value, |ctx| eval::eval(expr, ctx, None))?
        } else {
            value
        };
        ctx.current_record.insert(def.name.clone(), value);
    }
    Ok(())
}

fn topological_order<'a>(
    computed: &[&'a FieldDefinition],
    schema_name: &str,
) -> Result<Vec<&'a FieldDefinition>, VagueError> {
    let names: HashSet<&str> = computed.iter().map(|f| f.name.as_str()).collect();
    let mut deps: HashMap<&str, HashSet<&str>> = HashMap::new();
    for def in computed {
        let refs = def
            .computed_expr
            .as_ref()
            .map(collect_identifiers)
            .unwrap_or_default();
        let edges: HashSet<&str> = refs
            .iter()
            .filter(|r| names.contains(r.as_str()) && r.as_str() != def.name)
            .map(|r| names.get(r.as_str()).copied().unwrap())
            .collect();
        deps.insert(def.name.as_str(), edges);
    }

    let mut order = Vec::with_capacity(computed.len());
    let mut visited: HashSet<&str> = HashSet::new();
    let mut visiting: HashSet<&str> = HashSet::new();

    fn visit<'a>(
        name: &'a str,
        computed: &[&'a FieldDefinition],
        deps: &HashMap<&'a str, HashSet<&'a str>>,
        visited: &mut HashSet<&'a str>,
        visiting: &mut HashSet<&'a str>,
        order: &mut Vec<&'a FieldDefinition>,
        schema_name: &str,
    ) -> Result<(), VagueError> {
        if visited.contains(name) {
            return Ok(());
        }
        if visiting.contains(name) {
            return Err(VagueError::CircularDependency {
                schema: schema_name.to_string(),
                cycle: name.to_string(),
            });
        }
        visiting.insert(name);
        if let Some(edges) = deps.get(name) {
            for dep in edges {
                visit(dep, computed, deps, visited, visiting, order, schema_name)?;
            }
        }
        visiting.remove(name);
        visited.insert(name);
        if let Some(def) = computed.iter().find(|f| f.name == name) {
            order.push(def);
        }
        Ok(())
    }

    for def in computed {
        visit(&def.name, computed, &deps, &mut visited, &mut visiting, &mut order, schema_name)?;
    }
    Ok(order)
}

fn collect_identifiers(expr: &Expression) -> Vec<String> {
    let mut out = Vec::new();
    walk_identifiers(expr, &mut out);
    out
}

fn walk_identifiers(expr: &Expression, out: &mut Vec<String>) {
    match expr {
        Expression::Identifier(name) => out.push(name.clone()),
        Expression::QualifiedName(q) => {
            if let Some(first) = q.parts.first() {
                out.push(first.clone());
            }
        }
        Expression::ElementProperty(_) | Expression::Literal(_) | Expression::ParentReference(_) => {}
        Expression::Binary { left, right, .. } | Expression::Logical { left, right, .. } => {
            walk_identifiers(left, out);
            walk_identifiers(right, out);
        }
        Expression::Not(inner) | Expression::Unary { expr: inner, .. } => walk_identifiers(inner, out),
        Expression::Ternary {
            condition,
            if_true,
            if_false,
        } => {
            walk_identifiers(condition, out);
            walk_identifiers(if_true, out);
            walk_identifiers(if_false, out);
        }
        Expression::Range { min, max } => {
            walk_identifiers(min, out);
            if let Some(m) = max {
                walk_identifiers(m, out);
            }
        }
        Expression::Superposition(options) => {
            for o in options {
                walk_identifiers(&o.value, out);
            }
        }
        Expression::AnyOf { collection, condition } => {
            walk_identifiers(collection, out);
            if let Some(c) = condition {
                walk_identifiers(c, out);
            }
        }
        Expression::Match {
            subject,
            arms,
            default,
        } => {
            walk_identifiers(subject, out);
            for (p, v) in arms {
                walk_identifiers(p, out);
                walk_identifiers(v, out);
            }
            if let Some(d) = default {
                walk_identifiers(d, out);
            }
        }
        Expression::Call { args, .. } => {
            for a in args {
                walk_identifiers(a, out);
            }
        }
    }
}

fn evaluate_assumptions(
    assumptions: &[AssumeClause],
    ctx: &mut GeneratorContext,
    violating: bool,
) -> Result<bool, VagueError> {
    if assumptions.is_empty() {
        return Ok(true);
    }
    let mut any_false = false;
    for clause in assumptions {
        if let Some(condition) = &clause.condition {
            match eval::eval(condition, ctx, None) {
                Ok(v) if !v.truthy() => continue,
                Err(e) => {
                    ctx.push_warning(Warning::ConstraintEvaluationError {
                        error_text: e.to_string(),
                    });
                    any_false = true;
                    continue;
                }
                Ok(_) => {}
            }
        }
        for constraint in &clause.constraints {
            match eval::eval(constraint, ctx, None) {
                Ok(v) if v.truthy() => {}
                Ok(_) => any_false = true,
                Err(e) => {
                    ctx.push_warning(Warning::ConstraintEvaluationError {
                        error_text: e.to_string(),
                    });
                    any_false = true;
                }
            }
        }
    }
    Ok(if violating { any_false } else { !any_false })
}

fn apply_refine(schema: &SchemaDefinition, ctx: &mut GeneratorContext) -> Result<(), VagueError> {
    let Some(refine) = &schema.refine else {
        return Ok(());
    };
    for refine_field in &refine.fields {
        if let Some(condition) = &refine_field.condition {
            if !eval::eval(condition, ctx, None)?.truthy() {
                continue;
            }
        }
        if let FieldOutcome::Value(v) = field::generate_field(&refine_field.field, &schema.name, ctx)? {
            ctx.current_record.insert(refine_field.field.name.clone(), v);
        }
    }
    Ok(())
}

/// Where a `then`-block mutation lands once its value has been evaluated.
pub enum MutationTarget {
    Own(String),
    Parent(String),
}

pub struct ResolvedMutation {
    pub target: MutationTarget,
    pub op: MutationOp,
    pub value: Value,
}

/// Evaluates a schema's deferred `then` mutations against snapshots of the
/// instance that just closed and its parent (if any), without touching
/// `ctx.datasets` directly — the dataset driver applies the result, since it
/// alone holds the mutable collection storage both a `^parent` and an
/// own-field target may need.
pub fn resolve_then_mutations(
    then: &ThenBlock,
    schema_name: &str,
    own_record: &Record,
    parent_record: Option<&Record>,
    ctx: &mut GeneratorContext,
) -> Vec<ResolvedMutation> {
    let mut resolved = Vec::new();
    for mutation in &then.mutations {
        let saved_record = std::mem::replace(&mut ctx.current_record, own_record.clone());
        let saved_parent = ctx.current_parent.take();
        ctx.current_parent = parent_record.cloned();

        let evaluated = eval::eval(&mutation.value, ctx, None);

        ctx.current_record = saved_record;
        ctx.current_parent = saved_parent;

        let value = match evaluated {
            Ok(v) => v,
            Err(_) => {
                ctx.push_warning(Warning::MutationTargetNotFound {
                    schema: schema_name.to_string(),
                });
                continue;
            }
        };

        let target = match &mutation.target {
            Expression::ParentReference(path) if parent_record.is_some() => {
                path.first().map(|f| MutationTarget::Parent(f.clone()))
            }
            Expression::Identifier(name) => Some(MutationTarget::Own(name.clone())),
            _ => None,
        };

        match target {
            Some(target) => resolved.push(ResolvedMutation {
                target,
                op: mutation.op,
                value,
            }),
            None => ctx.push_warning(Warning::MutationTargetNotFound {
                schema: schema_name.to_string(),
            }),
        }
    }
    resolved
}

/// Applies one resolved mutation's effect to a record already materialized
/// in `ctx.datasets`.
pub fn apply_to_field(record: &mut Record, field: &str, op: MutationOp, new_value: Value) {
    match op {
        MutationOp::Assign => {
            record.insert(field.to_string(), new_value);
        }
        MutationOp::AddAssign => {
            let existing = record.get(field).cloned().unwrap_or(Value::Int(0));
            record.insert(field.to_string(), add_values(&existing, &new_value));
        }
    }
}

fn add_values(a: &Value, b: &Value) -> Value {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => {
            if matches!(a, Value::Int(_)) && matches!(b, Value::Int(_)) {
                Value::Int((x + y) as i64)
            } else {
                Value::Number(x + y)
            }
        }
        _ => b.clone(),
    }
}
