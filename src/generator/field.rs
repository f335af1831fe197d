//! # Field Generator
//!
//! Turns one [`FieldDefinition`] into a value (or a deferred/omitted
//! outcome), per spec §4.5. Grounded on the teacher's `storage` value
//! construction pass: a big per-variant match producing a `Value`, with the
//! same "sensible default for an unconstrained primitive" posture the
//! teacher takes for untyped columns.

use crate::ast::*;
use crate::context::GeneratorContext;
use crate::error::VagueError;
use crate::eval::{self, pick_superposition};
use crate::value::Value;
use chrono::{Duration, NaiveDate};

pub enum FieldOutcome {
    /// `when` evaluated false: the field does not appear in the record.
    Omitted,
    /// The field is computed; scheduling happens in the instance generator.
    Deferred,
    Value(Value),
}

pub fn generate_field(
    field: &FieldDefinition,
    schema_name: &str,
    ctx: &mut GeneratorContext,
) -> Result<FieldOutcome, VagueError> {
    if let Some(when) = &field.when {
        if !eval::eval(when, ctx, None)?.truthy() {
            return Ok(FieldOutcome::Omitted);
        }
    }
    if field.flags.computed {
        return Ok(FieldOutcome::Deferred);
    }

    ctx.current_schema = Some(schema_name.to_string());
    ctx.current_field = Some(field.name.clone());

    let value = produce_value(&field.field_type, schema_name, &field.name, ctx)?;

    let value = if field.flags.unique {
        enforce_unique(ctx, schema_name, &field.name, value, |ctx| {
            produce_value(&field.field_type, schema_name, &field.name, ctx)
        })?
    } else {
        value
    };

    Ok(FieldOutcome::Value(value))
}

/// Regenerates `value` up to the configured unique-retry cap whenever it
/// collides with something already emitted for `(schema, field)`.
pub fn enforce_unique(
    ctx: &mut GeneratorContext,
    schema: &str,
    field: &str,
    mut value: Value,
    mut regenerate: impl FnMut(&mut GeneratorContext) -> Result<Value, VagueError>,
) -> Result<Value, VagueError> {
    let cap = ctx.config.retries.unique_value;
    let mut attempts = 0;
    while ctx.unique_pool.contains(schema, field, &value) && attempts < cap {
        value = regenerate(ctx)?;
        attempts += 1;
    }
    let was_duplicate = ctx.unique_pool.mark_used(schema, field, &value);
    if was_duplicate && attempts >= cap {
        ctx.push_warning(crate::warning::Warning::UniqueValueExhaustion {
            schema: schema.to_string(),
            field: field.to_string(),
            attempts: cap,
        });
    }
    Ok(value)
}

fn produce_value(
    field_type: &FieldType,
    schema_name: &str,
    field_name: &str,
    ctx: &mut GeneratorContext,
) -> Result<Value, VagueError> {
    match field_type {
        FieldType::Primitive(kind) => Ok(default_primitive(*kind, ctx)),
        FieldType::Range { base, min, max } => produce_range(*base, min.as_ref(), max.as_ref(), ctx),
        FieldType::Superposition(options) => pick_superposition(options, ctx, None),
        FieldType::Reference(name) => {
            let schema = ctx
                .lookup_schema(name)
                .cloned()
                .ok_or_else(|| VagueError::UnknownSchemaReference(name.to_string()))?;
            let record = super::instance::generate_instance(&schema, ctx, &[])?;
            Ok(Value::Record(record))
        }
        FieldType::Generator { name, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval::eval(arg, ctx, None)?);
            }
            let generator = ctx.registry.generator(name).cloned().ok_or_else(|| {
                VagueError::UnsupportedExpression {
                    schema: schema_name.to_string(),
                    field: field_name.to_string(),
                    message: format!("undefined generator function '{name}'"),
                }
            })?;
            generator(&values, ctx)
        }
        FieldType::Expr(expr) => eval::eval(expr, ctx, None),
        FieldType::OrderedSequence(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval::eval(item, ctx, None)?);
            }
            Ok(Value::Seq(values))
        }
        FieldType::Collection {
            cardinality,
            element,
            per_parent: _,
        } => produce_collection(cardinality, element, schema_name, field_name, ctx),
    }
}

fn produce_collection(
    cardinality: &CardinalitySpec,
    element: &FieldType,
    schema_name: &str,
    field_name: &str,
    ctx: &mut GeneratorContext,
) -> Result<Value, VagueError> {
    let n = resolve_cardinality(cardinality, ctx)?;
    let saved_parent = ctx.current_parent.take();
    ctx.current_parent = Some(ctx.current_record.clone());
    let mut items = Vec::with_capacity(n as usize);
    for _ in 0..n {
        items.push(produce_value(element, schema_name, field_name, ctx)?);
    }
    ctx.current_parent = saved_parent;
    Ok(Value::Seq(items))
}

pub fn resolve_cardinality(spec: &CardinalitySpec, ctx: &mut GeneratorContext) -> Result<i64, VagueError> {
    Ok(match spec {
        CardinalitySpec::Fixed(n) => *n,
        CardinalitySpec::Range(lo, hi) => ctx.rng.int_range(*lo, *hi),
        CardinalitySpec::Dynamic(expr) => eval::eval(expr, ctx, None)?.as_i64().unwrap_or(0),
    })
}

fn default_primitive(kind: PrimitiveKind, ctx: &mut GeneratorContext) -> Value {
    match kind {
        PrimitiveKind::Int => Value::Int(ctx.rng.int_range(ctx.config.defaults.int_min, ctx.config.defaults.int_max)),
        PrimitiveKind::Decimal => Value::Number(ctx.rng.float_range(0.0, ctx.config.defaults.decimal_max)),
        PrimitiveKind::Boolean => Value::Bool(ctx.rng.bool(0.5)),
        PrimitiveKind::Date => Value::Str(random_date_near_today(ctx)),
        PrimitiveKind::String => match ctx.registry.generator("lorem").cloned() {
            Some(generator) => generator(&[], ctx).unwrap_or(Value::Str(String::new())),
            None => Value::Str(String::new()),
        },
    }
}

fn random_date_near_today(ctx: &mut GeneratorContext) -> String {
    let window = ctx.config.defaults.date_window_days;
    let offset = ctx.rng.int_range(-window, window);
    (ctx.today() + Duration::days(offset)).to_string()
}

fn produce_range(
    base: PrimitiveKind,
    min: Option<&Expression>,
    max: Option<&Expression>,
    ctx: &mut GeneratorContext,
) -> Result<Value, VagueError> {
    match base {
        PrimitiveKind::Date => {
            let lo = resolve_date_bound(min, ctx, -ctx.config.defaults.date_window_days)?;
            let hi = resolve_date_bound(max, ctx, ctx.config.defaults.date_window_days)?;
            let span = (hi - lo).num_days().max(0);
            let offset = ctx.rng.int_range(0, span);
            Ok(Value::Str((lo + Duration::days(offset)).to_string()))
        }
        PrimitiveKind::Decimal => {
            let lo = match min {
                Some(e) => eval::eval(e, ctx, None)?.as_f64().unwrap_or(0.0),
                None => 0.0,
            };
            let hi = match max {
                Some(e) => eval::eval(e, ctx, None)?.as_f64().unwrap_or(lo + ctx.config.defaults.decimal_max),
                None => lo + ctx.config.defaults.decimal_max,
            };
            Ok(Value::Number(ctx.rng.float_range(lo, hi)))
        }
        _ => {
            let lo = match min {
                Some(e) => eval::eval(e, ctx, None)?.as_i64().unwrap_or(0),
                None => ctx.config.defaults.int_min,
            };
            let hi = match max {
                Some(e) => eval::eval(e, ctx, None)?.as_i64().unwrap_or(lo + ctx.config.defaults.open_range_span),
                None => lo + ctx.config.defaults.open_range_span,
            };
            Ok(Value::Int(ctx.rng.int_range(lo, hi)))
        }
    }
}

fn resolve_date_bound(
    expr: Option<&Expression>,
    ctx: &mut GeneratorContext,
    default_offset_days: i64,
) -> Result<NaiveDate, VagueError> {
    let today = ctx.today();
    match expr {
        Some(e) => {
            let v = eval::eval(e, ctx, None)?;
            Ok(v.as_str()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                .unwrap_or(today))
        }
        None => Ok(today + Duration::days(default_offset_days)),
    }
}
