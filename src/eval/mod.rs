//! # Expression Evaluator
//!
//! Walks an [`Expression`] against a [`GeneratorContext`], producing a
//! [`Value`]. Grounded on the teacher's recursive `eval` over Datalog body
//! predicates (same shape: closed-sum input, context carrying bindings,
//! short-circuiting booleans) generalized to arithmetic, ranges,
//! superpositions, and the call-dispatch table in [`builtins`].

pub mod builtins;

use crate::ast::*;
use crate::context::GeneratorContext;
use crate::error::VagueError;
use crate::value::{Record, RecordHandle, Value};

type EResult = Result<Value, VagueError>;

/// `element` is the current predicate-helper scope (`all`/`some`'s bound
/// element), consulted only by [`Expression::ElementProperty`].
pub fn eval(expr: &Expression, ctx: &mut GeneratorContext, element: Option<&Value>) -> EResult {
    match expr {
        Expression::Literal(lit) => Ok(literal_value(lit)),
        Expression::Identifier(name) => eval_identifier(name, ctx),
        Expression::ElementProperty(path) => Ok(project_path(element.unwrap_or(&Value::Null), path, ctx)),
        Expression::QualifiedName(q) => eval_qualified(q, ctx),
        Expression::Binary { op, left, right } => eval_binary(*op, left, right, ctx, element),
        Expression::Logical { op, left, right } => eval_logical(*op, left, right, ctx, element),
        Expression::Not(inner) => Ok(Value::Bool(!eval(inner, ctx, element)?.truthy())),
        Expression::Unary { op, expr } => eval_unary(*op, expr, ctx, element),
        Expression::Ternary {
            condition,
            if_true,
            if_false,
        } => {
            if eval(condition, ctx, element)?.truthy() {
                eval(if_true, ctx, element)
            } else {
                eval(if_false, ctx, element)
            }
        }
        Expression::Range { min, max } => {
            let min_v = eval(min, ctx, element)?;
            let max_v = match max {
                Some(m) => eval(m, ctx, element)?,
                None => Value::Null,
            };
            Ok(Value::Seq(vec![min_v, max_v]))
        }
        Expression::Superposition(options) => pick_superposition(options, ctx, element),
        Expression::AnyOf { collection, condition } => {
            eval_any_of(collection, condition.as_deref(), ctx, element)
        }
        Expression::ParentReference(path) => Ok(eval_parent_reference(path, ctx)),
        Expression::Match {
            subject,
            arms,
            default,
        } => eval_match(subject, arms, default.as_deref(), ctx, element),
        Expression::Call { callee, args } => builtins::dispatch(callee, args, ctx, element),
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Int(i) => Value::Int(*i),
        Literal::Number(n) => Value::Number(*n),
        Literal::Str(s) => Value::Str(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}

/// Resolution order per spec §4.4: current record, parent record, a named
/// top-level dataset collection, a `let` binding, then a zero-arg plugin
/// generator. A miss is `Value::Null`, never an error.
fn eval_identifier(name: &str, ctx: &mut GeneratorContext) -> EResult {
    if let Some(v) = ctx.current_record.get(name) {
        return Ok(v.clone());
    }
    if let Some(parent) = &ctx.current_parent {
        if let Some(v) = parent.get(name) {
            return Ok(v.clone());
        }
    }
    if let Some(records) = ctx.datasets.get(name) {
        return Ok(Value::Seq(records.iter().cloned().map(Value::Record).collect()));
    }
    if let Some(v) = ctx.lets.get(name) {
        return Ok(v.clone());
    }
    if let Some(generator) = ctx.registry.generator(name).cloned() {
        return generator(&[], ctx);
    }
    Ok(Value::Null)
}

fn eval_qualified(q: &QualifiedName, ctx: &mut GeneratorContext) -> EResult {
    let Some((first, rest)) = q.parts.split_first() else {
        return Ok(Value::Null);
    };
    let base = eval_identifier(first, ctx)?;
    Ok(project_path(&base, rest, ctx))
}

/// Walks a dotted field path over a `Record`/`Seq`/`Ref`, producing the
/// lazily-traversed sequence described in spec §4.4 for `line_items.amount`.
fn project_path(base: &Value, path: &[String], ctx: &GeneratorContext) -> Value {
    let mut current = base.clone();
    for field in path {
        current = project_field(&current, field, ctx);
    }
    current
}

fn project_field(value: &Value, field: &str, ctx: &GeneratorContext) -> Value {
    match value {
        Value::Record(r) => r.get(field).cloned().unwrap_or(Value::Null),
        Value::Seq(items) => Value::Seq(items.iter().map(|v| project_field(v, field, ctx)).collect()),
        Value::Ref(handle) => match resolve_handle(handle, ctx) {
            Some(r) => r.get(field).cloned().unwrap_or(Value::Null),
            None => Value::Null,
        },
        _ => Value::Null,
    }
}

fn resolve_handle<'a>(handle: &RecordHandle, ctx: &'a GeneratorContext) -> Option<&'a Record> {
    ctx.datasets.get(&handle.collection)?.get(handle.index)
}

fn eval_binary(
    op: BinaryOp,
    left: &Expression,
    right: &Expression,
    ctx: &mut GeneratorContext,
    element: Option<&Value>,
) -> EResult {
    let l = eval(left, ctx, element)?;
    let r = eval(right, ctx, element)?;

    use BinaryOp::*;
    match op {
        Eq => return Ok(Value::Bool(l.structural_eq(&r))),
        Ne => return Ok(Value::Bool(!l.structural_eq(&r))),
        _ => {}
    }

    let (Some(lf), Some(rf)) = (l.as_f64(), r.as_f64()) else {
        if matches!(op, Add) {
            if let (Value::Str(a), Value::Str(b)) = (&l, &r) {
                return Ok(Value::Str(format!("{a}{b}")));
            }
        }
        return Ok(Value::Null);
    };

    match op {
        Add | Sub | Mul | Div | Mod => {
            if matches!(op, Div | Mod) && rf == 0.0 {
                return Err(VagueError::DivisionByZero {
                    schema: ctx.current_schema.clone().unwrap_or_default(),
                    field: ctx.current_field.clone().unwrap_or_default(),
                });
            }
            let result = match op {
                Add => lf + rf,
                Sub => lf - rf,
                Mul => lf * rf,
                Div => lf / rf,
                Mod => lf % rf,
                _ => unreachable!(),
            };
            if matches!(l, Value::Int(_)) && matches!(r, Value::Int(_)) && matches!(op, Add | Sub | Mul) {
                Ok(Value::Int(result as i64))
            } else {
                Ok(Value::Number(result))
            }
        }
        Lt => Ok(Value::Bool(lf < rf)),
        Gt => Ok(Value::Bool(lf > rf)),
        Le => Ok(Value::Bool(lf <= rf)),
        Ge => Ok(Value::Bool(lf >= rf)),
        Eq | Ne => unreachable!("handled above"),
    }
}

fn eval_logical(
    op: LogicalOp,
    left: &Expression,
    right: &Expression,
    ctx: &mut GeneratorContext,
    element: Option<&Value>,
) -> EResult {
    let l = eval(left, ctx, element)?.truthy();
    match op {
        LogicalOp::And if !l => Ok(Value::Bool(false)),
        LogicalOp::Or if l => Ok(Value::Bool(true)),
        _ => Ok(Value::Bool(eval(right, ctx, element)?.truthy())),
    }
}

fn eval_unary(op: UnaryOp, expr: &Expression, ctx: &mut GeneratorContext, element: Option<&Value>) -> EResult {
    let v = eval(expr, ctx, element)?;
    match op {
        UnaryOp::Plus => Ok(v),
        UnaryOp::Neg => match v {
            Value::Int(i) => Ok(Value::Int(-i)),
            Value::Number(n) => Ok(Value::Number(-n)),
            _ => Ok(Value::Null),
        },
    }
}

fn eval_parent_reference(path: &[String], ctx: &GeneratorContext) -> Value {
    let Some(parent) = &ctx.current_parent else {
        return Value::Null;
    };
    let Some((first, rest)) = path.split_first() else {
        return Value::Null;
    };
    let base = parent.get(first).cloned().unwrap_or(Value::Null);
    project_path(&base, rest, ctx)
}

fn eval_match(
    subject: &Expression,
    arms: &[(Expression, Expression)],
    default: Option<&Expression>,
    ctx: &mut GeneratorContext,
    element: Option<&Value>,
) -> EResult {
    let subject_value = eval(subject, ctx, element)?;
    for (pattern, value) in arms {
        let pattern_value = eval(pattern, ctx, element)?;
        if pattern_value.structural_eq(&subject_value) {
            return eval(value, ctx, element);
        }
    }
    match default {
        Some(expr) => eval(expr, ctx, element),
        None => Ok(Value::Null),
    }
}

/// Shared by both `Expression::Superposition` evaluation and
/// `FieldType::Superposition` field generation: unweighted options split the
/// residual weight equally (spec §9 open question, resolved in DESIGN.md).
pub fn pick_superposition(
    options: &[SuperpositionOption],
    ctx: &mut GeneratorContext,
    element: Option<&Value>,
) -> EResult {
    if options.is_empty() {
        return Ok(Value::Null);
    }
    let declared: f64 = options.iter().filter_map(|o| o.weight).sum();
    let unweighted = options.iter().filter(|o| o.weight.is_none()).count();
    let residual_each = if unweighted > 0 {
        (1.0 - declared).max(0.0) / unweighted as f64
    } else {
        0.0
    };
    let weights: Vec<f64> = options
        .iter()
        .map(|o| o.weight.unwrap_or(residual_each))
        .collect();
    let idx = {
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            ctx.rng.int_range(0, options.len() as i64 - 1) as usize
        } else {
            let mut target = ctx.rng.uniform01() * total;
            let mut chosen = options.len() - 1;
            for (i, w) in weights.iter().enumerate() {
                if target < *w {
                    chosen = i;
                    break;
                }
                target -= w;
            }
            chosen
        }
    };
    eval(&options[idx].value, ctx, element)
}

fn eval_any_of(
    collection: &Expression,
    condition: Option<&Expression>,
    ctx: &mut GeneratorContext,
    element: Option<&Value>,
) -> EResult {
    let (name, records) = resolve_collection_expr(collection, ctx, element)?;
    let mut candidates: Vec<usize> = (0..records.len()).collect();
    if let Some(cond) = condition {
        let mut kept = Vec::new();
        for &i in &candidates {
            let scope = Value::Record(records[i].clone());
            if eval(cond, ctx, Some(&scope))?.truthy() {
                kept.push(i);
            }
        }
        candidates = kept;
    }
    if candidates.is_empty() {
        return Ok(Value::Null);
    }
    let idx = *ctx.rng.choice(&candidates).expect("non-empty checked above");
    match name {
        Some(collection_name) => Ok(Value::Ref(RecordHandle {
            collection: collection_name,
            index: idx,
        })),
        None => Ok(Value::Record(records[idx].clone())),
    }
}

fn resolve_collection_expr(
    expr: &Expression,
    ctx: &mut GeneratorContext,
    element: Option<&Value>,
) -> Result<(Option<String>, Vec<Record>), VagueError> {
    if let Expression::Identifier(name) = expr {
        if let Some(records) = ctx.datasets.get(name) {
            return Ok((Some(name.clone()), records.clone()));
        }
    }
    let value = eval(expr, ctx, element)?;
    let records = match value {
        Value::Seq(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::Record(r) => Some(r),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    Ok((None, records))
}
