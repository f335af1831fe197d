//! Call-dispatch table for built-in aggregate, predicate, math, date,
//! string, and sequence functions (spec §4.4), falling through to the
//! plugin registry for anything unrecognized.

use super::eval;
use crate::ast::Expression;
use crate::context::GeneratorContext;
use crate::error::VagueError;
use crate::value::Value;
use chrono::{Datelike, Duration, NaiveDate};

type EResult = Result<Value, VagueError>;

pub fn dispatch(
    callee: &str,
    args: &[Expression],
    ctx: &mut GeneratorContext,
    element: Option<&Value>,
) -> EResult {
    match callee {
        "sum" | "count" | "min" | "max" | "avg" | "first" | "last" | "median" | "product" => {
            let seq = eval_seq_arg(args, ctx, element)?;
            Ok(aggregate(callee, &seq))
        }
        "all" | "some" => eval_predicate_helper(callee, args, ctx, element),
        "round" | "floor" | "ceil" => eval_math(callee, args, ctx, element),
        "gaussian" | "normal" => eval_bounded_distribution(args, ctx, element, |rng, mu, sigma, lo, hi| {
            rng.gaussian(mu, sigma, lo, hi)
        }),
        "exponential" => eval_bounded_distribution(args, ctx, element, |rng, rate, _unused, lo, hi| {
            rng.exponential(rate, lo, hi)
        }),
        "lognormal" => eval_bounded_distribution(args, ctx, element, |rng, mu, sigma, lo, hi| {
            rng.lognormal(mu, sigma, lo, hi)
        }),
        "poisson" => {
            let lambda = arg_f64(args, 0, ctx, element)?;
            Ok(Value::Int(ctx.rng.poisson(lambda)))
        }
        "beta" => {
            let a = arg_f64(args, 0, ctx, element)?;
            let b = arg_f64(args, 1, ctx, element)?;
            Ok(Value::Number(ctx.rng.beta(a, b)))
        }
        "uniform" => {
            let lo = arg_f64(args, 0, ctx, element)?;
            let hi = arg_f64(args, 1, ctx, element)?;
            Ok(Value::Number(ctx.rng.float_range(lo, hi)))
        }
        "now" | "today" => Ok(Value::Str(ctx.today().to_string())),
        "datetime" => {
            let y = arg_i64(args, 0, ctx, element)? as i32;
            let m = arg_i64(args, 1, ctx, element)? as u32;
            let d = arg_i64(args, 2, ctx, element)? as u32;
            Ok(Value::Str(
                NaiveDate::from_ymd_opt(y, m, d)
                    .map(|d| d.to_string())
                    .unwrap_or_default(),
            ))
        }
        "dateBetween" => {
            let lo = arg_date(args, 0, ctx, element)?;
            let hi = arg_date(args, 1, ctx, element)?;
            let span = (hi - lo).num_days().max(0);
            let offset = ctx.rng.int_range(0, span);
            Ok(Value::Str((lo + Duration::days(offset)).to_string()))
        }
        "daysAgo" => {
            let n = arg_i64(args, 0, ctx, element)?;
            Ok(Value::Str((ctx.today() - Duration::days(n)).to_string()))
        }
        "daysFromNow" => {
            let n = arg_i64(args, 0, ctx, element)?;
            Ok(Value::Str((ctx.today() + Duration::days(n)).to_string()))
        }
        "formatDate" => {
            let date = arg_date(args, 0, ctx, element)?;
            Ok(Value::Str(format!(
                "{:04}-{:02}-{:02}",
                date.year(),
                date.month(),
                date.day()
            )))
        }
        "uppercase" => Ok(Value::Str(arg_str(args, 0, ctx, element)?.to_uppercase())),
        "lowercase" => Ok(Value::Str(arg_str(args, 0, ctx, element)?.to_lowercase())),
        "capitalize" => Ok(Value::Str(capitalize(&arg_str(args, 0, ctx, element)?))),
        "kebabCase" => Ok(Value::Str(to_delimited_case(&arg_str(args, 0, ctx, element)?, '-'))),
        "snakeCase" => Ok(Value::Str(to_delimited_case(&arg_str(args, 0, ctx, element)?, '_'))),
        "camelCase" => Ok(Value::Str(to_camel_case(&arg_str(args, 0, ctx, element)?))),
        "trim" => Ok(Value::Str(arg_str(args, 0, ctx, element)?.trim().to_string())),
        "concat" => {
            let mut out = String::new();
            for i in 0..args.len() {
                out.push_str(&arg_str(args, i, ctx, element)?);
            }
            Ok(Value::Str(out))
        }
        "substring" => {
            let s = arg_str(args, 0, ctx, element)?;
            let start = arg_i64(args, 1, ctx, element)?.max(0) as usize;
            let end = args
                .get(2)
                .map(|_| arg_i64(args, 2, ctx, element))
                .transpose()?
                .map(|e| e.max(0) as usize)
                .unwrap_or(s.chars().count());
            Ok(Value::Str(s.chars().skip(start).take(end.saturating_sub(start)).collect()))
        }
        "replace" => {
            let s = arg_str(args, 0, ctx, element)?;
            let from = arg_str(args, 1, ctx, element)?;
            let to = arg_str(args, 2, ctx, element)?;
            Ok(Value::Str(s.replace(&from, &to)))
        }
        "length" => {
            let v = eval(args.first().ok_or_else(|| missing_arg("length"))?, ctx, element)?;
            Ok(Value::Int(match v {
                Value::Str(s) => s.chars().count() as i64,
                Value::Seq(s) => s.len() as i64,
                _ => 0,
            }))
        }
        "sequence" => {
            let prefix = arg_str(args, 0, ctx, element)?;
            let start = args
                .get(1)
                .map(|_| arg_i64(args, 1, ctx, element))
                .transpose()?
                .unwrap_or(0);
            let n = ctx.next_sequence(&format!("seq:{prefix}"), start, 1);
            Ok(Value::Str(format!("{prefix}{n}")))
        }
        "sequenceInt" => {
            let key = arg_str(args, 0, ctx, element)?;
            let n = ctx.next_sequence(&format!("seqint:{key}"), 0, 1);
            Ok(Value::Int(n))
        }
        "previous" => {
            let field = arg_str(args, 0, ctx, element)?;
            Ok(ctx.previous_record(&field).cloned().unwrap_or(Value::Null))
        }
        _ => eval_plugin_generator(callee, args, ctx, element),
    }
}

fn missing_arg(name: &str) -> VagueError {
    VagueError::UnsupportedExpression {
        schema: String::new(),
        field: String::new(),
        message: format!("'{name}' requires at least one argument"),
    }
}

fn eval_seq_arg(args: &[Expression], ctx: &mut GeneratorContext, element: Option<&Value>) -> Result<Vec<Value>, VagueError> {
    let expr = args.first().ok_or_else(|| missing_arg("aggregate"))?;
    match eval(expr, ctx, element)? {
        Value::Seq(items) => Ok(items),
        other => Ok(vec![other]),
    }
}

fn aggregate(name: &str, seq: &[Value]) -> Value {
    let numbers: Vec<f64> = seq.iter().filter_map(Value::as_f64).collect();
    match name {
        "count" => Value::Int(seq.len() as i64),
        "first" => seq.first().cloned().unwrap_or(Value::Null),
        "last" => seq.last().cloned().unwrap_or(Value::Null),
        "sum" => all_int(seq, numbers.iter().sum()),
        "product" => all_int(seq, numbers.iter().product()),
        "min" => numbers
            .iter()
            .cloned()
            .fold(None, |acc: Option<f64>, x| Some(acc.map_or(x, |a| a.min(x))))
            .map(|v| all_int(seq, v))
            .unwrap_or(Value::Null),
        "max" => numbers
            .iter()
            .cloned()
            .fold(None, |acc: Option<f64>, x| Some(acc.map_or(x, |a| a.max(x))))
            .map(|v| all_int(seq, v))
            .unwrap_or(Value::Null),
        "avg" => {
            if numbers.is_empty() {
                Value::Null
            } else {
                Value::Number(numbers.iter().sum::<f64>() / numbers.len() as f64)
            }
        }
        "median" => {
            if numbers.is_empty() {
                Value::Null
            } else {
                let mut sorted = numbers.clone();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    Value::Number((sorted[mid - 1] + sorted[mid]) / 2.0)
                } else {
                    Value::Number(sorted[mid])
                }
            }
        }
        _ => Value::Null,
    }
}

/// Keeps `sum`/`product`/`min`/`max` as `Int` when every input was an int,
/// matching how the field generator's own arithmetic preserves integrality.
fn all_int(seq: &[Value], result: f64) -> Value {
    if seq.iter().all(|v| matches!(v, Value::Int(_))) {
        Value::Int(result as i64)
    } else {
        Value::Number(result)
    }
}

fn eval_predicate_helper(
    name: &str,
    args: &[Expression],
    ctx: &mut GeneratorContext,
    element: Option<&Value>,
) -> EResult {
    let seq_expr = args.first().ok_or_else(|| missing_arg(name))?;
    let predicate = args.get(1).ok_or_else(|| missing_arg(name))?;
    let seq = match eval(seq_expr, ctx, element)? {
        Value::Seq(items) => items,
        other => vec![other],
    };
    let mut matched = 0usize;
    for item in &seq {
        if eval(predicate, ctx, Some(item))?.truthy() {
            matched += 1;
            if name == "some" {
                return Ok(Value::Bool(true));
            }
        }
    }
    Ok(Value::Bool(if name == "all" {
        matched == seq.len()
    } else {
        false
    }))
}

fn eval_math(name: &str, args: &[Expression], ctx: &mut GeneratorContext, element: Option<&Value>) -> EResult {
    let v = arg_f64(args, 0, ctx, element)?;
    let result = match name {
        "round" => v.round(),
        "floor" => v.floor(),
        "ceil" => v.ceil(),
        _ => v,
    };
    Ok(Value::Int(result as i64))
}

fn eval_bounded_distribution(
    args: &[Expression],
    ctx: &mut GeneratorContext,
    element: Option<&Value>,
    sample: impl FnOnce(&mut crate::rng::Rng, f64, f64, Option<f64>, Option<f64>) -> f64,
) -> EResult {
    let a = arg_f64(args, 0, ctx, element)?;
    let b = args
        .get(1)
        .map(|_| arg_f64(args, 1, ctx, element))
        .transpose()?
        .unwrap_or(1.0);
    let min = args.get(2).map(|_| arg_f64(args, 2, ctx, element)).transpose()?;
    let max = args.get(3).map(|_| arg_f64(args, 3, ctx, element)).transpose()?;
    Ok(Value::Number(sample(&mut ctx.rng, a, b, min, max)))
}

fn eval_plugin_generator(
    name: &str,
    args: &[Expression],
    ctx: &mut GeneratorContext,
    element: Option<&Value>,
) -> EResult {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(eval(arg, ctx, element)?);
    }
    match ctx.registry.generator(name).cloned() {
        Some(generator) => generator(&values, ctx),
        None => Ok(Value::Null),
    }
}

fn arg_f64(args: &[Expression], idx: usize, ctx: &mut GeneratorContext, element: Option<&Value>) -> Result<f64, VagueError> {
    let expr = args.get(idx).ok_or_else(|| missing_arg("numeric argument"))?;
    Ok(eval(expr, ctx, element)?.as_f64().unwrap_or(0.0))
}

fn arg_i64(args: &[Expression], idx: usize, ctx: &mut GeneratorContext, element: Option<&Value>) -> Result<i64, VagueError> {
    let expr = args.get(idx).ok_or_else(|| missing_arg("integer argument"))?;
    Ok(eval(expr, ctx, element)?.as_i64().unwrap_or(0))
}

fn arg_str(args: &[Expression], idx: usize, ctx: &mut GeneratorContext, element: Option<&Value>) -> Result<String, VagueError> {
    let expr = args.get(idx).ok_or_else(|| missing_arg("string argument"))?;
    let v = eval(expr, ctx, element)?;
    Ok(v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
}

fn arg_date(args: &[Expression], idx: usize, ctx: &mut GeneratorContext, element: Option<&Value>) -> Result<NaiveDate, VagueError> {
    let s = arg_str(args, idx, ctx, element)?;
    match NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
        Ok(date) => Ok(date),
        Err(_) => Ok(ctx.today()),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn to_delimited_case(s: &str, delim: char) -> String {
    let mut out = String::new();
    for (i, word) in s.split(|c: char| c == ' ' || c == '_' || c == '-').enumerate() {
        if word.is_empty() {
            continue;
        }
        if i > 0 && !out.is_empty() {
            out.push(delim);
        }
        out.push_str(&word.to_lowercase());
    }
    out
}

fn to_camel_case(s: &str) -> String {
    let mut out = String::new();
    for (i, word) in s.split(|c: char| c == ' ' || c == '_' || c == '-').enumerate() {
        if word.is_empty() {
            continue;
        }
        if i == 0 {
            out.push_str(&word.to_lowercase());
        } else {
            out.push_str(&capitalize(&word.to_lowercase()));
        }
    }
    out
}
