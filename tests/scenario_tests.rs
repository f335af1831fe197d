//! Scenario Tests
//!
//! The seven concrete end-to-end scenarios (S1-S7): literal sources with
//! literal expected outputs.

use vague::value::Value;
use vague::{compile, Config, Seed, VagueError};

fn compile_source(source: &str, seed: u64) -> vague::CompileOutput {
    compile(source, Seed::Value(seed), Config::default(), &Default::default()).expect("compile")
}

// S1: fixed cardinality, range containment, determinism.
#[test]
fn s1_fixed_cardinality_and_range_containment() {
    let source = "schema P { x: int in 1..10 }\ndataset D { items: 3 of P }\n";

    let first = compile_source(source, 42);
    let items = first.collection("items").expect("items collection");
    assert_eq!(items.len(), 3);
    for record in items {
        let x = record.get("x").and_then(Value::as_i64).expect("x field");
        assert!((1..=10).contains(&x));
    }

    let second = compile_source(source, 42);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

// S2: superposition weights converge over a large sample.
#[test]
fn s2_superposition_weight_convergence() {
    let source = r#"schema T { s: 0.8: "a" | 0.2: "b" } dataset D { items: 10000 of T }"#;
    let output = compile_source(source, 1);
    let items = output.collection("items").expect("items collection");

    let count_a = items
        .iter()
        .filter(|r| r.get("s").and_then(Value::as_str) == Some("a"))
        .count();

    assert!((7700..=8300).contains(&count_a), "count_a = {count_a}");
}

// S3: every accepted record satisfies its `assume` clause.
#[test]
fn s3_constraint_satisfaction() {
    let source = "schema I { a: int in 1..10\n b: int in 1..10\n assume a < b }\ndataset D { items: 100 of I }\n";
    let output = compile_source(source, 7);
    let items = output.collection("items").expect("items collection");

    for record in items {
        let a = record.get("a").and_then(Value::as_i64).unwrap();
        let b = record.get("b").and_then(Value::as_i64).unwrap();
        assert!(a < b, "record violated a < b: a={a} b={b}");
    }
}

// S4: a narrow unique pool exhausts, is warned about, and still emits the
// requested cardinality with distinct values up to exhaustion.
#[test]
fn s4_unique_value_exhaustion_warns_but_fills_cardinality() {
    let source = "schema X { id: unique int in 1..3 }\ndataset D { items: 10 of X }\n";
    let output = compile_source(source, 3);
    let items = output.collection("items").expect("items collection");
    assert_eq!(items.len(), 10);

    let first_three: Vec<i64> = items[..3]
        .iter()
        .map(|r| r.get("id").and_then(Value::as_i64).unwrap())
        .collect();
    let mut distinct = first_three.clone();
    distinct.sort_unstable();
    distinct.dedup();
    assert_eq!(distinct.len(), first_three.len());

    assert!(output
        .warnings
        .iter()
        .any(|w| matches!(w, vague::Warning::UniqueValueExhaustion { .. })));
}

// S5: a computed aggregate over a nested collection equals the sum of its
// elements for every invoice.
#[test]
fn s5_computed_aggregate_equals_sum_of_elements() {
    let source = r#"
        schema L {
            q: int in 1..10
            p: int in 1..10
        }
        schema I {
            items: 3 of L
            total: sum(items.q)
        }
        dataset D {
            invoices: 5 of I
        }
    "#;
    let output = compile_source(source, 11);
    let invoices = output.collection("invoices").expect("invoices collection");
    assert_eq!(invoices.len(), 5);

    for invoice in invoices {
        let items = invoice.get("items").and_then(Value::as_seq).expect("items field");
        let expected: i64 = items
            .iter()
            .map(|item| match item {
                Value::Record(r) => r.get("q").and_then(Value::as_i64).unwrap_or(0),
                _ => 0,
            })
            .sum();
        let total = invoice.get("total").and_then(Value::as_i64).expect("total field");
        assert_eq!(total, expected);
    }
}

// S6: a zero-cardinality collection is the empty sequence, not an error.
#[test]
fn s6_zero_cardinality_is_empty_not_error() {
    let source = r#"schema A { name: "x" } dataset D { items: 0 of A }"#;
    let output = compile_source(source, 0);
    let items = output.collection("items").expect("items collection");
    assert!(items.is_empty());
}

// S7: forcing a division by zero via an override is a fatal error.
#[test]
fn s7_division_by_zero_is_fatal() {
    let source = "schema X { a: int in 1..1\n b: 10/a }\ndataset D { x: 1 of X with { a: 0 } }\n";
    let result = compile(source, Seed::Value(0), Config::default(), &Default::default());
    assert!(matches!(result, Err(VagueError::DivisionByZero { .. })));
}
