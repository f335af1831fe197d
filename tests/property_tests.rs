//! Property-based tests (proptest).
//!
//! Covers range containment, cardinality bounds, and uniqueness across
//! randomly-chosen seeds and ranges rather than fixed literal inputs.

use proptest::prelude::*;
use vague::value::Value;
use vague::{compile, Config, Seed};

fn compile_source(source: &str, seed: u64) -> vague::CompileOutput {
    compile(source, Seed::Value(seed), Config::default(), &Default::default()).expect("compile")
}

proptest! {
    #[test]
    fn int_range_field_always_in_bounds(seed in 0u64..10_000, lo in 0i64..500, span in 1i64..500) {
        let hi = lo + span;
        let source = format!("schema P {{ x: int in {lo}..{hi} }}\ndataset D {{ items: 25 of P }}\n");
        let output = compile_source(&source, seed);
        let items = output.collection("items").unwrap();
        for record in items {
            let x = record.get("x").and_then(Value::as_i64).unwrap();
            prop_assert!(x >= lo && x <= hi, "x={x} out of [{lo},{hi}]");
        }
    }

    #[test]
    fn fixed_cardinality_is_exact(seed in 0u64..10_000, n in 0i64..50) {
        let source = format!("schema P {{ x: int in 1..10 }}\ndataset D {{ items: {n} of P }}\n");
        let output = compile_source(&source, seed);
        let items = output.collection("items").unwrap();
        prop_assert_eq!(items.len() as i64, n);
    }

    #[test]
    fn range_cardinality_stays_within_bounds(seed in 0u64..10_000, lo in 0i64..20, span in 0i64..20) {
        let hi = lo + span;
        let source = format!("schema P {{ x: int in 1..10 }}\ndataset D {{ items: {lo}..{hi} of P }}\n");
        let output = compile_source(&source, seed);
        let items = output.collection("items").unwrap();
        let count = items.len() as i64;
        prop_assert!(count >= lo && count <= hi, "count={count} out of [{lo},{hi}]");
    }

    #[test]
    fn unique_field_has_no_duplicates_when_pool_is_large(seed in 0u64..10_000) {
        let source = "schema P { id: unique int in 1..1000000 }\ndataset D { items: 200 of P }\n";
        let output = compile_source(source, seed);
        let items = output.collection("items").unwrap();
        let mut seen = std::collections::HashSet::new();
        for record in items {
            let id = record.get("id").and_then(Value::as_i64).unwrap();
            prop_assert!(seen.insert(id), "duplicate id {id}");
        }
    }
}
