//! Error Handling Tests
//!
//! Verifies fatal conditions abort `compile` with the right error variant,
//! and that malformed source never panics.

use vague::{compile, Config, Seed, VagueError};

fn try_compile(source: &str) -> Result<vague::CompileOutput, VagueError> {
    compile(source, Seed::Value(0), Config::default(), &Default::default())
}

#[test]
fn circular_computed_fields_abort_with_circular_dependency() {
    let source = "schema P { a: b + 1\n b: a + 1 }\ndataset D { items: 1 of P }\n";
    let result = try_compile(source);
    assert!(matches!(result, Err(VagueError::CircularDependency { .. })));
}

#[test]
fn unknown_schema_reference_is_an_error_not_a_panic() {
    let source = "dataset D { items: 3 of Ghost }\n";
    let result = try_compile(source);
    assert!(matches!(result, Err(VagueError::UnknownSchemaReference(_))));
}

#[test]
fn unterminated_string_is_a_lex_error() {
    let source = "schema P { name: \"unterminated }\ndataset D { items: 1 of P }\n";
    let result = try_compile(source);
    assert!(matches!(result, Err(VagueError::LexError { .. })));
}

#[test]
fn unbalanced_braces_is_a_parse_error() {
    let source = "schema P { x: int in 1..10\ndataset D { items: 1 of P }\n";
    let result = try_compile(source);
    assert!(result.is_err());
}

#[test]
fn unresolved_import_path_is_fatal() {
    let source = "import base from \"missing.vague\"\nschema P from base.Thing { }\ndataset D { items: 1 of P }\n";
    let result = try_compile(source);
    assert!(matches!(result, Err(VagueError::Fatal(_))));
}

#[test]
fn empty_source_compiles_to_no_datasets() {
    let output = try_compile("").expect("empty program is valid");
    assert!(output.datasets.is_empty());
}
