//! Serialization Tests
//!
//! `CompileOutput`'s `Serialize` impl follows `Value::Ref` handles to embed
//! the referenced record, rather than emitting a bare collection/index pair
//! (see the "Cyclic graphs" design note).

use serde_json::Value as Json;
use vague::{compile, Config, Seed};

fn compile_source(source: &str) -> vague::CompileOutput {
    compile(source, Seed::Value(5), Config::default(), &Default::default()).expect("compile")
}

#[test]
fn any_of_reference_handle_embeds_the_target_record_in_json() {
    let source = r#"
        schema Category {
            label: "electronics"
        }
        schema Product {
            category: any of categories
        }
        dataset D {
            categories: 1 of Category
            products: 2 of Product
        }
    "#;
    let output = compile_source(source);
    let json: Json = serde_json::to_value(&output).expect("to_value");

    let products = json.get("products").and_then(Json::as_array).expect("products array");
    assert_eq!(products.len(), 2);
    for product in products {
        let category = product.get("category").expect("category field");
        assert_eq!(category.get("label").and_then(Json::as_str), Some("electronics"));
    }
}

#[test]
fn json_output_is_stable_across_reserialization() {
    let source = "schema P { x: int in 1..10 }\ndataset D { items: 5 of P }\n";
    let output = compile_source(source);
    let first = serde_json::to_string(&output).unwrap();
    let second = serde_json::to_string(&output).unwrap();
    assert_eq!(first, second);
}
