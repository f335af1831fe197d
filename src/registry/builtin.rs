//! Built-in generator functions installed into every fresh registry.
//!
//! These cover the "batteries" SPEC_FULL.md adds beyond the bare identifier/
//! distribution primitives: a UUID generator, grounded on the teacher's use
//! of the `uuid` crate for entity identifiers, and a faker-style module for
//! names and emails. The teacher has no opinion on realistic fake data, so
//! that module follows `other_examples/manifests/kclaka-seedkit/Cargo.toml`
//! — the pack's own "generate realistic, constraint-safe seed data" crate —
//! which reaches for the `fake` crate rather than hand-rolled word lists.
//! Every draw still goes through the caller's seeded [`crate::rng::Rng`], so
//! `uuid()` and `faker.name()` are as reproducible as any other primitive.

use super::{GeneratorEnv, PluginRegistry};
use crate::error::VagueError;
use crate::value::Value;
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;
use uuid::Builder as UuidBuilder;

const WEEKDAYS: &[&str] = &[
    "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
];

const LOREM_WORDS: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna", "aliqua",
];

pub fn install(registry: &mut PluginRegistry) {
    registry.register_generator("uuid", std::sync::Arc::new(generate_uuid));
    registry.register_generator("faker.name", std::sync::Arc::new(generate_faker_name));
    registry.register_generator("faker.email", std::sync::Arc::new(generate_faker_email));
    registry.register_generator("dates.weekday", std::sync::Arc::new(generate_weekday));
    registry.register_generator("lorem", std::sync::Arc::new(generate_lorem));
}

fn generate_uuid(_args: &[Value], env: &mut dyn GeneratorEnv) -> Result<Value, VagueError> {
    let mut bytes = [0u8; 16];
    for b in &mut bytes {
        *b = env.rng().int_range(0, 255) as u8;
    }
    let uuid = UuidBuilder::from_random_bytes(bytes).into_uuid();
    Ok(Value::Str(uuid.to_string()))
}

fn generate_faker_name(_args: &[Value], env: &mut dyn GeneratorEnv) -> Result<Value, VagueError> {
    let name: String = Name().fake_with_rng(env.rng().inner_mut());
    Ok(Value::Str(name))
}

fn generate_faker_email(args: &[Value], env: &mut dyn GeneratorEnv) -> Result<Value, VagueError> {
    match args.first().and_then(Value::as_str) {
        Some(name) => {
            let local: String = name
                .to_lowercase()
                .chars()
                .map(|c| if c.is_alphanumeric() { c } else { '.' })
                .collect();
            let tag = env.rng().int_range(100, 999);
            Ok(Value::Str(format!("{local}{tag}@example.com")))
        }
        None => {
            let email: String = SafeEmail().fake_with_rng(env.rng().inner_mut());
            Ok(Value::Str(email))
        }
    }
}

fn generate_weekday(_args: &[Value], env: &mut dyn GeneratorEnv) -> Result<Value, VagueError> {
    let day = env.rng().choice(WEEKDAYS).copied().unwrap_or("Monday");
    Ok(Value::Str(day.to_string()))
}

/// The default for an unconstrained `string` field: three to six lorem
/// words, not a full sentence generator — nobody asked for prose.
fn generate_lorem(_args: &[Value], env: &mut dyn GeneratorEnv) -> Result<Value, VagueError> {
    let count = env.rng().int_range(3, 6);
    let words: Vec<&str> = (0..count)
        .map(|_| env.rng().choice(LOREM_WORDS).copied().unwrap_or("lorem"))
        .collect();
    Ok(Value::Str(words.join(" ")))
}
