//! Builders for patterns and records used across tests.

use serde_json::{json, Value};

use crate::domain::{QueryPattern, Record};

/// Build a record from a JSON object literal.
///
/// Panics if `value` is not an object.
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("record() needs a JSON object, got {other}"),
    }
}

/// County-level population record.
pub fn county(name: &str, state: &str, population: i64) -> Record {
    record(json!({ "county": name, "state": state, "population": population }))
}

/// Population pattern over the given counties.
pub fn population_pattern(geography: &[&str]) -> QueryPattern {
    QueryPattern::new("population_lookup", "SELECT county, state, population FROM county_population")
        .with_geography(geography.iter().copied())
        .with_metrics(["population"])
}

/// Pattern without geography entities.
pub fn national_pattern() -> QueryPattern {
    QueryPattern::new("national_summary", "SELECT SUM(population) AS population FROM county_population")
        .with_metrics(["population"])
}
