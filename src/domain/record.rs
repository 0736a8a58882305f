//! Tabular records returned by data sources.

use serde_json::{Map, Value};

/// One row of a result set, keyed by column name.
pub type Record = Map<String, Value>;

/// Columns that identify a geography, checked in priority order.
const COUNTY_FIELDS: [&str; 2] = ["county", "county_name"];
const STATE_FIELDS: [&str; 3] = ["state", "state_name", "state_abbr"];
const FIPS_FIELDS: [&str; 2] = ["fips", "geoid"];
const GEOGRAPHY_FIELDS: [&str; 2] = ["geography", "name"];

/// Join key identifying the geography a record describes.
///
/// Prefers county + state, then a FIPS code, then a free-form geography
/// name. Values are trimmed and lowercased so sources agree on spelling
/// differences in case only.
#[must_use]
pub fn geography_key(record: &Record) -> Option<String> {
    let county = first_text(record, &COUNTY_FIELDS);
    let state = first_text(record, &STATE_FIELDS);
    if let (Some(county), Some(state)) = (county, state) {
        return Some(format!("{county}|{state}"));
    }
    first_text(record, &FIPS_FIELDS)
        .map(|fips| format!("fips:{fips}"))
        .or_else(|| first_text(record, &GEOGRAPHY_FIELDS))
}

/// True when `field` takes part in the geography join.
#[must_use]
pub fn is_geography_field(field: &str) -> bool {
    COUNTY_FIELDS
        .iter()
        .chain(STATE_FIELDS.iter())
        .chain(FIPS_FIELDS.iter())
        .chain(GEOGRAPHY_FIELDS.iter())
        .any(|f| *f == field)
}

/// True when `record` describes one of the `wanted` geographies.
///
/// Each wanted entity is compared word by word against the record's county
/// or geography name, so `"Travis"` matches `"Travis County"` and
/// `"Travis County"` matches `"Travis"`. A `", TX"` suffix must equal the
/// record's state when it has one. A bare state or FIPS code matches only
/// when it equals the record's value exactly.
#[must_use]
pub fn matches_geography(record: &Record, wanted: &[String]) -> bool {
    if wanted.is_empty() {
        return true;
    }
    wanted.iter().any(|w| matches_entity(record, w))
}

fn matches_entity(record: &Record, wanted: &str) -> bool {
    let (place, qualifier) = match wanted.split_once(',') {
        Some((place, qualifier)) => (place, Some(words(qualifier))),
        None => (wanted, None),
    };
    let place = words(place);
    if place.is_empty() {
        return false;
    }
    let states = field_words(record, &STATE_FIELDS);

    let named = field_words(record, &COUNTY_FIELDS)
        .chain(field_words(record, &GEOGRAPHY_FIELDS))
        .any(|name| contains_run(&name, &place) || contains_run(&place, &name));
    let coded = qualifier.is_none()
        && field_words(record, &FIPS_FIELDS)
            .chain(field_words(record, &STATE_FIELDS))
            .any(|code| code == place);
    if !(named || coded) {
        return false;
    }

    match qualifier.filter(|q| !q.is_empty()) {
        Some(qualifier) => {
            let mut states = states.peekable();
            states.peek().is_none() || states.any(|state| state == qualifier)
        }
        None => true,
    }
}

/// Lowercase alphanumeric words of `text`.
fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn field_words<'a>(
    record: &'a Record,
    fields: &'a [&'a str],
) -> impl Iterator<Item = Vec<String>> + 'a {
    fields
        .iter()
        .filter_map(move |f| text_of(record.get(*f)?))
        .map(|text| words(&text))
        .filter(|w| !w.is_empty())
}

/// True when `needle` appears as a contiguous run of words in `haystack`.
fn contains_run(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty()
        && needle.len() <= haystack.len()
        && haystack.windows(needle.len()).any(|window| window == needle)
}

/// Lowercase snake_case form of a column name (`"Median Income"` -> `"median_income"`).
#[must_use]
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_lower = false;
    for ch in name.trim().chars() {
        if ch.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower = false;
        } else if ch.is_alphanumeric() {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
            prev_lower = false;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

fn first_text(record: &Record, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .find_map(|f| record.get(*f).and_then(text_of))
}

fn text_of(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_lowercase(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn county_and_state_take_priority() {
        let r = record(json!({"county": "Travis", "state": "TX", "fips": "48453"}));
        assert_eq!(geography_key(&r).as_deref(), Some("travis|tx"));
    }

    #[test]
    fn falls_back_to_fips_then_geography() {
        let r = record(json!({"fips": 48453, "population": 1}));
        assert_eq!(geography_key(&r).as_deref(), Some("fips:48453"));

        let r = record(json!({"geography": "Austin MSA"}));
        assert_eq!(geography_key(&r).as_deref(), Some("austin msa"));

        let r = record(json!({"population": 1}));
        assert_eq!(geography_key(&r), None);
    }

    #[test]
    fn geography_filter_matches_whole_words() {
        let r = record(json!({"county": "Travis County", "state": "TX"}));
        assert!(matches_geography(&r, &["travis".into()]));
        assert!(matches_geography(&r, &["Travis County, TX".into()]));
        assert!(matches_geography(&r, &[]));
        assert!(!matches_geography(&r, &["Harris".into()]));
        assert!(!matches_geography(&r, &["Trav".into()]));
    }

    #[test]
    fn state_suffix_does_not_match_other_counties() {
        let harris = record(json!({"county": "Harris", "state": "TX"}));
        assert!(!matches_geography(&harris, &["Travis County, TX".into()]));

        let travis = record(json!({"county": "Travis", "state": "TX"}));
        assert!(matches_geography(&travis, &["Travis County, TX".into()]));
        assert!(!matches_geography(&travis, &["Travis County, OK".into()]));
    }

    #[test]
    fn short_state_codes_are_not_substrings() {
        let lane = record(json!({"county": "Lane", "state": "OR"}));
        assert!(!matches_geography(&lane, &["Orange".into()]));
        assert!(matches_geography(&lane, &["OR".into()]));

        let orange = record(json!({"county": "Orange County", "state": "CA"}));
        assert!(matches_geography(&orange, &["Orange".into()]));
    }

    #[test]
    fn fips_matches_exactly() {
        let r = record(json!({"fips": 48453, "population": 1}));
        assert!(matches_geography(&r, &["48453".into()]));
        assert!(!matches_geography(&r, &["4845".into()]));
    }

    #[test]
    fn snake_case_columns() {
        assert_eq!(snake_case("Median Income"), "median_income");
        assert_eq!(snake_case("medianIncome"), "median_income");
        assert_eq!(snake_case("POPULATION"), "population");
        assert_eq!(snake_case("pct_over_65 "), "pct_over_65");
    }
}
