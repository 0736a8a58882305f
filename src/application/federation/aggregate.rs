//! Query every source at once and enrich the best result with the rest.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use super::source::SourceSet;
use super::strategy::{FederationStrategy, StrategyOutcome};
use super::MULTI_SOURCE_AGGREGATION;
use crate::domain::{geography_key, is_geography_field, QueryPattern, Record};
use crate::error::{FederationError, Result, SourceFailure};

/// Field listing the sources merged into an enriched record.
pub const ENRICHED_SOURCES_FIELD: &str = "enrichedSources";

/// Concurrent fan-out with geography-keyed enrichment.
///
/// Only handles patterns that name at least one geography, since the join
/// key is geographic.
#[derive(Debug, Default, Clone, Copy)]
pub struct MultiSourceAggregation;

struct Contribution {
    index: usize,
    source: String,
    primary: bool,
    weight: f64,
    records: Vec<Record>,
}

impl Contribution {
    fn score(&self) -> f64 {
        self.records.len() as f64 * self.weight
    }
}

/// Primary first, then by records × weight, then registration order.
fn rank(a: &Contribution, b: &Contribution) -> Ordering {
    b.primary
        .cmp(&a.primary)
        .then_with(|| b.score().partial_cmp(&a.score()).unwrap_or(Ordering::Equal))
        .then_with(|| a.index.cmp(&b.index))
}

#[async_trait]
impl FederationStrategy for MultiSourceAggregation {
    fn name(&self) -> &str {
        MULTI_SOURCE_AGGREGATION
    }

    fn can_handle(&self, pattern: &QueryPattern) -> bool {
        !pattern.entities.geography.is_empty()
    }

    async fn execute(&self, sources: &SourceSet, pattern: &QueryPattern) -> Result<StrategyOutcome> {
        let results = join_all(sources.iter().map(|source| source.fetch(pattern))).await;

        let mut attempted = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        let mut contributions = Vec::new();
        for ((index, source), result) in sources.iter().enumerate().zip(results) {
            let id = source.source_id().to_string();
            attempted.push(id.clone());
            match result {
                Ok(records) => contributions.push(Contribution {
                    index,
                    source: id,
                    primary: sources.is_primary(index),
                    weight: sources.weight(index),
                    records,
                }),
                Err(e) => {
                    warn!(source = %id, error = %e, "Source failed during aggregation");
                    failures.push(SourceFailure {
                        source: id,
                        error: e.to_string(),
                    });
                }
            }
        }

        if contributions.is_empty() {
            return Err(FederationError::AllSourcesFailed { attempts: failures }.into());
        }

        contributions.sort_by(rank);
        let confidence =
            contributions.iter().map(|c| c.weight).sum::<f64>() / contributions.len() as f64;
        let ranked: Vec<String> = contributions.iter().map(|c| c.source.clone()).collect();

        let rest = contributions.split_off(1);
        let base = contributions.remove(0);
        let data = enrich(base.records, &rest);

        debug!(
            base = %base.source,
            contributors = ranked.len(),
            failed = failures.len(),
            confidence,
            "Aggregated sources"
        );

        Ok(StrategyOutcome {
            data,
            sources: ranked,
            sources_attempted: attempted,
            confidence,
        })
    }
}

/// Join `others` onto `base` by geography key.
///
/// Each matched base record gains `"{source}_{field}"` for every
/// non-geography field of the matching record, plus the list of
/// contributing sources. When a source has several records with the same
/// key, the first one wins.
fn enrich(mut base: Vec<Record>, others: &[Contribution]) -> Vec<Record> {
    let indexed: Vec<(&str, HashMap<String, &Record>)> = others
        .iter()
        .map(|c| {
            let mut by_key = HashMap::new();
            for record in &c.records {
                if let Some(key) = geography_key(record) {
                    by_key.entry(key).or_insert(record);
                }
            }
            (c.source.as_str(), by_key)
        })
        .collect();

    for record in &mut base {
        let Some(key) = geography_key(record) else {
            continue;
        };
        let mut enriched = Vec::new();
        for (source, by_key) in &indexed {
            let Some(other) = by_key.get(&key) else {
                continue;
            };
            for (field, value) in other.iter() {
                if !is_geography_field(field) {
                    record.insert(format!("{source}_{field}"), value.clone());
                }
            }
            enriched.push(Value::String((*source).to_string()));
        }
        if !enriched.is_empty() {
            record.insert(ENRICHED_SOURCES_FIELD.to_string(), Value::Array(enriched));
        }
    }
    base
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::application::federation::source::BoundSource;
    use crate::error::Error;
    use crate::infrastructure::breaker::CircuitBreaker;
    use crate::port::outbound::dataset::DatasetAdapter;
    use crate::port::outbound::monitor::NullMonitor;
    use crate::testkit::config;
    use crate::testkit::dataset::ScriptedDataset;
    use crate::testkit::domain::{county, national_pattern, population_pattern, record};

    fn set(datasets: Vec<ScriptedDataset>) -> SourceSet {
        let mut set = SourceSet::default();
        for dataset in datasets {
            let breaker = Arc::new(CircuitBreaker::new(dataset.source_id().to_string(), config::breaker(5)));
            set.push(Arc::new(BoundSource::new(Arc::new(dataset), breaker, Arc::new(NullMonitor))));
        }
        set
    }

    #[test]
    fn needs_geography() {
        assert!(MultiSourceAggregation.can_handle(&population_pattern(&["Travis"])));
        assert!(!MultiSourceAggregation.can_handle(&national_pattern()));
    }

    #[tokio::test]
    async fn enriches_primary_with_matching_records() {
        let sources = set(vec![
            ScriptedDataset::new("census_db").primary().with_rows(vec![
                county("Travis", "TX", 1_290_188),
                county("Harris", "TX", 4_731_145),
            ]),
            ScriptedDataset::new("acs").with_rows(vec![record(json!({
                "county": "travis", "state": "tx", "median_income": 85_000
            }))]),
        ]);

        let outcome = MultiSourceAggregation
            .execute(&sources, &population_pattern(&["Travis", "Harris"]))
            .await
            .unwrap();

        assert_eq!(outcome.sources, vec!["census_db", "acs"]);
        assert_eq!(outcome.sources_attempted, vec!["census_db", "acs"]);
        assert!((outcome.confidence - 0.9).abs() < 1e-9);

        let travis = &outcome.data[0];
        assert_eq!(travis["acs_median_income"], json!(85_000));
        assert_eq!(travis[ENRICHED_SOURCES_FIELD], json!(["acs"]));
        assert!(!travis.contains_key("acs_county"), "geography fields are not copied");

        let harris = &outcome.data[1];
        assert_eq!(harris, &county("Harris", "TX", 4_731_145));
    }

    #[tokio::test]
    async fn base_follows_ranking_not_arrival() {
        // The slow fallback has more weighted rows than the fast one; neither is primary
        // once the primary fails.
        let sources = set(vec![
            ScriptedDataset::new("census_db").primary().failing("locked"),
            ScriptedDataset::new("fast").with_rows(vec![county("Travis", "TX", 1)]),
            ScriptedDataset::new("slow")
                .with_delay(Duration::from_millis(20))
                .with_rows(vec![county("Travis", "TX", 2), county("Harris", "TX", 3)]),
        ]);

        let outcome = MultiSourceAggregation
            .execute(&sources, &population_pattern(&["Travis"]))
            .await
            .unwrap();

        assert_eq!(outcome.sources, vec!["slow", "fast"]);
        assert_eq!(outcome.sources_attempted, vec!["census_db", "fast", "slow"]);
        assert_eq!(outcome.data[0]["population"], json!(2));
        assert_eq!(outcome.data[0]["fast_population"], json!(1));
        assert!((outcome.confidence - 0.85).abs() < 1e-9);
    }

    #[tokio::test]
    async fn ties_break_on_registration_order() {
        let sources = set(vec![
            ScriptedDataset::new("census_db").primary().failing("down"),
            ScriptedDataset::new("a").with_rows(vec![county("Travis", "TX", 1)]),
            ScriptedDataset::new("b").with_rows(vec![county("Travis", "TX", 2)]),
        ]);

        let outcome = MultiSourceAggregation
            .execute(&sources, &population_pattern(&["Travis"]))
            .await
            .unwrap();

        assert_eq!(outcome.sources, vec!["a", "b"]);
        assert_eq!(outcome.data[0]["population"], json!(1));
        assert_eq!(outcome.data[0]["b_population"], json!(2));
    }

    #[tokio::test]
    async fn zero_successes_fails_with_every_attempt() {
        let sources = set(vec![
            ScriptedDataset::new("census_db").primary().failing("locked"),
            ScriptedDataset::new("acs").failing("timeout"),
        ]);

        let err = MultiSourceAggregation
            .execute(&sources, &population_pattern(&["Travis"]))
            .await
            .unwrap_err();

        let Error::Federation(fed) = err else {
            panic!("expected federation error, got {err:?}");
        };
        assert_eq!(fed.attempted_sources(), vec!["census_db", "acs"]);
    }

    #[test]
    fn records_without_key_pass_through() {
        let base = vec![record(json!({"population": 5}))];
        let others = vec![Contribution {
            index: 1,
            source: "acs".into(),
            primary: false,
            weight: 0.85,
            records: vec![record(json!({"geography": "anywhere", "income": 1}))],
        }];
        let out = enrich(base.clone(), &others);
        assert_eq!(out, base);
    }
}
