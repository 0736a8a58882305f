//! Result cache behaviour through the query service.

use std::sync::Arc;
use std::time::Duration;

use queryweave::application::cache::ResultCache;
use queryweave::application::federation::{DatasetFederator, PrimaryWithFallback, PRIMARY_WITH_FALLBACK};
use queryweave::application::query::QueryExecutor;
use queryweave::infrastructure::breaker::BreakerRegistry;
use queryweave::port::inbound::query::QueryService;
use queryweave::port::outbound::monitor::NullMonitor;
use queryweave::testkit;
use queryweave::testkit::dataset::ScriptedDataset;
use queryweave::testkit::domain::{county, population_pattern};

const TTL: Duration = Duration::from_secs(60);
const STALE: Duration = Duration::from_secs(30);

fn executor(dataset: Arc<ScriptedDataset>) -> QueryExecutor {
    let mut federator = DatasetFederator::new(
        PRIMARY_WITH_FALLBACK,
        Arc::new(BreakerRegistry::new(testkit::config::breaker(5))),
        Arc::new(NullMonitor),
    );
    federator.register_strategy(Arc::new(PrimaryWithFallback));
    federator.register_adapter(dataset);
    QueryExecutor::new(ResultCache::new(testkit::config::cache(TTL, STALE)), Arc::new(federator))
}

#[tokio::test(start_paused = true)]
async fn stale_entry_is_served_then_revalidated() {
    let dataset = Arc::new(ScriptedDataset::new("census_db").with_rows(vec![county("Travis", "TX", 1)]));
    let executor = executor(dataset.clone());
    let pattern = population_pattern(&["Travis"]);

    executor.execute_query(&pattern).await.unwrap();

    tokio::time::advance(TTL).await;
    let at_ttl = executor.execute_query(&pattern).await.unwrap();
    assert!(at_ttl.metadata.cached);
    assert!(!at_ttl.metadata.stale, "an entry exactly TTL old is still fresh");

    tokio::time::advance(Duration::from_secs(1)).await;
    let stale = executor.execute_query(&pattern).await.unwrap();
    assert!(stale.metadata.cached);
    assert!(stale.metadata.stale);

    // Let the background refresh run.
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(dataset.queries(), 2);

    let fresh = executor.execute_query(&pattern).await.unwrap();
    assert!(fresh.metadata.cached);
    assert!(!fresh.metadata.stale);
    assert_eq!(executor.cache().report().revalidations, 1);
}

#[tokio::test(start_paused = true)]
async fn entry_past_stale_window_is_refetched() {
    let dataset = Arc::new(ScriptedDataset::new("census_db").with_rows(vec![county("Travis", "TX", 1)]));
    let executor = executor(dataset.clone());
    let pattern = population_pattern(&["Travis"]);

    executor.execute_query(&pattern).await.unwrap();
    tokio::time::advance(TTL + STALE + Duration::from_secs(1)).await;

    let response = executor.execute_query(&pattern).await.unwrap();
    assert!(!response.metadata.cached);
    assert_eq!(dataset.queries(), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_identical_queries_fetch_once() {
    let dataset = Arc::new(
        ScriptedDataset::new("census_db")
            .with_rows(vec![county("Travis", "TX", 1)])
            .with_delay(Duration::from_millis(50)),
    );
    let executor = Arc::new(executor(dataset.clone()));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let executor = Arc::clone(&executor);
            tokio::spawn(async move { executor.execute_query(&population_pattern(&["Travis"])).await })
        })
        .collect();

    let mut fresh = 0;
    for task in tasks {
        let response = task.await.unwrap().unwrap();
        if !response.metadata.cached {
            fresh += 1;
        }
    }

    assert_eq!(dataset.queries(), 1);
    assert_eq!(fresh, 1);
    assert_eq!(executor.cache().report().coalesced, 7);
}

#[tokio::test(start_paused = true)]
async fn equivalent_patterns_share_an_entry() {
    let dataset = Arc::new(ScriptedDataset::new("census_db").with_rows(vec![county("Travis", "TX", 1)]));
    let executor = executor(dataset.clone());

    executor
        .execute_query(&population_pattern(&["Travis", "Harris"]))
        .await
        .unwrap();
    let reordered = executor
        .execute_query(&population_pattern(&["harris", "TRAVIS"]))
        .await
        .unwrap();

    assert!(reordered.metadata.cached);
    assert_eq!(dataset.queries(), 1);
}
