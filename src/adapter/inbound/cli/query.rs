//! `queryweave query`: run one pattern and print the response.

use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};

use super::output;
use crate::application::query::QueryExecutor;
use crate::domain::QueryPattern;
use crate::infrastructure::bootstrap;
use crate::infrastructure::config::settings::Config;
use crate::port::inbound::query::QueryService;
use crate::port::outbound::monitor::TracingMonitor;

/// Read a pattern from `source`, a file path or `-` for stdin.
pub fn read_pattern(source: &str) -> Result<QueryPattern> {
    let text = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read pattern from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("failed to read pattern file {source}"))?
    };
    serde_json::from_str(&text).context("pattern is not valid JSON")
}

pub async fn execute(config: &Config, pattern_source: &str, strategy: Option<&str>) -> Result<()> {
    let pattern = read_pattern(pattern_source)?;
    let core = bootstrap::start(config, Arc::new(TracingMonitor::new())).await?;

    let result = match strategy {
        Some(name) => {
            QueryExecutor::new(core.executor.cache().clone(), Arc::clone(&core.federator))
                .with_preferred_strategy(name)
                .execute_query(&pattern)
                .await
        }
        None => core.executor.execute_query(&pattern).await,
    };
    core.shutdown().await;

    let response = result.context("query failed")?;
    output::json_pretty(&response)?;
    Ok(())
}
