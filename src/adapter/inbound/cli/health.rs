//! `queryweave health`: source health and pool statistics.

use std::sync::Arc;

use anyhow::{bail, Result};
use serde_json::json;
use tabled::{Table, Tabled};

use super::output;
use crate::application::federation::SourceHealth;
use crate::infrastructure::bootstrap;
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::pool::PoolStats;
use crate::port::outbound::monitor::TracingMonitor;

#[derive(Tabled)]
struct SourceRow {
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Status")]
    status: &'static str,
    #[tabled(rename = "Breaker")]
    breaker: String,
}

#[derive(Tabled)]
struct PoolRow {
    #[tabled(rename = "Pool")]
    pool: String,
    #[tabled(rename = "Total")]
    total: usize,
    #[tabled(rename = "Active")]
    active: usize,
    #[tabled(rename = "Idle")]
    idle: usize,
    #[tabled(rename = "Waiting")]
    waiting: usize,
    #[tabled(rename = "Timeouts")]
    timeouts: u64,
}

fn source_rows(health: &[SourceHealth]) -> Vec<SourceRow> {
    health
        .iter()
        .map(|h| SourceRow {
            source: h.source.clone(),
            role: format!("{:?}", h.role).to_lowercase(),
            status: if h.healthy { "healthy" } else { "unhealthy" },
            breaker: format!("{:?}", h.breaker).to_lowercase(),
        })
        .collect()
}

fn pool_rows(stats: &[(String, PoolStats)]) -> Vec<PoolRow> {
    stats
        .iter()
        .map(|(id, s)| PoolRow {
            pool: id.clone(),
            total: s.total,
            active: s.active,
            idle: s.idle,
            waiting: s.waiting,
            timeouts: s.timeouts,
        })
        .collect()
}

pub async fn execute(config: &Config) -> Result<()> {
    let core = bootstrap::start(config, Arc::new(TracingMonitor::new())).await?;
    let health = core.health().await;
    let pools = core.pool_stats();
    core.shutdown().await;

    let healthy = health.iter().all(|h| h.healthy);

    if output::is_json() {
        let pools: Vec<_> = pools
            .iter()
            .map(|(id, stats)| json!({ "source": id, "stats": stats }))
            .collect();
        output::json_output(&json!({
            "command": "health",
            "status": if healthy { "healthy" } else { "unhealthy" },
            "sources": health,
            "pools": pools,
        }));
    } else {
        output::header(env!("CARGO_PKG_VERSION"));
        output::section("Sources");
        output::lines(&Table::new(source_rows(&health)).to_string());
        if !pools.is_empty() {
            output::section("Pools");
            output::lines(&Table::new(pool_rows(&pools)).to_string());
        }
    }

    if !healthy {
        let down: Vec<_> = health
            .iter()
            .filter(|h| !h.healthy)
            .map(|h| output::status(false, &h.source))
            .collect();
        output::error(&format!("unhealthy sources: {}", down.join(", ")));
        bail!("health check failed");
    }
    output::success(&output::status(true, "all sources healthy"));
    Ok(())
}
