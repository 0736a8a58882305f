//! Cache hit accounting and per-pattern latency profiling.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use serde::Serialize;

/// Number of patterns listed in [`CacheReport::slowest_patterns`].
const SLOWEST_LIMIT: usize = 5;

#[derive(Debug, Default, Clone, Copy)]
struct Latency {
    calls: u64,
    total: Duration,
    max: Duration,
}

/// Average and worst-case latency of one pattern.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternLatency {
    pub pattern: String,
    pub calls: u64,
    pub avg_ms: f64,
    pub max_ms: f64,
}

/// Snapshot of cache effectiveness.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheReport {
    pub hits: u64,
    pub misses: u64,
    pub stale_hits: u64,
    /// Misses answered by another caller's in-flight fetch.
    pub coalesced: u64,
    pub revalidations: u64,
    pub evictions: u64,
    pub decode_failures: u64,
    pub hit_rate: f64,
    /// Hit rate over the most recent lookups only.
    pub rolling_hit_rate: f64,
    pub entries: usize,
    pub compressed_entries: usize,
    pub slowest_patterns: Vec<PatternLatency>,
}

#[derive(Debug)]
pub(crate) struct CacheStats {
    pub(crate) hits: u64,
    pub(crate) misses: u64,
    pub(crate) stale_hits: u64,
    pub(crate) coalesced: u64,
    pub(crate) revalidations: u64,
    pub(crate) evictions: u64,
    pub(crate) decode_failures: u64,
    window: VecDeque<bool>,
    window_size: usize,
    latency: HashMap<String, Latency>,
}

impl CacheStats {
    pub(crate) fn new(window_size: usize) -> Self {
        Self {
            hits: 0,
            misses: 0,
            stale_hits: 0,
            coalesced: 0,
            revalidations: 0,
            evictions: 0,
            decode_failures: 0,
            window: VecDeque::with_capacity(window_size),
            window_size: window_size.max(1),
            latency: HashMap::new(),
        }
    }

    pub(crate) fn record_hit(&mut self, stale: bool) {
        self.hits += 1;
        if stale {
            self.stale_hits += 1;
        }
        self.push_window(true);
    }

    pub(crate) fn record_miss(&mut self) {
        self.misses += 1;
        self.push_window(false);
    }

    fn push_window(&mut self, hit: bool) {
        if self.window.len() == self.window_size {
            self.window.pop_front();
        }
        self.window.push_back(hit);
    }

    pub(crate) fn record_latency(&mut self, pattern: &str, elapsed: Duration) {
        let entry = self.latency.entry(pattern.to_string()).or_default();
        entry.calls += 1;
        entry.total += elapsed;
        entry.max = entry.max.max(elapsed);
    }

    pub(crate) fn hit_rate(&self) -> f64 {
        ratio(self.hits, self.hits + self.misses)
    }

    pub(crate) fn rolling_hit_rate(&self) -> f64 {
        let hits = self.window.iter().filter(|hit| **hit).count();
        ratio(hits as u64, self.window.len() as u64)
    }

    pub(crate) fn slowest(&self) -> Vec<PatternLatency> {
        let mut out: Vec<PatternLatency> = self
            .latency
            .iter()
            .map(|(pattern, l)| PatternLatency {
                pattern: pattern.clone(),
                calls: l.calls,
                avg_ms: millis(l.total) / l.calls.max(1) as f64,
                max_ms: millis(l.max),
            })
            .collect();
        out.sort_by(|a, b| {
            b.avg_ms
                .total_cmp(&a.avg_ms)
                .then_with(|| a.pattern.cmp(&b.pattern))
        });
        out.truncate(SLOWEST_LIMIT);
        out
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new(self.window_size);
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_window_forgets_old_lookups() {
        let mut stats = CacheStats::new(4);
        for _ in 0..4 {
            stats.record_miss();
        }
        for _ in 0..4 {
            stats.record_hit(false);
        }
        assert_eq!(stats.rolling_hit_rate(), 1.0);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn empty_stats_report_zero_rates() {
        let stats = CacheStats::new(10);
        assert_eq!(stats.hit_rate(), 0.0);
        assert_eq!(stats.rolling_hit_rate(), 0.0);
    }

    #[test]
    fn slowest_patterns_sorted_by_average() {
        let mut stats = CacheStats::new(10);
        stats.record_latency("population_lookup", Duration::from_millis(10));
        stats.record_latency("population_lookup", Duration::from_millis(30));
        stats.record_latency("income_trend", Duration::from_millis(50));

        let slowest = stats.slowest();
        assert_eq!(slowest[0].pattern, "income_trend");
        assert_eq!(slowest[1].pattern, "population_lookup");
        assert_eq!(slowest[1].calls, 2);
        assert!((slowest[1].avg_ms - 20.0).abs() < 1e-9);
        assert!((slowest[1].max_ms - 30.0).abs() < 1e-9);
    }

    #[test]
    fn stale_hits_count_as_hits() {
        let mut stats = CacheStats::new(10);
        stats.record_hit(true);
        assert_eq!((stats.hits, stats.stale_hits), (1, 1));
    }
}
