//! Query patterns and their canonical form.
//!
//! A [`QueryPattern`] is what the natural-language translator hands to the
//! core. Two patterns that differ only in entity ordering, letter case or
//! query-text whitespace describe the same query, so the cache keys on the
//! [`CanonicalPattern`] instead of the raw input.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Entities extracted from the user's request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    /// Geographies mentioned (counties, states, regions).
    #[serde(default)]
    pub geography: Vec<String>,
    /// Metrics requested (population, median_income, ...).
    #[serde(default)]
    pub metrics: Vec<String>,
    /// Optional timeframe, e.g. `"2020"` or `"2015-2020"`.
    #[serde(default)]
    pub timeframe: Option<String>,
}

/// A translated query: intent, entities, executable query text and parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPattern {
    pub intent: String,
    #[serde(default)]
    pub entities: Entities,
    pub query_text: String,
    /// Named parameters bound into `query_text` (`:name`, `@name`, `$name`).
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

impl QueryPattern {
    /// Create a pattern with no entities or parameters.
    pub fn new(intent: impl Into<String>, query_text: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            query_text: query_text.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_geography<I, S>(mut self, geography: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities.geography = geography.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities.metrics = metrics.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_timeframe(mut self, timeframe: impl Into<String>) -> Self {
        self.entities.timeframe = Some(timeframe.into());
        self
    }

    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Order-independent, normalized view of this pattern.
    #[must_use]
    pub fn canonical(&self) -> CanonicalPattern {
        CanonicalPattern {
            intent: self.intent.trim().to_lowercase(),
            geography: normalize_list(&self.entities.geography),
            metrics: normalize_list(&self.entities.metrics),
            timeframe: self
                .entities
                .timeframe
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_lowercase),
            query_text: normalize_text(&self.query_text),
            parameters: self.parameters.clone(),
        }
    }

    /// Deterministic cache key for this pattern.
    #[must_use]
    pub fn cache_key(&self) -> CacheKey {
        self.canonical().key()
    }
}

/// Normalized pattern used for hashing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalPattern {
    pub intent: String,
    pub geography: Vec<String>,
    pub metrics: Vec<String>,
    pub timeframe: Option<String>,
    pub query_text: String,
    pub parameters: BTreeMap<String, Value>,
}

impl CanonicalPattern {
    /// SHA-256 over the serialized canonical form.
    ///
    /// Field order is fixed by the struct and parameters live in a
    /// `BTreeMap`, so serialization is stable.
    #[must_use]
    pub fn key(&self) -> CacheKey {
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        let digest = Sha256::digest(&encoded);
        CacheKey(format!("{digest:x}"))
    }
}

/// Hex-encoded SHA-256 cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize_list(items: &[String]) -> Vec<String> {
    let mut out: Vec<String> = items
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Collapse whitespace and lowercase SQL text outside quoted literals.
///
/// Quoted strings and identifiers are case-sensitive, so `'TX'` and `'tx'`
/// stay distinct. A doubled quote inside a literal closes and reopens it,
/// which leaves its contents untouched.
fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut pending_space = false;
    for ch in text.trim().chars() {
        match quote {
            Some(q) => {
                out.push(ch);
                if ch == q {
                    quote = None;
                }
            }
            None if ch.is_whitespace() => pending_space = true,
            None => {
                if pending_space {
                    out.push(' ');
                    pending_space = false;
                }
                if ch == '\'' || ch == '"' {
                    quote = Some(ch);
                    out.push(ch);
                } else {
                    out.extend(ch.to_lowercase());
                }
            }
        }
    }
    out
}
