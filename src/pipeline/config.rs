use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Backoff for transient gateway failures.
///
/// Delay before retry `n` (0-indexed) is
/// `min(initial_delay_ms * multiplier^n, max_delay_ms)`. There is no jitter,
/// so two runs over the same stub gateways wait the same way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 200,
            max_delay_ms: 5_000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

/// What the literature search is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStrategy {
    /// Query with the chief complaint; retrieval runs alongside diagnosis
    #[default]
    ChiefComplaint,
    /// Wait for the differential and query the top condition
    TopDiagnosis,
    /// Like `ChiefComplaint`, then follow up on the leading conditions when
    /// the [`DeepResearchPolicy`] says the differential needs more support
    DeepResearch,
}

/// When and how the `DeepResearch` strategy digs into the literature for
/// individual conditions.
///
/// The follow-up runs if the top diagnosis is held with less than
/// `confidence_below`, the patient has at least
/// `chronic_condition_threshold` chronic conditions, or the top condition
/// name contains one of `rare_terms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepResearchPolicy {
    pub confidence_below: f64,
    pub chronic_condition_threshold: usize,
    pub rare_terms: Vec<String>,
    /// Leading conditions researched individually
    pub max_conditions: usize,
    pub results_per_query: usize,
}

impl Default for DeepResearchPolicy {
    fn default() -> Self {
        Self {
            confidence_below: 0.7,
            chronic_condition_threshold: 3,
            rare_terms: ["rare", "uncommon", "atypical", "unusual"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_conditions: 3,
            results_per_query: 2,
        }
    }
}

/// Engine-wide tuning. Every field has a default, so a partial JSON document
/// is a valid configuration.
///
/// # Examples
///
/// ```
/// use clinflow::EngineConfig;
///
/// let config = EngineConfig::default()
///     .sources(["pubmed", "web"])
///     .max_concurrency(2);
/// assert_eq!(config.retrieval_width(), 2);
///
/// let parsed: EngineConfig =
///     serde_json::from_str(r#"{"call_timeout_ms": 5000, "sources": ["web"]}"#).unwrap();
/// assert_eq!(parsed.max_diagnoses, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub call_timeout_ms: u64,
    pub retry: RetryPolicy,
    pub max_concurrency: usize,
    pub sources: Vec<String>,
    pub max_results_per_source: usize,
    pub query_strategy: QueryStrategy,
    pub max_diagnoses: usize,
    pub deep_research: DeepResearchPolicy,
    pub summary_excerpt_chars: usize,
    /// Upper bound on any evidence summary kept in the case state, and the
    /// prefix length of the fallback summary
    pub summary_fallback_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 30_000,
            retry: RetryPolicy::default(),
            max_concurrency: 4,
            sources: Vec::new(),
            max_results_per_source: 3,
            query_strategy: QueryStrategy::default(),
            max_diagnoses: 5,
            deep_research: DeepResearchPolicy::default(),
            summary_excerpt_chars: 2_000,
            summary_fallback_chars: 200,
        }
    }
}

impl EngineConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Size of the retrieval worker pool: one worker per source, capped by
    /// `max_concurrency`, never zero.
    pub fn retrieval_width(&self) -> usize {
        self.pool_width(self.sources.len())
    }

    /// Workers for a batch of `jobs` searches.
    pub fn pool_width(&self, jobs: usize) -> usize {
        jobs.min(self.max_concurrency).max(1)
    }

    /// Diagnoses kept after ranking. A configured limit of zero still keeps
    /// the top one.
    pub fn diagnosis_limit(&self) -> usize {
        self.max_diagnoses.max(1)
    }

    pub fn call_timeout_ms(mut self, timeout_ms: u64) -> Self {
        debug!(
            previous = self.call_timeout_ms,
            new = timeout_ms,
            "Setting call timeout"
        );
        self.call_timeout_ms = timeout_ms;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        debug!(previous = ?self.retry, new = ?retry, "Setting retry policy");
        self.retry = retry;
        self
    }

    pub fn max_concurrency(mut self, max: usize) -> Self {
        debug!(
            previous = self.max_concurrency,
            new = max,
            "Setting retrieval concurrency"
        );
        self.max_concurrency = max.max(1);
        self
    }

    pub fn sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = sources.into_iter().map(Into::into).collect();
        debug!(sources = ?self.sources, "Setting retrieval sources");
        self
    }

    pub fn max_results_per_source(mut self, max: usize) -> Self {
        debug!(
            previous = self.max_results_per_source,
            new = max,
            "Setting results per source"
        );
        self.max_results_per_source = max;
        self
    }

    pub fn query_strategy(mut self, strategy: QueryStrategy) -> Self {
        debug!(previous = ?self.query_strategy, new = ?strategy, "Setting query strategy");
        self.query_strategy = strategy;
        self
    }

    pub fn max_diagnoses(mut self, max: usize) -> Self {
        debug!(
            previous = self.max_diagnoses,
            new = max,
            "Setting diagnosis limit"
        );
        self.max_diagnoses = max.max(1);
        self
    }

    pub fn deep_research(mut self, policy: DeepResearchPolicy) -> Self {
        debug!(previous = ?self.deep_research, new = ?policy, "Setting deep research policy");
        self.deep_research = policy;
        self
    }
}
