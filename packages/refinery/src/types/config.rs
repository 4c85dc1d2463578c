//! Configuration types for extraction, fusion, and pipeline runs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the fact extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Repair retries after a schema violation.
    ///
    /// Each retry re-invokes the structuring interface with an instruction
    /// naming the violated constraint. Default: 1.
    pub repair_attempts: usize,

    /// Upper bound on a single structuring call.
    ///
    /// An elapsed timeout classifies as `Unavailable`; backoff and retry
    /// scheduling belong to the pipeline, not the extractor.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            repair_attempts: 1,
            timeout: Duration::from_secs(120),
        }
    }
}

impl ExtractorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the repair retry budget.
    pub fn with_repair_attempts(mut self, attempts: usize) -> Self {
        self.repair_attempts = attempts;
        self
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Configuration for hybrid score fusion.
///
/// Weights are tunable without touching retrieval logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Weight of the normalized semantic score. Default: 0.5.
    pub semantic_weight: f32,

    /// Weight of the normalized lexical score. Default: 0.5.
    pub lexical_weight: f32,

    /// Over-fetch factor: each index is asked for `factor * k` candidates
    /// so the fusion step has enough to work with. Default: 3.
    pub overfetch_factor: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            semantic_weight: 0.5,
            lexical_weight: 0.5,
            overfetch_factor: 3,
        }
    }
}

impl FusionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set both fusion weights.
    pub fn with_weights(mut self, semantic: f32, lexical: f32) -> Self {
        self.semantic_weight = semantic;
        self.lexical_weight = lexical;
        self
    }

    /// Set the over-fetch factor (clamped to at least 1).
    pub fn with_overfetch_factor(mut self, factor: usize) -> Self {
        self.overfetch_factor = factor.max(1);
        self
    }

    /// Candidates to request from each index for a top-`k` query.
    pub fn overfetch(&self, k: usize) -> usize {
        self.overfetch_factor.max(1) * k
    }
}

/// Configuration for a pipeline ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Concurrent extraction calls (bounded worker pool). Default: 4.
    pub concurrency: usize,

    /// Total attempts per record when the structuring interface is
    /// unavailable (first try included). Default: 3.
    pub max_attempts: u32,

    /// Backoff before the first retry; doubles per attempt.
    #[serde(with = "duration_secs")]
    pub initial_backoff: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker pool size (clamped to at least 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the retry budget for unavailable-transport failures.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the initial backoff.
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Backoff before retry number `attempt` (1-based), doubling each time.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.initial_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overfetch_is_at_least_k() {
        let config = FusionConfig::default();
        assert!(config.overfetch(5) >= 5);

        let degenerate = FusionConfig::default().with_overfetch_factor(0);
        assert!(degenerate.overfetch(5) >= 5);
    }

    #[test]
    fn test_backoff_doubles() {
        let config = PipelineConfig::default().with_initial_backoff(Duration::from_secs(1));
        assert_eq!(config.backoff_for(1), Duration::from_secs(1));
        assert_eq!(config.backoff_for(2), Duration::from_secs(2));
        assert_eq!(config.backoff_for(3), Duration::from_secs(4));
    }
}
