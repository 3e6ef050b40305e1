// config.rs - Evaluation settings for uniform grid calls
//
// Every field has a default, so partial JSON documents are accepted.

use crate::error::Result;
use crate::simd::SimdTier;
use serde::{Deserialize, Serialize};

/// Default number of memoised samples per worker for `GeneratorCache` nodes.
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

/// Knobs for a single grid evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Evaluate rows on the rayon pool.
    pub parallel: bool,
    /// Grids with fewer rows than this run on the calling thread.
    pub min_parallel_rows: usize,
    /// Force a batch width instead of the terminal node's tier.
    pub simd_tier: Option<SimdTier>,
    /// LRU capacity of each worker's `GeneratorCache` memo. Zero disables it.
    pub cache_capacity: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            parallel: true,
            min_parallel_rows: 8,
            simd_tier: None,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl EvalConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Config that evaluates at the given tier.
    pub fn with_tier(tier: SimdTier) -> Self {
        EvalConfig {
            simd_tier: Some(tier),
            ..EvalConfig::default()
        }
    }

    /// Tier used for a call whose terminal node reports `node_tier`.
    pub fn tier_for(&self, node_tier: SimdTier) -> SimdTier {
        self.simd_tier.unwrap_or(node_tier)
    }

    pub(crate) fn runs_parallel(&self, rows: usize) -> bool {
        self.parallel && rows >= self.min_parallel_rows.max(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NoiseError;

    #[test]
    fn defaults() {
        let cfg = EvalConfig::default();
        assert!(cfg.parallel);
        assert_eq!(cfg.simd_tier, None);
        assert_eq!(cfg.cache_capacity, DEFAULT_CACHE_CAPACITY);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = EvalConfig::from_json(r#"{ "parallel": false, "simd_tier": "Avx2" }"#).unwrap();
        assert!(!cfg.parallel);
        assert_eq!(cfg.simd_tier, Some(SimdTier::Avx2));
        assert_eq!(cfg.min_parallel_rows, 8);
        assert_eq!(cfg.cache_capacity, DEFAULT_CACHE_CAPACITY);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = EvalConfig::from_json("{ parallel: ").unwrap_err();
        assert!(matches!(err, NoiseError::Config(_)));
    }

    #[test]
    fn tier_override() {
        let cfg = EvalConfig::with_tier(SimdTier::Scalar);
        assert_eq!(cfg.tier_for(SimdTier::Avx512), SimdTier::Scalar);
        assert_eq!(EvalConfig::default().tier_for(SimdTier::Sse2), SimdTier::Sse2);
    }

    #[test]
    fn small_grids_stay_on_caller() {
        let cfg = EvalConfig::default();
        assert!(!cfg.runs_parallel(1));
        assert!(!cfg.runs_parallel(4));
        assert!(cfg.runs_parallel(64));
        let serial = EvalConfig {
            parallel: false,
            ..EvalConfig::default()
        };
        assert!(!serial.runs_parallel(1024));
    }

    #[test]
    fn serializes_round_trip() {
        let cfg = EvalConfig::with_tier(SimdTier::Neon);
        let json = serde_json::to_string(&cfg).unwrap();
        assert_eq!(EvalConfig::from_json(&json).unwrap(), cfg);
    }
}
