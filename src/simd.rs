// simd.rs - Runtime SIMD capability detection
//
// The tier is probed once per process and cached for every node created
// afterwards. It decides how many points the evaluator pushes through a node
// per batch; kernels are lane-independent, so every tier yields identical
// output.
//
// `NOISEGRAPH_MAX_SIMD` (e.g. "SSE2", "Scalar") caps the detected tier.

use crate::error::{NoiseError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Environment variable that caps the detected tier.
pub const MAX_SIMD_ENV: &str = "NOISEGRAPH_MAX_SIMD";

/// Widest vector instruction set available to the evaluator.
///
/// Ordered from narrowest to widest within an architecture family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SimdTier {
    /// No level reported.
    Null,
    Scalar,
    Sse,
    Sse2,
    Sse3,
    Ssse3,
    Sse41,
    Sse42,
    Avx,
    Avx2,
    Avx512,
    Neon,
}

impl SimdTier {
    pub const ALL: [SimdTier; 12] = [
        SimdTier::Null,
        SimdTier::Scalar,
        SimdTier::Sse,
        SimdTier::Sse2,
        SimdTier::Sse3,
        SimdTier::Ssse3,
        SimdTier::Sse41,
        SimdTier::Sse42,
        SimdTier::Avx,
        SimdTier::Avx2,
        SimdTier::Avx512,
        SimdTier::Neon,
    ];

    /// Process-wide tier: hardware probe, capped by `NOISEGRAPH_MAX_SIMD`.
    pub fn detect() -> SimdTier {
        static TIER: OnceLock<SimdTier> = OnceLock::new();
        *TIER.get_or_init(|| {
            let probed = probe();
            let tier = match std::env::var(MAX_SIMD_ENV) {
                Ok(raw) => match raw.parse::<SimdTier>() {
                    Ok(cap) => probed.min(cap),
                    Err(err) => {
                        tracing::warn!(value = %raw, %err, "ignoring {}", MAX_SIMD_ENV);
                        probed
                    }
                },
                Err(_) => probed,
            };
            tracing::debug!(%probed, %tier, "SIMD tier selected");
            tier
        })
    }

    /// Points evaluated per node batch at this tier (f32 lanes per register).
    pub fn lane_count(self) -> usize {
        match self {
            SimdTier::Null | SimdTier::Scalar => 1,
            SimdTier::Sse
            | SimdTier::Sse2
            | SimdTier::Sse3
            | SimdTier::Ssse3
            | SimdTier::Sse41
            | SimdTier::Sse42
            | SimdTier::Neon => 4,
            SimdTier::Avx | SimdTier::Avx2 => 8,
            SimdTier::Avx512 => 16,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SimdTier::Null => "Null",
            SimdTier::Scalar => "Scalar",
            SimdTier::Sse => "SSE",
            SimdTier::Sse2 => "SSE2",
            SimdTier::Sse3 => "SSE3",
            SimdTier::Ssse3 => "SSSE3",
            SimdTier::Sse41 => "SSE41",
            SimdTier::Sse42 => "SSE42",
            SimdTier::Avx => "AVX",
            SimdTier::Avx2 => "AVX2",
            SimdTier::Avx512 => "AVX512",
            SimdTier::Neon => "NEON",
        }
    }
}

impl fmt::Display for SimdTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SimdTier {
    type Err = NoiseError;

    /// Case-insensitive; accepts the dotted spellings "SSE4.1" and "SSE4.2".
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().replace('.', "");
        SimdTier::ALL
            .iter()
            .copied()
            .find(|tier| tier.name().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| NoiseError::invalid("SimdTier", "tier", format!("unknown tier '{s}'")))
    }
}

// ── Hardware probe ──────────────────────────────────────────────────

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn probe() -> SimdTier {
    if is_x86_feature_detected!("avx512f") {
        SimdTier::Avx512
    } else if is_x86_feature_detected!("avx2") {
        SimdTier::Avx2
    } else if is_x86_feature_detected!("avx") {
        SimdTier::Avx
    } else if is_x86_feature_detected!("sse4.2") {
        SimdTier::Sse42
    } else if is_x86_feature_detected!("sse4.1") {
        SimdTier::Sse41
    } else if is_x86_feature_detected!("ssse3") {
        SimdTier::Ssse3
    } else if is_x86_feature_detected!("sse3") {
        SimdTier::Sse3
    } else if is_x86_feature_detected!("sse2") {
        SimdTier::Sse2
    } else if is_x86_feature_detected!("sse") {
        SimdTier::Sse
    } else {
        SimdTier::Scalar
    }
}

#[cfg(target_arch = "aarch64")]
fn probe() -> SimdTier {
    if std::arch::is_aarch64_feature_detected!("neon") {
        SimdTier::Neon
    } else {
        SimdTier::Scalar
    }
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
fn probe() -> SimdTier {
    SimdTier::Scalar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_is_stable_and_reports_a_level() {
        let a = SimdTier::detect();
        let b = SimdTier::detect();
        assert_eq!(a, b);
        assert_ne!(a, SimdTier::Null);
        assert!(a.lane_count() >= 1);
    }

    #[test]
    fn lane_counts_follow_register_width() {
        assert_eq!(SimdTier::Scalar.lane_count(), 1);
        assert_eq!(SimdTier::Sse41.lane_count(), 4);
        assert_eq!(SimdTier::Neon.lane_count(), 4);
        assert_eq!(SimdTier::Avx2.lane_count(), 8);
        assert_eq!(SimdTier::Avx512.lane_count(), 16);
    }

    #[test]
    fn names_parse_back() {
        for tier in SimdTier::ALL {
            assert_eq!(tier.name().parse::<SimdTier>().unwrap(), tier);
        }
    }

    #[test]
    fn parse_is_case_insensitive_and_accepts_dots() {
        assert_eq!("avx2".parse::<SimdTier>().unwrap(), SimdTier::Avx2);
        assert_eq!("SSE4.1".parse::<SimdTier>().unwrap(), SimdTier::Sse41);
        assert_eq!(" scalar ".parse::<SimdTier>().unwrap(), SimdTier::Scalar);
    }

    #[test]
    fn parse_rejects_unknown() {
        let err = "MMX".parse::<SimdTier>().unwrap_err();
        assert!(matches!(err, NoiseError::InvalidParameter { node: "SimdTier", .. }));
    }

    #[test]
    fn ordering_caps_within_x86() {
        assert_eq!(SimdTier::Avx512.min(SimdTier::Sse2), SimdTier::Sse2);
        assert!(SimdTier::Scalar < SimdTier::Sse);
    }
}
