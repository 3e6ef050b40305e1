// node/fractal.rs - Octave-summing fractal family
//
// Each octave samples the source with the seed advanced by one and the
// point multiplied by `lacunarity` once more. The running amplitude starts
// at the fractal bounding (`1 / Σ gainⁱ`, so a [-1, 1] source yields a
// [-1, 1] sum), is multiplied by `gain` per octave and, with
// `weighted_strength > 0`, also by the octave's own normalised value.

use crate::error::{NoiseError, Result};
use crate::eval::compiled::{FractalKind, FractalOp, Op, Param};
use crate::eval::graph::Lowering;
use crate::node::hybrid::collect_sources;
use crate::node::{
    check_finite, HasSource, HybridSource, Node, NodeKind, SmartNode, SourceList, SourceSlot,
};

/// Gain used for the bounding when `gain` is sampled from a node.
const SOURCED_GAIN_ESTIMATE: f32 = 0.5;

/// Settings shared by every fractal node.
#[derive(Debug, Clone)]
pub struct FractalParams {
    pub gain: HybridSource,
    pub weighted_strength: HybridSource,
    pub octave_count: u32,
    pub lacunarity: f32,
}

impl Default for FractalParams {
    fn default() -> Self {
        FractalParams {
            gain: HybridSource::Constant(0.5),
            weighted_strength: HybridSource::Constant(0.0),
            octave_count: 3,
            lacunarity: 2.0,
        }
    }
}

impl FractalParams {
    /// `1 / (1 + g + g² + … + g^(octaves-1))` for `g = |gain|`.
    pub fn bounding(&self) -> f32 {
        let gain = self
            .gain
            .constant()
            .unwrap_or(SOURCED_GAIN_ESTIMATE)
            .abs();
        let mut amp = gain;
        let mut total = 1.0f32;
        for _ in 1..self.octave_count {
            total += amp;
            amp *= gain;
        }
        1.0 / total
    }

    fn lower(
        &self,
        cx: &mut Lowering<'_>,
        kind: FractalKind,
        source: &SourceSlot,
        ping_pong_strength: Param,
    ) -> Result<Op> {
        let source = cx.source("source", source)?;
        if self.octave_count < 1 {
            return Err(cx.invalid("octave_count", "at least one octave is required"));
        }
        Ok(Op::Fractal(FractalOp {
            kind,
            source,
            gain: cx.param(&self.gain)?,
            weighted_strength: cx.param(&self.weighted_strength)?,
            ping_pong_strength,
            octaves: self.octave_count,
            lacunarity: self.lacunarity,
            bounding: self.bounding(),
        }))
    }
}

/// Marker for fractal nodes; unlocks the shared fractal setters.
pub trait Fractal: HasSource {
    fn fractal(&self) -> &FractalParams;
    fn fractal_mut(&mut self) -> &mut FractalParams;
}

impl<T: Fractal> SmartNode<T> {
    pub fn set_gain(&self, gain: impl Into<HybridSource>) -> Result<()> {
        self.bind_hybrid("gain", gain.into(), |n| &mut n.fractal_mut().gain)
    }

    pub fn set_weighted_strength(&self, strength: impl Into<HybridSource>) -> Result<()> {
        self.bind_hybrid("weighted_strength", strength.into(), |n| {
            &mut n.fractal_mut().weighted_strength
        })
    }

    /// Number of octaves; must be at least 1.
    pub fn set_octave_count(&self, octaves: i32) -> Result<()> {
        let octaves = u32::try_from(octaves)
            .ok()
            .filter(|&o| o >= 1)
            .ok_or_else(|| {
                NoiseError::invalid(
                    T::KIND.name(),
                    "octave_count",
                    format!("{octaves} is less than 1"),
                )
            })?;
        self.write().fractal_mut().octave_count = octaves;
        Ok(())
    }

    pub fn set_lacunarity(&self, lacunarity: f32) -> Result<()> {
        self.write().fractal_mut().lacunarity =
            check_finite(T::KIND.name(), "lacunarity", lacunarity)?;
        Ok(())
    }
}

// ── Variants ────────────────────────────────────────────────────────

/// Fractional Brownian motion: plain octave sum.
#[derive(Debug, Clone, Default)]
pub struct FractalFBm {
    pub source: SourceSlot,
    pub params: FractalParams,
}

/// Ridged multifractal: sums `1 - 2|n|` per octave.
#[derive(Debug, Clone, Default)]
pub struct FractalRidged {
    pub source: SourceSlot,
    pub params: FractalParams,
}

/// Folds `(n + 1) · ping_pong_strength` with a triangle wave per octave.
#[derive(Debug, Clone)]
pub struct FractalPingPong {
    pub source: SourceSlot,
    pub params: FractalParams,
    pub ping_pong_strength: HybridSource,
}

impl Default for FractalPingPong {
    fn default() -> Self {
        FractalPingPong {
            source: SourceSlot::default(),
            params: FractalParams::default(),
            ping_pong_strength: HybridSource::Constant(2.0),
        }
    }
}

impl Node for FractalFBm {
    const KIND: NodeKind = NodeKind::FractalFBm;

    fn sources(&self) -> SourceList {
        collect_sources(
            [&self.source],
            [&self.params.gain, &self.params.weighted_strength],
        )
    }

    fn lower(&self, cx: &mut Lowering<'_>) -> Result<Op> {
        self.params
            .lower(cx, FractalKind::FBm, &self.source, Param::Const(0.0))
    }
}

impl Node for FractalRidged {
    const KIND: NodeKind = NodeKind::FractalRidged;

    fn sources(&self) -> SourceList {
        collect_sources(
            [&self.source],
            [&self.params.gain, &self.params.weighted_strength],
        )
    }

    fn lower(&self, cx: &mut Lowering<'_>) -> Result<Op> {
        self.params
            .lower(cx, FractalKind::Ridged, &self.source, Param::Const(0.0))
    }
}

impl Node for FractalPingPong {
    const KIND: NodeKind = NodeKind::FractalPingPong;

    fn sources(&self) -> SourceList {
        collect_sources(
            [&self.source],
            [
                &self.params.gain,
                &self.params.weighted_strength,
                &self.ping_pong_strength,
            ],
        )
    }

    fn lower(&self, cx: &mut Lowering<'_>) -> Result<Op> {
        let strength = cx.param(&self.ping_pong_strength)?;
        self.params
            .lower(cx, FractalKind::PingPong, &self.source, strength)
    }
}

macro_rules! impl_fractal {
    ($($ty:ty),*) => {
        $(
            impl HasSource for $ty {
                fn source_slot(&mut self) -> &mut SourceSlot {
                    &mut self.source
                }
            }

            impl Fractal for $ty {
                fn fractal(&self) -> &FractalParams {
                    &self.params
                }

                fn fractal_mut(&mut self) -> &mut FractalParams {
                    &mut self.params
                }
            }
        )*
    };
}

impl_fractal!(FractalFBm, FractalRidged, FractalPingPong);

impl SmartNode<FractalPingPong> {
    pub fn set_ping_pong_strength(&self, strength: impl Into<HybridSource>) -> Result<()> {
        self.bind_hybrid("ping_pong_strength", strength.into(), |n| {
            &mut n.ping_pong_strength
        })
    }
}
