// node/modifiers.rs - Nodes that transform their source's value

use crate::error::{NoiseError, Result};
use crate::eval::compiled::Op;
use crate::eval::graph::Lowering;
use crate::node::hybrid::collect_sources;
use crate::node::{check_finite, HasSource, Node, NodeKind, SmartNode, SourceList, SourceSlot};

// ── Remap ───────────────────────────────────────────────────────────

/// Linear map from `[from_min, from_max]` onto `[to_min, to_max]`.
#[derive(Debug, Clone)]
pub struct Remap {
    pub source: SourceSlot,
    pub from_min: f32,
    pub from_max: f32,
    pub to_min: f32,
    pub to_max: f32,
}

impl Default for Remap {
    fn default() -> Self {
        Remap {
            source: SourceSlot::default(),
            from_min: -1.0,
            from_max: 1.0,
            to_min: 0.0,
            to_max: 1.0,
        }
    }
}

impl Node for Remap {
    const KIND: NodeKind = NodeKind::Remap;

    fn sources(&self) -> SourceList {
        collect_sources([&self.source], [])
    }

    fn lower(&self, cx: &mut Lowering<'_>) -> Result<Op> {
        let source = cx.source("source", &self.source)?;
        let span = self.from_max - self.from_min;
        if span == 0.0 {
            return Err(cx.invalid("from_max", "source range is empty"));
        }
        Ok(Op::Remap {
            source,
            from_min: self.from_min,
            scale: (self.to_max - self.to_min) / span,
            to_min: self.to_min,
        })
    }
}

impl HasSource for Remap {
    fn source_slot(&mut self) -> &mut SourceSlot {
        &mut self.source
    }
}

impl SmartNode<Remap> {
    /// Set all four bounds at once. An empty source range is rejected.
    pub fn set_remap(&self, from_min: f32, from_max: f32, to_min: f32, to_max: f32) -> Result<()> {
        for (param, v) in [
            ("from_min", from_min),
            ("from_max", from_max),
            ("to_min", to_min),
            ("to_max", to_max),
        ] {
            check_finite("Remap", param, v)?;
        }
        if from_min == from_max {
            return Err(NoiseError::invalid(
                "Remap",
                "from_max",
                format!("source range [{from_min}, {from_max}] is empty"),
            ));
        }
        let mut node = self.write();
        node.from_min = from_min;
        node.from_max = from_max;
        node.to_min = to_min;
        node.to_max = to_max;
        Ok(())
    }
}

// ── Terrace ─────────────────────────────────────────────────────────

/// Quantises the value into `multiplier` steps per unit.
///
/// `smoothness <= 0` gives a hard staircase (round to the nearest step);
/// larger values blend each riser with a smoothstep of that width
/// (capped at one full step).
#[derive(Debug, Clone)]
pub struct Terrace {
    pub source: SourceSlot,
    pub multiplier: f32,
    pub smoothness: f32,
}

impl Default for Terrace {
    fn default() -> Self {
        Terrace {
            source: SourceSlot::default(),
            multiplier: 1.0,
            smoothness: 0.0,
        }
    }
}

impl Node for Terrace {
    const KIND: NodeKind = NodeKind::Terrace;

    fn sources(&self) -> SourceList {
        collect_sources([&self.source], [])
    }

    fn lower(&self, cx: &mut Lowering<'_>) -> Result<Op> {
        let source = cx.source("source", &self.source)?;
        if self.multiplier <= 0.0 {
            return Err(cx.invalid("multiplier", "must be positive"));
        }
        Ok(Op::Terrace {
            source,
            multiplier: self.multiplier,
            smoothness: self.smoothness,
        })
    }
}

impl HasSource for Terrace {
    fn source_slot(&mut self) -> &mut SourceSlot {
        &mut self.source
    }
}

impl SmartNode<Terrace> {
    pub fn set_multiplier(&self, multiplier: f32) -> Result<()> {
        let multiplier = check_finite("Terrace", "multiplier", multiplier)?;
        if multiplier <= 0.0 {
            return Err(NoiseError::invalid(
                "Terrace",
                "multiplier",
                format!("{multiplier} is not positive"),
            ));
        }
        self.write().multiplier = multiplier;
        Ok(())
    }

    pub fn set_smoothness(&self, smoothness: f32) -> Result<()> {
        self.write().smoothness = check_finite("Terrace", "smoothness", smoothness)?;
        Ok(())
    }
}

// ── ConvertRGBA8 ────────────────────────────────────────────────────

/// Clamps to `[min, max]`, quantises to a grey byte and packs it as an
/// opaque RGBA8 pixel in the output float's bit pattern.
///
/// The packed words are frequently NaN when read as floats; decode them
/// with [`unpack_rgba8`].
#[derive(Debug, Clone)]
pub struct ConvertRgba8 {
    pub source: SourceSlot,
    pub min: f32,
    pub max: f32,
}

impl Default for ConvertRgba8 {
    fn default() -> Self {
        ConvertRgba8 {
            source: SourceSlot::default(),
            min: -1.0,
            max: 1.0,
        }
    }
}

impl Node for ConvertRgba8 {
    const KIND: NodeKind = NodeKind::ConvertRgba8;

    fn sources(&self) -> SourceList {
        collect_sources([&self.source], [])
    }

    fn lower(&self, cx: &mut Lowering<'_>) -> Result<Op> {
        let source = cx.source("source", &self.source)?;
        if self.min >= self.max {
            return Err(cx.invalid("max", "must exceed min"));
        }
        Ok(Op::ConvertRgba8 {
            source,
            min: self.min,
            max: self.max,
        })
    }
}

impl HasSource for ConvertRgba8 {
    fn source_slot(&mut self) -> &mut SourceSlot {
        &mut self.source
    }
}

impl SmartNode<ConvertRgba8> {
    pub fn set_min_max(&self, min: f32, max: f32) -> Result<()> {
        check_finite("ConvertRGBA8", "min", min)?;
        check_finite("ConvertRGBA8", "max", max)?;
        if min >= max {
            return Err(NoiseError::invalid(
                "ConvertRGBA8",
                "max",
                format!("range [{min}, {max}] is empty"),
            ));
        }
        let mut node = self.write();
        node.min = min;
        node.max = max;
        Ok(())
    }
}

/// Grey byte for `value` within `[min, max]`.
#[inline]
pub(crate) fn rgba8_grey(value: f32, min: f32, max: f32) -> u8 {
    let t = ((value - min) / (max - min)).clamp(0.0, 1.0);
    // NaN saturates to 0
    (t * 255.0).round() as u8
}

/// Pack a grey level as `R = G = B = grey, A = 255` (little-endian RGBA).
#[inline]
pub fn pack_rgba8(grey: u8) -> f32 {
    let g = grey as u32;
    f32::from_bits(0xFF00_0000 | g << 16 | g << 8 | g)
}

/// Bytes `[r, g, b, a]` of a packed RGBA8 sample.
#[inline]
pub fn unpack_rgba8(packed: f32) -> [u8; 4] {
    packed.to_bits().to_le_bytes()
}

// ── GeneratorCache ──────────────────────────────────────────────────

/// Memoises its source per (point, seed) for the duration of one grid call.
/// Output is identical to the uncached source.
#[derive(Debug, Clone, Default)]
pub struct GeneratorCache {
    pub source: SourceSlot,
}

impl Node for GeneratorCache {
    const KIND: NodeKind = NodeKind::GeneratorCache;

    fn sources(&self) -> SourceList {
        collect_sources([&self.source], [])
    }

    fn lower(&self, cx: &mut Lowering<'_>) -> Result<Op> {
        Ok(Op::Cache {
            source: cx.source("source", &self.source)?,
        })
    }
}

impl HasSource for GeneratorCache {
    fn source_slot(&mut self) -> &mut SourceSlot {
        &mut self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::graph::EvalGraph;
    use crate::node::Perlin;

    #[test]
    fn remap_defaults_and_compiled_scale() {
        let remap = Remap::new();
        remap.set_source(&Perlin::new()).unwrap();
        let graph = EvalGraph::compile(&remap).unwrap();
        assert_eq!(
            graph.op(graph.root()),
            &Op::Remap {
                source: 0,
                from_min: -1.0,
                scale: 0.5,
                to_min: 0.0
            }
        );
    }

    #[test]
    fn remap_rejects_empty_range() {
        let remap = Remap::new();
        let err = remap.set_remap(0.5, 0.5, 0.0, 1.0).unwrap_err();
        assert!(matches!(err, NoiseError::InvalidParameter { node: "Remap", .. }));
        // previous bounds kept
        assert_eq!(remap.read().from_min, -1.0);
    }

    #[test]
    fn remap_allows_inverted_ranges() {
        let remap = Remap::new();
        remap.set_remap(1.0, -1.0, 10.0, 0.0).unwrap();
        assert_eq!(remap.read().from_max, -1.0);
    }

    #[test]
    fn terrace_multiplier_must_be_positive() {
        let terrace = Terrace::new();
        assert!(terrace.set_multiplier(0.0).is_err());
        assert!(terrace.set_multiplier(-3.0).is_err());
        terrace.set_multiplier(4.0).unwrap();
        assert_eq!(terrace.read().multiplier, 4.0);
    }

    #[test]
    fn convert_rgba8_range_checked() {
        let rgba = ConvertRgba8::new();
        assert!(rgba.set_min_max(1.0, 1.0).is_err());
        assert!(rgba.set_min_max(2.0, 1.0).is_err());
        rgba.set_min_max(0.0, 2.0).unwrap();
        assert_eq!((rgba.read().min, rgba.read().max), (0.0, 2.0));
    }

    #[test]
    fn grey_quantisation() {
        assert_eq!(rgba8_grey(-1.0, -1.0, 1.0), 0);
        assert_eq!(rgba8_grey(1.0, -1.0, 1.0), 255);
        assert_eq!(rgba8_grey(0.0, -1.0, 1.0), 128);
        assert_eq!(rgba8_grey(5.0, -1.0, 1.0), 255);
        assert_eq!(rgba8_grey(-5.0, -1.0, 1.0), 0);
        assert_eq!(rgba8_grey(f32::NAN, -1.0, 1.0), 0);
    }

    #[test]
    fn pack_layout() {
        for grey in [0u8, 1, 127, 128, 200, 255] {
            assert_eq!(unpack_rgba8(pack_rgba8(grey)), [grey, grey, grey, 255]);
        }
        assert_eq!(pack_rgba8(0x12).to_bits(), 0xFF12_1212);
    }
}
