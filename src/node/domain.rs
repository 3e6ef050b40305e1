// node/domain.rs - Nodes that move the sample point (or the seed) before
// handing it to their source
//
// Points carry 2, 3 or 4 coordinates. Per-axis parameters only touch the
// axes the incoming point actually has.

use crate::error::Result;
use crate::eval::compiled::{yaw_pitch_roll_matrix, Op};
use crate::eval::graph::Lowering;
use crate::node::hybrid::collect_sources;
use crate::node::{
    check_finite, Dim, HasSource, HybridSource, Node, NodeKind, SmartNode, SourceList, SourceSlot,
};

// ── DomainScale ─────────────────────────────────────────────────────

/// Multiplies every coordinate by `scale`.
#[derive(Debug, Clone)]
pub struct DomainScale {
    pub source: SourceSlot,
    pub scale: f32,
}

impl Default for DomainScale {
    fn default() -> Self {
        DomainScale {
            source: SourceSlot::default(),
            scale: 1.0,
        }
    }
}

impl Node for DomainScale {
    const KIND: NodeKind = NodeKind::DomainScale;

    fn sources(&self) -> SourceList {
        collect_sources([&self.source], [])
    }

    fn lower(&self, cx: &mut Lowering<'_>) -> Result<Op> {
        Ok(Op::DomainScale {
            source: cx.source("source", &self.source)?,
            scale: self.scale,
        })
    }
}

impl HasSource for DomainScale {
    fn source_slot(&mut self) -> &mut SourceSlot {
        &mut self.source
    }
}

impl SmartNode<DomainScale> {
    pub fn set_scale(&self, scale: f32) -> Result<()> {
        self.write().scale = check_finite("DomainScale", "scale", scale)?;
        Ok(())
    }
}

// ── DomainOffset ────────────────────────────────────────────────────

/// Adds a per-axis offset; each offset may itself be sampled from a node.
#[derive(Debug, Clone, Default)]
pub struct DomainOffset {
    pub source: SourceSlot,
    pub offset: [HybridSource; 4],
}

impl Node for DomainOffset {
    const KIND: NodeKind = NodeKind::DomainOffset;

    fn sources(&self) -> SourceList {
        collect_sources([&self.source], &self.offset)
    }

    fn lower(&self, cx: &mut Lowering<'_>) -> Result<Op> {
        let source = cx.source("source", &self.source)?;
        let offset = [
            cx.param(&self.offset[0])?,
            cx.param(&self.offset[1])?,
            cx.param(&self.offset[2])?,
            cx.param(&self.offset[3])?,
        ];
        Ok(Op::DomainOffset { source, offset })
    }
}

impl HasSource for DomainOffset {
    fn source_slot(&mut self) -> &mut SourceSlot {
        &mut self.source
    }
}

impl SmartNode<DomainOffset> {
    pub fn set_offset(&self, dim: Dim, offset: impl Into<HybridSource>) -> Result<()> {
        self.bind_hybrid("offset", offset.into(), |n| &mut n.offset[dim.index()])
    }
}

// ── DomainRotate ────────────────────────────────────────────────────

/// Rotates the point by yaw (about Z), pitch (about Y) and roll (about X),
/// all in radians.
///
/// With zero pitch and roll a 2-D point is rotated in its own plane;
/// otherwise it is lifted to 3-D (z = 0) first. W passes through.
#[derive(Debug, Clone, Default)]
pub struct DomainRotate {
    pub source: SourceSlot,
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl Node for DomainRotate {
    const KIND: NodeKind = NodeKind::DomainRotate;

    fn sources(&self) -> SourceList {
        collect_sources([&self.source], [])
    }

    fn lower(&self, cx: &mut Lowering<'_>) -> Result<Op> {
        Ok(Op::DomainRotate {
            source: cx.source("source", &self.source)?,
            matrix: yaw_pitch_roll_matrix(self.yaw as f64, self.pitch as f64, self.roll as f64),
            planar: self.pitch == 0.0 && self.roll == 0.0,
        })
    }
}

impl HasSource for DomainRotate {
    fn source_slot(&mut self) -> &mut SourceSlot {
        &mut self.source
    }
}

impl SmartNode<DomainRotate> {
    pub fn set_yaw(&self, radians: f32) -> Result<()> {
        self.write().yaw = check_finite("DomainRotate", "yaw", radians)?;
        Ok(())
    }

    pub fn set_pitch(&self, radians: f32) -> Result<()> {
        self.write().pitch = check_finite("DomainRotate", "pitch", radians)?;
        Ok(())
    }

    pub fn set_roll(&self, radians: f32) -> Result<()> {
        self.write().roll = check_finite("DomainRotate", "roll", radians)?;
        Ok(())
    }
}

// ── DomainAxisScale ─────────────────────────────────────────────────

/// Multiplies each axis by its own factor.
#[derive(Debug, Clone)]
pub struct DomainAxisScale {
    pub source: SourceSlot,
    pub scale: [f32; 4],
}

impl Default for DomainAxisScale {
    fn default() -> Self {
        DomainAxisScale {
            source: SourceSlot::default(),
            scale: [1.0; 4],
        }
    }
}

impl Node for DomainAxisScale {
    const KIND: NodeKind = NodeKind::DomainAxisScale;

    fn sources(&self) -> SourceList {
        collect_sources([&self.source], [])
    }

    fn lower(&self, cx: &mut Lowering<'_>) -> Result<Op> {
        Ok(Op::DomainAxisScale {
            source: cx.source("source", &self.source)?,
            scale: self.scale,
        })
    }
}

impl HasSource for DomainAxisScale {
    fn source_slot(&mut self) -> &mut SourceSlot {
        &mut self.source
    }
}

impl SmartNode<DomainAxisScale> {
    pub fn set_scale(&self, dim: Dim, scale: f32) -> Result<()> {
        self.write().scale[dim.index()] = check_finite("DomainAxisScale", "scale", scale)?;
        Ok(())
    }
}

// ── AddDimension ────────────────────────────────────────────────────

/// Appends one axis to the point (2-D → 3-D, 3-D → 4-D) at
/// `new_dimension_position`. 4-D points pass through unchanged.
#[derive(Debug, Clone, Default)]
pub struct AddDimension {
    pub source: SourceSlot,
    pub new_dimension_position: HybridSource,
}

impl Node for AddDimension {
    const KIND: NodeKind = NodeKind::AddDimension;

    fn sources(&self) -> SourceList {
        collect_sources([&self.source], [&self.new_dimension_position])
    }

    fn lower(&self, cx: &mut Lowering<'_>) -> Result<Op> {
        Ok(Op::AddDimension {
            source: cx.source("source", &self.source)?,
            position: cx.param(&self.new_dimension_position)?,
        })
    }
}

impl HasSource for AddDimension {
    fn source_slot(&mut self) -> &mut SourceSlot {
        &mut self.source
    }
}

impl SmartNode<AddDimension> {
    /// Constant coordinate, or a node sampled at the incoming point.
    pub fn set_new_dimension_position(&self, position: impl Into<HybridSource>) -> Result<()> {
        self.bind_hybrid("new_dimension_position", position.into(), |n| {
            &mut n.new_dimension_position
        })
    }
}

// ── RemoveDimension ─────────────────────────────────────────────────

/// Drops one axis (3-D → 2-D, 4-D → 3-D); 2-D points pass through.
/// `Dim::W` always names the outermost axis of the incoming point.
#[derive(Debug, Clone)]
pub struct RemoveDimension {
    pub source: SourceSlot,
    pub remove_dimension: Dim,
}

impl Default for RemoveDimension {
    fn default() -> Self {
        RemoveDimension {
            source: SourceSlot::default(),
            remove_dimension: Dim::Y,
        }
    }
}

impl Node for RemoveDimension {
    const KIND: NodeKind = NodeKind::RemoveDimension;

    fn sources(&self) -> SourceList {
        collect_sources([&self.source], [])
    }

    fn lower(&self, cx: &mut Lowering<'_>) -> Result<Op> {
        Ok(Op::RemoveDimension {
            source: cx.source("source", &self.source)?,
            axis: self.remove_dimension,
        })
    }
}

impl HasSource for RemoveDimension {
    fn source_slot(&mut self) -> &mut SourceSlot {
        &mut self.source
    }
}

impl SmartNode<RemoveDimension> {
    pub fn set_remove_dimension(&self, dim: Dim) {
        self.write().remove_dimension = dim;
    }
}

// ── SeedOffset ──────────────────────────────────────────────────────

/// Adds `offset` to the seed seen by the whole subgraph below it.
#[derive(Debug, Clone)]
pub struct SeedOffset {
    pub source: SourceSlot,
    pub offset: i32,
}

impl Default for SeedOffset {
    fn default() -> Self {
        SeedOffset {
            source: SourceSlot::default(),
            offset: 1,
        }
    }
}

impl Node for SeedOffset {
    const KIND: NodeKind = NodeKind::SeedOffset;

    fn sources(&self) -> SourceList {
        collect_sources([&self.source], [])
    }

    fn lower(&self, cx: &mut Lowering<'_>) -> Result<Op> {
        Ok(Op::SeedOffset {
            source: cx.source("source", &self.source)?,
            offset: self.offset,
        })
    }
}

impl HasSource for SeedOffset {
    fn source_slot(&mut self) -> &mut SourceSlot {
        &mut self.source
    }
}

impl SmartNode<SeedOffset> {
    pub fn set_offset(&self, offset: i32) {
        self.write().offset = offset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NoiseError;
    use crate::eval::compiled::Param;
    use crate::eval::graph::EvalGraph;
    use crate::node::{Perlin, Simplex};

    fn root_op(gen: &crate::node::Generator) -> Op {
        let graph = EvalGraph::compile(gen).unwrap();
        graph.op(graph.root()).clone()
    }

    #[test]
    fn defaults() {
        assert_eq!(DomainScale::new().read().scale, 1.0);
        assert_eq!(DomainAxisScale::new().read().scale, [1.0; 4]);
        assert_eq!(SeedOffset::new().read().offset, 1);
        assert_eq!(RemoveDimension::new().read().remove_dimension, Dim::Y);
        let offset = DomainOffset::new();
        for dim in Dim::ALL {
            assert_eq!(offset.read().offset[dim.index()].constant(), Some(0.0));
        }
        let rotate = DomainRotate::new();
        assert_eq!((rotate.read().yaw, rotate.read().pitch, rotate.read().roll), (0.0, 0.0, 0.0));
    }

    #[test]
    fn offset_mixes_constants_and_sources() {
        let offset = DomainOffset::new();
        let perlin = Perlin::new();
        offset.set_source(&Simplex::new()).unwrap();
        offset.set_offset(Dim::X, 3.5).unwrap();
        offset.set_offset(Dim::W, &perlin).unwrap();

        match root_op(&offset) {
            Op::DomainOffset { offset, .. } => {
                assert_eq!(offset[0], Param::Const(3.5));
                assert_eq!(offset[1], Param::Const(0.0));
                assert!(matches!(offset[3], Param::Source(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn last_write_wins() {
        let offset = DomainOffset::new();
        offset.set_offset(Dim::Y, &Perlin::new()).unwrap();
        offset.set_offset(Dim::Y, 2.0).unwrap();
        assert_eq!(offset.read().offset[1].constant(), Some(2.0));
        assert!(offset.generator().sources().is_empty());
    }

    #[test]
    fn axis_scale_per_dim() {
        let scale = DomainAxisScale::new();
        scale.set_scale(Dim::Z, 4.0).unwrap();
        assert_eq!(scale.read().scale, [1.0, 1.0, 4.0, 1.0]);
    }

    #[test]
    fn rotate_planar_flag() {
        let rotate = DomainRotate::new();
        rotate.set_source(&Simplex::new()).unwrap();
        rotate.set_yaw(0.5).unwrap();
        assert!(matches!(root_op(&rotate), Op::DomainRotate { planar: true, .. }));
        rotate.set_roll(0.25).unwrap();
        assert!(matches!(root_op(&rotate), Op::DomainRotate { planar: false, .. }));
    }

    #[test]
    fn non_finite_rejected() {
        let scale = DomainScale::new();
        assert!(matches!(
            scale.set_scale(f32::INFINITY),
            Err(NoiseError::InvalidParameter { param: "scale", .. })
        ));
        assert_eq!(scale.read().scale, 1.0);
        assert!(DomainRotate::new().set_pitch(f32::NAN).is_err());
    }

    #[test]
    fn add_dimension_position_from_node() {
        let add = AddDimension::new();
        add.set_source(&Simplex::new()).unwrap();
        add.set_new_dimension_position(&Perlin::new()).unwrap();
        match root_op(&add) {
            Op::AddDimension { position, .. } => assert!(matches!(position, Param::Source(_))),
            other => panic!("unexpected {other:?}"),
        }
    }
}
