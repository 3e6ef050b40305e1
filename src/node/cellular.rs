// node/cellular.rs - Cellular (Worley) family
//
// Every lattice cell holds one feature point, jittered away from the cell
// centre by up to `jitter_modifier / 2` per axis. A sample looks at the 3ⁿ
// cells around it and keeps the four nearest feature points.

use crate::error::{NoiseError, Result};
use crate::eval::compiled::{CellularOp, Op};
use crate::eval::graph::Lowering;
use crate::node::hybrid::collect_sources;
use crate::node::{
    check_finite, HybridSource, Node, NodeKind, SmartNode, SourceList, SourceSlot,
};
use serde::{Deserialize, Serialize};

/// Highest nearest-point index a cellular node can address.
pub const MAX_DISTANCE_INDEX: i32 = 3;

/// Metric used to rank feature points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DistanceFunction {
    #[default]
    Euclidean,
    EuclideanSquared,
    Manhattan,
    /// Manhattan plus squared Euclidean.
    Hybrid,
    /// Chebyshev: largest axis delta.
    MaxAxis,
}

impl DistanceFunction {
    /// Distance for a per-axis delta vector.
    #[inline]
    pub fn apply(self, delta: &[f64]) -> f64 {
        match self {
            DistanceFunction::Euclidean => delta.iter().map(|d| d * d).sum::<f64>().sqrt(),
            DistanceFunction::EuclideanSquared => delta.iter().map(|d| d * d).sum(),
            DistanceFunction::Manhattan => delta.iter().map(|d| d.abs()).sum(),
            DistanceFunction::Hybrid => delta.iter().map(|d| d.abs() + d * d).sum(),
            DistanceFunction::MaxAxis => delta.iter().fold(0.0, |m, d| m.max(d.abs())),
        }
    }
}

/// How `CellularDistance` combines its two selected distances `d0`, `d1`.
/// Results are shifted down by one so typical values straddle zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellularReturnType {
    /// `d0 - 1`
    #[default]
    Index0,
    /// `(d0 + d1) / 2 - 1`
    Index0Add1,
    /// `d1 - d0 - 1`
    Index0Sub1,
    /// `d0 · d1 / 2 - 1`
    Index0Mul1,
    /// `d0 / d1 - 1`, `+∞` when `d1 == 0`
    Index0Div1,
}

impl CellularReturnType {
    #[inline]
    pub fn combine(self, d0: f64, d1: f64) -> f64 {
        match self {
            CellularReturnType::Index0 => d0 - 1.0,
            CellularReturnType::Index0Add1 => (d0 + d1) * 0.5 - 1.0,
            CellularReturnType::Index0Sub1 => d1 - d0 - 1.0,
            CellularReturnType::Index0Mul1 => d0 * d1 * 0.5 - 1.0,
            CellularReturnType::Index0Div1 => {
                if d1 == 0.0 {
                    f64::INFINITY
                } else {
                    d0 / d1 - 1.0
                }
            }
        }
    }
}

/// Settings shared by every cellular node.
#[derive(Debug, Clone)]
pub struct CellularParams {
    pub jitter_modifier: HybridSource,
    pub distance_function: DistanceFunction,
}

impl Default for CellularParams {
    fn default() -> Self {
        CellularParams {
            jitter_modifier: HybridSource::Constant(1.0),
            distance_function: DistanceFunction::Euclidean,
        }
    }
}

impl CellularParams {
    fn lower(&self, cx: &mut Lowering<'_>) -> Result<CellularOp> {
        Ok(CellularOp {
            jitter: cx.param(&self.jitter_modifier)?,
            distance: self.distance_function,
        })
    }
}

/// Marker for cellular nodes; unlocks the shared cellular setters.
pub trait Cellular: Node {
    fn cellular(&self) -> &CellularParams;
    fn cellular_mut(&mut self) -> &mut CellularParams;
}

impl<T: Cellular> SmartNode<T> {
    pub fn set_jitter_modifier(&self, jitter: impl Into<HybridSource>) -> Result<()> {
        self.bind_hybrid("jitter_modifier", jitter.into(), |n| {
            &mut n.cellular_mut().jitter_modifier
        })
    }

    pub fn set_distance_function(&self, function: DistanceFunction) {
        self.write().cellular_mut().distance_function = function;
    }
}

fn check_index(node: &'static str, param: &'static str, index: i32) -> Result<usize> {
    if (0..=MAX_DISTANCE_INDEX).contains(&index) {
        Ok(index as usize)
    } else {
        Err(NoiseError::invalid(
            node,
            param,
            format!("{index} is outside 0..={MAX_DISTANCE_INDEX}"),
        ))
    }
}

// ── CellularValue ───────────────────────────────────────────────────

/// Random per-cell value of the `value_index`-th nearest feature point.
#[derive(Debug, Clone, Default)]
pub struct CellularValue {
    pub params: CellularParams,
    pub value_index: usize,
}

impl Node for CellularValue {
    const KIND: NodeKind = NodeKind::CellularValue;

    fn sources(&self) -> SourceList {
        collect_sources([], [&self.params.jitter_modifier])
    }

    fn lower(&self, cx: &mut Lowering<'_>) -> Result<Op> {
        Ok(Op::CellularValue {
            cell: self.params.lower(cx)?,
            index: self.value_index,
        })
    }
}

impl SmartNode<CellularValue> {
    pub fn set_value_index(&self, index: i32) -> Result<()> {
        self.write().value_index = check_index("CellularValue", "value_index", index)?;
        Ok(())
    }
}

// ── CellularDistance ────────────────────────────────────────────────

/// Combination of the distances to two of the nearest feature points.
///
/// `distance_index0 < distance_index1` is checked when the graph is
/// compiled, so the two indices can be set one at a time.
#[derive(Debug, Clone)]
pub struct CellularDistance {
    pub params: CellularParams,
    pub distance_index0: usize,
    pub distance_index1: usize,
    pub return_type: CellularReturnType,
}

impl Default for CellularDistance {
    fn default() -> Self {
        CellularDistance {
            params: CellularParams::default(),
            distance_index0: 0,
            distance_index1: 1,
            return_type: CellularReturnType::Index0,
        }
    }
}

impl Node for CellularDistance {
    const KIND: NodeKind = NodeKind::CellularDistance;

    fn sources(&self) -> SourceList {
        collect_sources([], [&self.params.jitter_modifier])
    }

    fn lower(&self, cx: &mut Lowering<'_>) -> Result<Op> {
        if self.distance_index0 >= self.distance_index1 {
            return Err(cx.invalid(
                "distance_index1",
                format!(
                    "must exceed distance_index0 ({} >= {})",
                    self.distance_index0, self.distance_index1
                ),
            ));
        }
        Ok(Op::CellularDistance {
            cell: self.params.lower(cx)?,
            index0: self.distance_index0,
            index1: self.distance_index1,
            return_type: self.return_type,
        })
    }
}

impl SmartNode<CellularDistance> {
    pub fn set_distance_index0(&self, index: i32) -> Result<()> {
        self.write().distance_index0 =
            check_index("CellularDistance", "distance_index0", index)?;
        Ok(())
    }

    pub fn set_distance_index1(&self, index: i32) -> Result<()> {
        self.write().distance_index1 =
            check_index("CellularDistance", "distance_index1", index)?;
        Ok(())
    }

    /// Set both indices, rejecting `index0 >= index1` immediately.
    pub fn set_distance_indices(&self, index0: i32, index1: i32) -> Result<()> {
        let i0 = check_index("CellularDistance", "distance_index0", index0)?;
        let i1 = check_index("CellularDistance", "distance_index1", index1)?;
        if i0 >= i1 {
            return Err(NoiseError::invalid(
                "CellularDistance",
                "distance_index1",
                format!("must exceed distance_index0 ({i0} >= {i1})"),
            ));
        }
        let mut node = self.write();
        node.distance_index0 = i0;
        node.distance_index1 = i1;
        Ok(())
    }

    pub fn set_return_type(&self, return_type: CellularReturnType) {
        self.write().return_type = return_type;
    }
}

// ── CellularLookup ──────────────────────────────────────────────────

/// Samples `lookup` at the nearest feature point scaled by
/// `lookup_frequency`, giving flat-shaded cells.
#[derive(Debug, Clone)]
pub struct CellularLookup {
    pub params: CellularParams,
    pub lookup: SourceSlot,
    pub lookup_frequency: f32,
}

impl Default for CellularLookup {
    fn default() -> Self {
        CellularLookup {
            params: CellularParams::default(),
            lookup: SourceSlot::default(),
            lookup_frequency: 0.1,
        }
    }
}

impl Node for CellularLookup {
    const KIND: NodeKind = NodeKind::CellularLookup;

    fn sources(&self) -> SourceList {
        collect_sources([&self.lookup], [&self.params.jitter_modifier])
    }

    fn lower(&self, cx: &mut Lowering<'_>) -> Result<Op> {
        let lookup = cx.source("lookup", &self.lookup)?;
        Ok(Op::CellularLookup {
            cell: self.params.lower(cx)?,
            lookup,
            frequency: self.lookup_frequency,
        })
    }
}

impl SmartNode<CellularLookup> {
    pub fn set_lookup(&self, lookup: &crate::node::Generator) -> Result<()> {
        self.bind(lookup, |n| &mut n.lookup)
    }

    pub fn set_lookup_frequency(&self, frequency: f32) -> Result<()> {
        self.write().lookup_frequency =
            check_finite("CellularLookup", "lookup_frequency", frequency)?;
        Ok(())
    }
}

macro_rules! impl_cellular {
    ($($ty:ty),*) => {
        $(
            impl Cellular for $ty {
                fn cellular(&self) -> &CellularParams {
                    &self.params
                }

                fn cellular_mut(&mut self) -> &mut CellularParams {
                    &mut self.params
                }
            }
        )*
    };
}

impl_cellular!(CellularValue, CellularDistance, CellularLookup);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Perlin;

    #[test]
    fn defaults() {
        let value = CellularValue::new();
        assert_eq!(value.read().value_index, 0);
        assert_eq!(value.read().cellular().jitter_modifier.constant(), Some(1.0));
        assert_eq!(
            value.read().cellular().distance_function,
            DistanceFunction::Euclidean
        );
        let distance = CellularDistance::new();
        assert_eq!(distance.read().distance_index0, 0);
        assert_eq!(distance.read().distance_index1, 1);
        assert_eq!(distance.read().return_type, CellularReturnType::Index0);
        assert_eq!(CellularLookup::new().read().lookup_frequency, 0.1);
    }

    #[test]
    fn index_range_checked() {
        let value = CellularValue::new();
        assert!(value.set_value_index(4).is_err());
        assert!(value.set_value_index(-1).is_err());
        value.set_value_index(3).unwrap();
        assert_eq!(value.read().value_index, 3);
    }

    #[test]
    fn combined_indices_checked_immediately() {
        let distance = CellularDistance::new();
        assert!(matches!(
            distance.set_distance_indices(1, 1),
            Err(NoiseError::InvalidParameter { param: "distance_index1", .. })
        ));
        assert!(distance.set_distance_indices(2, 1).is_err());
        distance.set_distance_indices(1, 3).unwrap();
        assert_eq!(distance.read().distance_index0, 1);
        assert_eq!(distance.read().distance_index1, 3);
    }

    #[test]
    fn distance_metrics() {
        let delta = [3.0, -4.0];
        assert_eq!(DistanceFunction::Euclidean.apply(&delta), 5.0);
        assert_eq!(DistanceFunction::EuclideanSquared.apply(&delta), 25.0);
        assert_eq!(DistanceFunction::Manhattan.apply(&delta), 7.0);
        assert_eq!(DistanceFunction::Hybrid.apply(&delta), 32.0);
        assert_eq!(DistanceFunction::MaxAxis.apply(&delta), 4.0);
    }

    #[test]
    fn return_type_combinations() {
        assert_eq!(CellularReturnType::Index0.combine(0.5, 1.0), -0.5);
        assert_eq!(CellularReturnType::Index0Add1.combine(0.5, 1.5), 0.0);
        assert_eq!(CellularReturnType::Index0Sub1.combine(0.5, 1.5), 0.0);
        assert_eq!(CellularReturnType::Index0Mul1.combine(1.0, 2.0), 0.0);
        assert_eq!(CellularReturnType::Index0Div1.combine(1.0, 2.0), -0.5);
    }

    #[test]
    fn divide_by_zero_distance_is_positive_infinity() {
        let v = CellularReturnType::Index0Div1.combine(0.0, 0.0);
        assert_eq!(v, f64::INFINITY);
    }

    #[test]
    fn lookup_binding_checks_cycles() {
        let lookup = CellularLookup::new();
        let perlin = Perlin::new();
        lookup.set_lookup(&perlin).unwrap();
        assert!(lookup.read().lookup.is_bound());
        assert!(lookup.set_lookup(&lookup).is_err());
    }

    #[test]
    fn jitter_from_node() {
        let value = CellularValue::new();
        value.set_jitter_modifier(&Perlin::new()).unwrap();
        assert_eq!(value.generator().sources().len(), 1);
        value.set_distance_function(DistanceFunction::Manhattan);
        assert_eq!(
            value.read().cellular().distance_function,
            DistanceFunction::Manhattan
        );
    }
}
