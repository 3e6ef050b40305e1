// node/hybrid.rs - Axis keys, source slots and scalar-or-source parameters

use crate::error::NoiseError;
use crate::node::{Generator, Node, SmartNode, SourceList};
use serde::{Deserialize, Serialize};

/// Spatial axis selector for dimension-indexed parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dim {
    X,
    Y,
    Z,
    W,
}

impl Dim {
    pub const ALL: [Dim; 4] = [Dim::X, Dim::Y, Dim::Z, Dim::W];

    /// Position of this axis in a point (`X = 0` .. `W = 3`).
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<i32> for Dim {
    type Error = NoiseError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Dim::X),
            1 => Ok(Dim::Y),
            2 => Ok(Dim::Z),
            3 => Ok(Dim::W),
            other => Err(NoiseError::invalid(
                "Dim",
                "dim",
                format!("{other} is not one of X=0, Y=1, Z=2, W=3"),
            )),
        }
    }
}

// ── SourceSlot ──────────────────────────────────────────────────────

/// Optional reference to the node feeding an input.
#[derive(Debug, Clone, Default)]
pub struct SourceSlot(Option<Generator>);

impl SourceSlot {
    pub fn get(&self) -> Option<&Generator> {
        self.0.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.0.is_some()
    }

    pub(crate) fn set(&mut self, source: Generator) {
        self.0 = Some(source);
    }

    #[cfg(test)]
    pub(crate) fn clear(&mut self) {
        self.0 = None;
    }
}

// ── HybridSource ────────────────────────────────────────────────────

/// A parameter that is either a constant or sampled from another node at
/// the same point.
#[derive(Debug, Clone)]
pub enum HybridSource {
    Constant(f32),
    Source(Generator),
}

impl HybridSource {
    pub fn constant(&self) -> Option<f32> {
        match self {
            HybridSource::Constant(v) => Some(*v),
            HybridSource::Source(_) => None,
        }
    }

    pub fn source(&self) -> Option<&Generator> {
        match self {
            HybridSource::Constant(_) => None,
            HybridSource::Source(gen) => Some(gen),
        }
    }
}

impl Default for HybridSource {
    fn default() -> Self {
        HybridSource::Constant(0.0)
    }
}

impl From<f32> for HybridSource {
    fn from(v: f32) -> Self {
        HybridSource::Constant(v)
    }
}

impl From<Generator> for HybridSource {
    fn from(gen: Generator) -> Self {
        HybridSource::Source(gen)
    }
}

impl From<&Generator> for HybridSource {
    fn from(gen: &Generator) -> Self {
        HybridSource::Source(gen.clone())
    }
}

impl<T: Node> From<&SmartNode<T>> for HybridSource {
    fn from(node: &SmartNode<T>) -> Self {
        HybridSource::Source(node.generator())
    }
}

/// Collect the bound generators out of slots and hybrid parameters.
pub(crate) fn collect_sources<'a>(
    slots: impl IntoIterator<Item = &'a SourceSlot>,
    hybrids: impl IntoIterator<Item = &'a HybridSource>,
) -> SourceList {
    slots
        .into_iter()
        .filter_map(SourceSlot::get)
        .chain(hybrids.into_iter().filter_map(HybridSource::source))
        .cloned()
        .collect()
}
