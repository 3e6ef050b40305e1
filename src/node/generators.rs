// node/generators.rs - Primitive coherent-noise generators
//
// These have no inputs: each one samples its lattice at the incoming point
// with the incoming seed and returns a value in [-1, 1].

use crate::error::Result;
use crate::eval::compiled::Op;
use crate::eval::graph::Lowering;
use crate::node::{Node, NodeKind, SourceList};

/// Simplex noise on the skewed simplex lattice.
#[derive(Debug, Clone, Copy, Default)]
pub struct Simplex;

/// Simplex noise sampled in a reoriented domain, which hides the axis-aligned
/// artifacts of the plain lattice.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSimplex2;

/// Gradient noise on the square lattice with quintic fade.
#[derive(Debug, Clone, Copy, Default)]
pub struct Perlin;

/// Hashed lattice values with quintic interpolation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Value;

impl Node for Simplex {
    const KIND: NodeKind = NodeKind::Simplex;

    fn sources(&self) -> SourceList {
        SourceList::new()
    }

    fn lower(&self, _cx: &mut Lowering<'_>) -> Result<Op> {
        Ok(Op::Simplex)
    }
}

impl Node for OpenSimplex2 {
    const KIND: NodeKind = NodeKind::OpenSimplex2;

    fn sources(&self) -> SourceList {
        SourceList::new()
    }

    fn lower(&self, _cx: &mut Lowering<'_>) -> Result<Op> {
        Ok(Op::OpenSimplex2)
    }
}

impl Node for Perlin {
    const KIND: NodeKind = NodeKind::Perlin;

    fn sources(&self) -> SourceList {
        SourceList::new()
    }

    fn lower(&self, _cx: &mut Lowering<'_>) -> Result<Op> {
        Ok(Op::Perlin)
    }
}

impl Node for Value {
    const KIND: NodeKind = NodeKind::Value;

    fn sources(&self) -> SourceList {
        SourceList::new()
    }

    fn lower(&self, _cx: &mut Lowering<'_>) -> Result<Op> {
        Ok(Op::Value)
    }
}
