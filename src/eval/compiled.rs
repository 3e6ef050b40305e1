// eval/compiled.rs - Flat, index-addressed ops produced by the pre-walk
//
// At compile time every reachable node is lowered into one `Op`. Sources
// are resolved into u32 indices into the graph's op list, and every
// parameter is either baked in as a constant or points at the op that
// produces it. Nothing in the evaluation hot path touches locks, handles
// or trait objects.

use crate::node::{CellularReturnType, Dim, DistanceFunction};
use smallvec::SmallVec;

// ── Parameters ──────────────────────────────────────────────────────

/// A compiled scalar-or-source parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Param {
    Const(f32),
    /// Sampled from the op at this index, at the same point and seed.
    Source(u32),
}

impl Param {
    #[inline]
    pub fn source(self) -> Option<u32> {
        match self {
            Param::Const(_) => None,
            Param::Source(idx) => Some(idx),
        }
    }
}

// ── Rotation ────────────────────────────────────────────────────────

/// Row-major 3×3 matrix.
pub type Mat3 = [f64; 9];

pub const IDENTITY_MAT3: Mat3 = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

pub fn mat3_multiply(a: &Mat3, b: &Mat3) -> Mat3 {
    [
        a[0] * b[0] + a[1] * b[3] + a[2] * b[6],
        a[0] * b[1] + a[1] * b[4] + a[2] * b[7],
        a[0] * b[2] + a[1] * b[5] + a[2] * b[8],
        a[3] * b[0] + a[4] * b[3] + a[5] * b[6],
        a[3] * b[1] + a[4] * b[4] + a[5] * b[7],
        a[3] * b[2] + a[4] * b[5] + a[5] * b[8],
        a[6] * b[0] + a[7] * b[3] + a[8] * b[6],
        a[6] * b[1] + a[7] * b[4] + a[8] * b[7],
        a[6] * b[2] + a[7] * b[5] + a[8] * b[8],
    ]
}

#[inline]
pub fn mat3_apply(m: &Mat3, x: f64, y: f64, z: f64) -> (f64, f64, f64) {
    (
        m[0] * x + m[1] * y + m[2] * z,
        m[3] * x + m[4] * y + m[5] * z,
        m[6] * x + m[7] * y + m[8] * z,
    )
}

/// Intrinsic X-then-Y-then-Z rotation: `Rx(roll) · Ry(pitch) · Rz(yaw)`.
pub fn yaw_pitch_roll_matrix(yaw: f64, pitch: f64, roll: f64) -> Mat3 {
    let (sy, cy) = yaw.sin_cos();
    let (sp, cp) = pitch.sin_cos();
    let (sr, cr) = roll.sin_cos();
    let rz = [cy, -sy, 0.0, sy, cy, 0.0, 0.0, 0.0, 1.0];
    let ry = [cp, 0.0, sp, 0.0, 1.0, 0.0, -sp, 0.0, cp];
    let rx = [1.0, 0.0, 0.0, 0.0, cr, -sr, 0.0, sr, cr];
    mat3_multiply(&rx, &mat3_multiply(&ry, &rz))
}

// ── Ops ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FractalKind {
    FBm,
    Ridged,
    PingPong,
}

/// Compiled fractal: octave loop over `source`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FractalOp {
    pub kind: FractalKind,
    pub source: u32,
    pub gain: Param,
    pub weighted_strength: Param,
    /// Only read by `FractalKind::PingPong`.
    pub ping_pong_strength: Param,
    pub octaves: u32,
    pub lacunarity: f32,
    /// `1 / Σ gainⁱ`, the initial octave amplitude.
    pub bounding: f32,
}

/// Settings shared by the cellular ops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellularOp {
    pub jitter: Param,
    pub distance: DistanceFunction,
}

/// One lowered node.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Simplex,
    OpenSimplex2,
    Perlin,
    Value,
    DomainScale {
        source: u32,
        scale: f32,
    },
    DomainOffset {
        source: u32,
        offset: [Param; 4],
    },
    DomainRotate {
        source: u32,
        matrix: Mat3,
        /// Pitch and roll are zero: 2-D points stay 2-D.
        planar: bool,
    },
    DomainAxisScale {
        source: u32,
        scale: [f32; 4],
    },
    AddDimension {
        source: u32,
        position: Param,
    },
    RemoveDimension {
        source: u32,
        axis: Dim,
    },
    SeedOffset {
        source: u32,
        offset: i32,
    },
    Remap {
        source: u32,
        from_min: f32,
        /// `(to_max - to_min) / (from_max - from_min)`
        scale: f32,
        to_min: f32,
    },
    Terrace {
        source: u32,
        multiplier: f32,
        smoothness: f32,
    },
    ConvertRgba8 {
        source: u32,
        min: f32,
        max: f32,
    },
    Cache {
        source: u32,
    },
    Fractal(FractalOp),
    CellularValue {
        cell: CellularOp,
        index: usize,
    },
    CellularDistance {
        cell: CellularOp,
        index0: usize,
        index1: usize,
        return_type: CellularReturnType,
    },
    CellularLookup {
        cell: CellularOp,
        lookup: u32,
        frequency: f32,
    },
}

impl Op {
    /// Indices of every op this one reads from.
    pub fn inputs(&self) -> SmallVec<[u32; 4]> {
        let mut out = SmallVec::new();
        match self {
            Op::Simplex | Op::OpenSimplex2 | Op::Perlin | Op::Value => {}
            Op::DomainScale { source, .. }
            | Op::DomainAxisScale { source, .. }
            | Op::DomainRotate { source, .. }
            | Op::RemoveDimension { source, .. }
            | Op::SeedOffset { source, .. }
            | Op::Remap { source, .. }
            | Op::Terrace { source, .. }
            | Op::ConvertRgba8 { source, .. }
            | Op::Cache { source } => out.push(*source),
            Op::DomainOffset { source, offset } => {
                out.push(*source);
                out.extend(offset.iter().filter_map(|p| p.source()));
            }
            Op::AddDimension { source, position } => {
                out.push(*source);
                out.extend(position.source());
            }
            Op::Fractal(f) => {
                out.push(f.source);
                out.extend(
                    [f.gain, f.weighted_strength, f.ping_pong_strength]
                        .iter()
                        .filter_map(|p| p.source()),
                );
            }
            Op::CellularValue { cell, .. } | Op::CellularDistance { cell, .. } => {
                out.extend(cell.jitter.source());
            }
            Op::CellularLookup { cell, lookup, .. } => {
                out.extend(cell.jitter.source());
                out.push(*lookup);
            }
        }
        out
    }

    /// The source whose value passes through unchanged, for ops that only
    /// move the sample point, the seed or the memo.
    pub fn value_passthrough(&self) -> Option<u32> {
        match self {
            Op::DomainScale { source, .. }
            | Op::DomainOffset { source, .. }
            | Op::DomainRotate { source, .. }
            | Op::DomainAxisScale { source, .. }
            | Op::AddDimension { source, .. }
            | Op::RemoveDimension { source, .. }
            | Op::SeedOffset { source, .. }
            | Op::Cache { source } => Some(*source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &Mat3, b: &Mat3) -> bool {
        a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-12)
    }

    #[test]
    fn zero_angles_give_identity() {
        assert!(close(&yaw_pitch_roll_matrix(0.0, 0.0, 0.0), &IDENTITY_MAT3));
    }

    #[test]
    fn yaw_rotates_x_into_y() {
        let m = yaw_pitch_roll_matrix(std::f64::consts::FRAC_PI_2, 0.0, 0.0);
        let (x, y, z) = mat3_apply(&m, 1.0, 0.0, 0.0);
        assert!(x.abs() < 1e-12);
        assert!((y - 1.0).abs() < 1e-12);
        assert!(z.abs() < 1e-12);
    }

    #[test]
    fn roll_applies_after_yaw() {
        // yaw X→Y, then roll about X takes Y→Z
        let half_pi = std::f64::consts::FRAC_PI_2;
        let m = yaw_pitch_roll_matrix(half_pi, 0.0, half_pi);
        let (x, y, z) = mat3_apply(&m, 1.0, 0.0, 0.0);
        assert!(x.abs() < 1e-12);
        assert!(y.abs() < 1e-12);
        assert!((z - 1.0).abs() < 1e-12);
    }

    #[test]
    fn inputs_list_hybrid_sources() {
        let op = Op::DomainOffset {
            source: 3,
            offset: [Param::Const(0.0), Param::Source(1), Param::Const(2.0), Param::Source(2)],
        };
        assert_eq!(op.inputs().as_slice(), &[3, 1, 2]);
        assert_eq!(op.value_passthrough(), Some(3));
    }

    #[test]
    fn value_ops_do_not_pass_through() {
        let op = Op::Remap {
            source: 0,
            from_min: -1.0,
            scale: 0.5,
            to_min: 0.0,
        };
        assert_eq!(op.value_passthrough(), None);
        assert_eq!(Op::Simplex.inputs().len(), 0);
    }
}
