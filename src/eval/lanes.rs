// eval/lanes.rs - Fixed-width sample batches
//
// A batch holds up to `MAX_LANES` sample points, one coordinate buffer per
// axis. Element-wise helpers run on `wide::f32x8` over the full buffer
// regardless of how many lanes are live, so a lane's arithmetic is the same
// whichever tier sized the batch. Multiplies and adds are kept as separate
// rounding steps for the same reason.

use wide::f32x8;

/// Widest batch any tier produces.
pub const MAX_LANES: usize = 16;

/// One value per lane.
pub type LaneBuf = [f32; MAX_LANES];

#[inline]
fn load(buf: &LaneBuf) -> [f32x8; 2] {
    let mut lo = [0.0f32; 8];
    let mut hi = [0.0f32; 8];
    lo.copy_from_slice(&buf[..8]);
    hi.copy_from_slice(&buf[8..]);
    [f32x8::from(lo), f32x8::from(hi)]
}

#[inline]
fn store(buf: &mut LaneBuf, v: [f32x8; 2]) {
    buf[..8].copy_from_slice(&v[0].to_array());
    buf[8..].copy_from_slice(&v[1].to_array());
}

/// `buf *= s`
#[inline]
pub fn scale(buf: &mut LaneBuf, s: f32) {
    let s = f32x8::splat(s);
    let [lo, hi] = load(buf);
    store(buf, [lo * s, hi * s]);
}

/// `buf += other`
#[inline]
pub fn add(buf: &mut LaneBuf, other: &LaneBuf) {
    let [a0, a1] = load(buf);
    let [b0, b1] = load(other);
    store(buf, [a0 + b0, a1 + b1]);
}

/// `buf = (buf - sub) * mul + add`
#[inline]
pub fn affine(buf: &mut LaneBuf, sub: f32, mul: f32, add: f32) {
    let (sub, mul, add) = (f32x8::splat(sub), f32x8::splat(mul), f32x8::splat(add));
    let [lo, hi] = load(buf);
    store(buf, [(lo - sub) * mul + add, (hi - sub) * mul + add]);
}

/// `acc += a * s`
#[inline]
pub fn scale_add(acc: &mut LaneBuf, a: &LaneBuf, s: f32) {
    let s = f32x8::splat(s);
    let [c0, c1] = load(acc);
    let [a0, a1] = load(a);
    store(acc, [c0 + a0 * s, c1 + a1 * s]);
}

// ── Batch of points ─────────────────────────────────────────────────

/// `len` sample points of dimensionality `dims` (2 to 4), stored per axis.
#[derive(Debug, Clone)]
pub struct Lanes {
    pub coords: [LaneBuf; 4],
    pub dims: usize,
    pub len: usize,
}

impl Lanes {
    /// All-zero batch.
    pub fn new(dims: usize, len: usize) -> Self {
        debug_assert!((2..=4).contains(&dims));
        debug_assert!(len <= MAX_LANES);
        Lanes {
            coords: [[0.0; MAX_LANES]; 4],
            dims,
            len,
        }
    }

    /// Batch of a single point.
    pub fn single(point: &[f32]) -> Self {
        let mut lanes = Lanes::new(point.len(), 1);
        for (a, &v) in point.iter().enumerate() {
            lanes.coords[a][0] = v;
        }
        lanes
    }

    #[inline]
    pub fn axis(&self, a: usize) -> &LaneBuf {
        &self.coords[a]
    }

    #[inline]
    pub fn axis_mut(&mut self, a: usize) -> &mut LaneBuf {
        &mut self.coords[a]
    }

    /// Point `lane` widened to f64; only the first `dims` entries are set.
    #[inline]
    pub fn point(&self, lane: usize) -> [f64; 4] {
        let mut p = [0.0f64; 4];
        for (a, v) in p.iter_mut().enumerate().take(self.dims) {
            *v = self.coords[a][lane] as f64;
        }
        p
    }

    /// Multiply every live axis by `s`.
    pub fn scale_coords(&mut self, s: f32) {
        for a in 0..self.dims {
            scale(&mut self.coords[a], s);
        }
    }
}
