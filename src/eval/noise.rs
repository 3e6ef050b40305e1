// eval/noise.rs - Seeded lattice noise kernels for 2, 3 and 4 dimensions
//
// Every kernel is a pure function of (permutation table or seed, point), so
// a lane's result never depends on which batch or tier evaluated it.
// Coordinates arrive as f32 and are widened to f64 for the lattice math.
// Lattice cells are wrapped to 32 bits, so any finite coordinate is valid;
// non-finite coordinates are sampled at zero.

use crate::node::DistanceFunction;

// ── Gradient vectors ────────────────────────────────────────────────

// 2D simplex: 8 directions (cardinal + diagonal, unnormalized)
const GRAD2: [[f64; 2]; 8] = [
    [1.0, 0.0],
    [-1.0, 0.0],
    [0.0, 1.0],
    [0.0, -1.0],
    [1.0, 1.0],
    [-1.0, 1.0],
    [1.0, -1.0],
    [-1.0, -1.0],
];

// 2D Perlin: the same 8 directions at unit length
const FRAC_1_SQRT_2: f64 = std::f64::consts::FRAC_1_SQRT_2;
const GRAD2_UNIT: [[f64; 2]; 8] = [
    [1.0, 0.0],
    [-1.0, 0.0],
    [0.0, 1.0],
    [0.0, -1.0],
    [FRAC_1_SQRT_2, FRAC_1_SQRT_2],
    [-FRAC_1_SQRT_2, FRAC_1_SQRT_2],
    [FRAC_1_SQRT_2, -FRAC_1_SQRT_2],
    [-FRAC_1_SQRT_2, -FRAC_1_SQRT_2],
];

// 3D: 12 directions (edges of a cube), length √2
const GRAD3: [[f64; 3]; 12] = [
    [1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0],
    [1.0, -1.0, 0.0],
    [-1.0, -1.0, 0.0],
    [1.0, 0.0, 1.0],
    [-1.0, 0.0, 1.0],
    [1.0, 0.0, -1.0],
    [-1.0, 0.0, -1.0],
    [0.0, 1.0, 1.0],
    [0.0, -1.0, 1.0],
    [0.0, 1.0, -1.0],
    [0.0, -1.0, -1.0],
];

// 4D: 32 directions (edges of a tesseract), length √3
const GRAD4: [[f64; 4]; 32] = [
    [0.0, 1.0, 1.0, 1.0],
    [0.0, 1.0, 1.0, -1.0],
    [0.0, 1.0, -1.0, 1.0],
    [0.0, 1.0, -1.0, -1.0],
    [0.0, -1.0, 1.0, 1.0],
    [0.0, -1.0, 1.0, -1.0],
    [0.0, -1.0, -1.0, 1.0],
    [0.0, -1.0, -1.0, -1.0],
    [1.0, 0.0, 1.0, 1.0],
    [1.0, 0.0, 1.0, -1.0],
    [1.0, 0.0, -1.0, 1.0],
    [1.0, 0.0, -1.0, -1.0],
    [-1.0, 0.0, 1.0, 1.0],
    [-1.0, 0.0, 1.0, -1.0],
    [-1.0, 0.0, -1.0, 1.0],
    [-1.0, 0.0, -1.0, -1.0],
    [1.0, 1.0, 0.0, 1.0],
    [1.0, 1.0, 0.0, -1.0],
    [1.0, -1.0, 0.0, 1.0],
    [1.0, -1.0, 0.0, -1.0],
    [-1.0, 1.0, 0.0, 1.0],
    [-1.0, 1.0, 0.0, -1.0],
    [-1.0, -1.0, 0.0, 1.0],
    [-1.0, -1.0, 0.0, -1.0],
    [1.0, 1.0, 1.0, 0.0],
    [1.0, 1.0, -1.0, 0.0],
    [1.0, -1.0, 1.0, 0.0],
    [1.0, -1.0, -1.0, 0.0],
    [-1.0, 1.0, 1.0, 0.0],
    [-1.0, 1.0, -1.0, 0.0],
    [-1.0, -1.0, 1.0, 0.0],
    [-1.0, -1.0, -1.0, 0.0],
];

// ── Mulberry32 PRNG ─────────────────────────────────────────────────

/// Mulberry32: tiny 32-bit PRNG with good avalanche, used to shuffle
/// permutation tables and to place cellular feature points.
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    pub fn new(seed: i32) -> Self {
        Self { state: seed as u32 }
    }

    /// Next value in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.state = self.state.wrapping_add(0x6d2b79f5);
        let mut t: u32 = (self.state ^ (self.state >> 15)).wrapping_mul(1 | self.state);
        t = t.wrapping_add((t ^ (t >> 7)).wrapping_mul(61 | t)) ^ t;
        ((t ^ (t >> 14)) as f64) / 4294967296.0
    }
}

// ── Permutation table ───────────────────────────────────────────────

/// 512-entry permutation table: a Fisher-Yates shuffle of [0..255] seeded
/// by `seed`, followed by a copy so lookups never need to wrap.
pub fn build_perm_table(seed: i32) -> [u8; 512] {
    let mut rng = Mulberry32::new(seed);
    let mut perm = [0u8; 512];

    for i in 0..256u16 {
        perm[i as usize] = i as u8;
    }

    for i in (1..=255usize).rev() {
        let j = (rng.next_f64() * (i as f64 + 1.0)).floor() as usize;
        perm.swap(i, j);
    }

    for i in 0..256 {
        perm[i + 256] = perm[i];
    }

    perm
}

/// Seed salt separating the OpenSimplex2 lattice from plain simplex.
pub const OPEN_SIMPLEX2_SALT: i32 = 0x2F6E_1D3B;

/// Non-finite coordinates collapse onto the origin.
#[inline]
fn finite(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Lattice cell index of an already floored coordinate, wrapped to 32 bits.
#[inline]
fn wrap_cell(floor: f64) -> i32 {
    floor.rem_euclid(4_294_967_296.0) as u32 as i32
}

/// Hash of a lattice corner: nested permutation lookups, last axis innermost.
#[inline]
fn hash_corner(perm: &[u8; 512], cell: &[i32]) -> usize {
    let mut h = 0usize;
    for &c in cell.iter().rev() {
        h = perm[(c & 255) as usize + h] as usize;
    }
    h
}

#[inline]
fn quintic(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

// ── Dimension dispatch ──────────────────────────────────────────────

/// Simplex noise for a 2-, 3- or 4-component point.
pub fn simplex(perm: &[u8; 512], p: &[f64]) -> f64 {
    match *p {
        [x, y] => simplex_2d(perm, x, y),
        [x, y, z] => simplex_3d(perm, x, y, z),
        [x, y, z, w, ..] => simplex_4d(perm, x, y, z, w),
        _ => 0.0,
    }
}

/// Simplex noise sampled in a reoriented domain. 2-D points are rotated by
/// a fixed angle; 3-D and 4-D points are reflected through the main
/// diagonal, which turns the lattice's axis-aligned faces away from the
/// coordinate planes.
pub fn open_simplex2(perm: &[u8; 512], p: &[f64]) -> f64 {
    // cos/sin of π/12
    const C: f64 = 0.965_925_826_289_068_3;
    const S: f64 = 0.258_819_045_102_520_74;
    match *p {
        [x, y] => simplex_2d(perm, C * x - S * y, S * x + C * y),
        [x, y, z] => {
            let r = (x + y + z) * (2.0 / 3.0);
            simplex_3d(perm, r - x, r - y, r - z)
        }
        [x, y, z, w, ..] => {
            let r = (x + y + z + w) * 0.5;
            simplex_4d(perm, r - x, r - y, r - z, r - w)
        }
        _ => 0.0,
    }
}

// ── 2D Simplex Noise ────────────────────────────────────────────────

const F2: f64 = 0.36602540378443864676; // (sqrt(3) - 1) / 2
const G2: f64 = 0.21132486540518711775; // (3 - sqrt(3)) / 6

/// 2D simplex noise in approximately [-1, 1].
pub fn simplex_2d(perm: &[u8; 512], x: f64, y: f64) -> f64 {
    let (x, y) = (finite(x), finite(y));

    // Skew input to simplex cell coordinates
    let s = (x + y) * F2;
    let i = (x + s).floor();
    let j = (y + s).floor();

    // Unskew to find cell origin in input space
    let t = (i + j) * G2;
    let x0 = x - (i - t);
    let y0 = y - (j - t);

    let (i1, j1) = if x0 > y0 { (1usize, 0usize) } else { (0, 1) };

    let x1 = x0 - i1 as f64 + G2;
    let y1 = y0 - j1 as f64 + G2;
    let x2 = x0 - 1.0 + 2.0 * G2;
    let y2 = y0 - 1.0 + 2.0 * G2;

    let ii = (wrap_cell(i) & 255) as usize;
    let jj = (wrap_cell(j) & 255) as usize;
    let gi0 = (perm[ii + perm[jj] as usize] % 8) as usize;
    let gi1 = (perm[ii + i1 + perm[jj + j1] as usize] % 8) as usize;
    let gi2 = (perm[ii + 1 + perm[jj + 1] as usize] % 8) as usize;

    let corner = |g: [f64; 2], dx: f64, dy: f64| {
        let t = 0.5 - dx * dx - dy * dy;
        if t < 0.0 {
            0.0
        } else {
            let t2 = t * t;
            t2 * t2 * (g[0] * dx + g[1] * dy)
        }
    };

    70.0 * (corner(GRAD2[gi0], x0, y0) + corner(GRAD2[gi1], x1, y1) + corner(GRAD2[gi2], x2, y2))
}

// ── 3D Simplex Noise ────────────────────────────────────────────────

const F3: f64 = 1.0 / 3.0;
const G3: f64 = 1.0 / 6.0;

/// 3D simplex noise in approximately [-1, 1].
pub fn simplex_3d(perm: &[u8; 512], x: f64, y: f64, z: f64) -> f64 {
    let (x, y, z) = (finite(x), finite(y), finite(z));
    let s = (x + y + z) * F3;
    let i = (x + s).floor();
    let j = (y + s).floor();
    let k = (z + s).floor();

    let t = (i + j + k) * G3;
    let x0 = x - (i - t);
    let y0 = y - (j - t);
    let z0 = z - (k - t);

    // Which tetrahedron: rank the offsets
    let (i1, j1, k1, i2, j2, k2) = if x0 >= y0 {
        if y0 >= z0 {
            (1, 0, 0, 1, 1, 0)
        } else if x0 >= z0 {
            (1, 0, 0, 1, 0, 1)
        } else {
            (0, 0, 1, 1, 0, 1)
        }
    } else if y0 < z0 {
        (0, 0, 1, 0, 1, 1)
    } else if x0 < z0 {
        (0, 1, 0, 0, 1, 1)
    } else {
        (0, 1, 0, 1, 1, 0)
    };

    let x1 = x0 - i1 as f64 + G3;
    let y1 = y0 - j1 as f64 + G3;
    let z1 = z0 - k1 as f64 + G3;
    let x2 = x0 - i2 as f64 + 2.0 * G3;
    let y2 = y0 - j2 as f64 + 2.0 * G3;
    let z2 = z0 - k2 as f64 + 2.0 * G3;
    let x3 = x0 - 1.0 + 3.0 * G3;
    let y3 = y0 - 1.0 + 3.0 * G3;
    let z3 = z0 - 1.0 + 3.0 * G3;

    let ii = (wrap_cell(i) & 255) as usize;
    let jj = (wrap_cell(j) & 255) as usize;
    let kk = (wrap_cell(k) & 255) as usize;
    let gi0 = (perm[ii + perm[jj + perm[kk] as usize] as usize] % 12) as usize;
    let gi1 = (perm[ii + i1 + perm[jj + j1 + perm[kk + k1] as usize] as usize] % 12) as usize;
    let gi2 = (perm[ii + i2 + perm[jj + j2 + perm[kk + k2] as usize] as usize] % 12) as usize;
    let gi3 = (perm[ii + 1 + perm[jj + 1 + perm[kk + 1] as usize] as usize] % 12) as usize;

    // kernel radius² = 0.6 for 3D
    let corner = |g: [f64; 3], dx: f64, dy: f64, dz: f64| {
        let t = 0.6 - dx * dx - dy * dy - dz * dz;
        if t < 0.0 {
            0.0
        } else {
            let t2 = t * t;
            t2 * t2 * (g[0] * dx + g[1] * dy + g[2] * dz)
        }
    };

    32.0 * (corner(GRAD3[gi0], x0, y0, z0)
        + corner(GRAD3[gi1], x1, y1, z1)
        + corner(GRAD3[gi2], x2, y2, z2)
        + corner(GRAD3[gi3], x3, y3, z3))
}

// ── 4D Simplex Noise ────────────────────────────────────────────────

const F4: f64 = 0.30901699437494742410; // (sqrt(5) - 1) / 4
const G4: f64 = 0.13819660112501051518; // (5 - sqrt(5)) / 20

/// 4D simplex noise in approximately [-1, 1].
pub fn simplex_4d(perm: &[u8; 512], x: f64, y: f64, z: f64, w: f64) -> f64 {
    let (x, y, z, w) = (finite(x), finite(y), finite(z), finite(w));
    let s = (x + y + z + w) * F4;
    let i = (x + s).floor();
    let j = (y + s).floor();
    let k = (z + s).floor();
    let l = (w + s).floor();

    let t = (i + j + k + l) * G4;
    let d0 = [x - (i - t), y - (j - t), z - (k - t), w - (l - t)];

    // Rank each axis by magnitude to pick the simplex traversal order
    let mut rank = [0usize; 4];
    for a in 0..4 {
        for b in (a + 1)..4 {
            if d0[a] > d0[b] {
                rank[a] += 1;
            } else {
                rank[b] += 1;
            }
        }
    }

    let base = [i, j, k, l].map(wrap_cell);
    let mut total = 0.0;
    for step in 0..5usize {
        // step 0 is the origin corner, step 4 the far corner
        let mut offset = [0i32; 4];
        let mut d = [0.0f64; 4];
        for a in 0..4 {
            offset[a] = match step {
                0 => 0,
                4 => 1,
                _ => (rank[a] >= 4 - step) as i32,
            };
            d[a] = d0[a] - offset[a] as f64 + step as f64 * G4;
        }
        let cell = [
            base[0].wrapping_add(offset[0]),
            base[1].wrapping_add(offset[1]),
            base[2].wrapping_add(offset[2]),
            base[3].wrapping_add(offset[3]),
        ];
        let g = GRAD4[hash_corner(perm, &cell) % 32];
        let t = 0.6 - d[0] * d[0] - d[1] * d[1] - d[2] * d[2] - d[3] * d[3];
        if t >= 0.0 {
            let t2 = t * t;
            total += t2 * t2 * (g[0] * d[0] + g[1] * d[1] + g[2] * d[2] + g[3] * d[3]);
        }
    }

    27.0 * total
}

// ── Perlin Noise ────────────────────────────────────────────────────

/// Gradient noise on the square lattice, quintic fade, ≈[-1, 1].
pub fn perlin(perm: &[u8; 512], p: &[f64]) -> f64 {
    let n = p.len().min(4);
    let mut base = [0i32; 4];
    let mut frac = [0.0f64; 4];
    let mut fade = [0.0f64; 4];
    for a in 0..n {
        let v = finite(p[a]);
        let f = v.floor();
        base[a] = wrap_cell(f);
        frac[a] = v - f;
        fade[a] = quintic(frac[a]);
    }

    let mut total = 0.0;
    for corner in 0..(1usize << n) {
        let mut cell = [0i32; 4];
        let mut weight = 1.0;
        let mut delta = [0.0f64; 4];
        for a in 0..n {
            let bit = (corner >> a) & 1;
            cell[a] = base[a].wrapping_add(bit as i32);
            delta[a] = frac[a] - bit as f64;
            weight *= if bit == 1 { fade[a] } else { 1.0 - fade[a] };
        }
        let h = hash_corner(perm, &cell[..n]);
        let dot = match n {
            2 => {
                let g = GRAD2_UNIT[h % 8];
                g[0] * delta[0] + g[1] * delta[1]
            }
            3 => {
                let g = GRAD3[h % 12];
                g[0] * delta[0] + g[1] * delta[1] + g[2] * delta[2]
            }
            _ => {
                let g = GRAD4[h % 32];
                g[0] * delta[0] + g[1] * delta[1] + g[2] * delta[2] + g[3] * delta[3]
            }
        };
        total += weight * dot;
    }

    // 2/√n over the gradient length maps the theoretical extremes to ±1
    let scale = match n {
        2 => std::f64::consts::SQRT_2,
        3 => 0.816_496_580_927_726, // (2/√3)/√2
        _ => 0.577_350_269_189_625_8, // (2/√4)/√3
    };
    total * scale
}

// ── Value Noise ─────────────────────────────────────────────────────

/// Hashed lattice values blended with quintic fade, in [-1, 1].
pub fn value(perm: &[u8; 512], p: &[f64]) -> f64 {
    let n = p.len().min(4);
    let mut base = [0i32; 4];
    let mut fade = [0.0f64; 4];
    for a in 0..n {
        let v = finite(p[a]);
        let f = v.floor();
        base[a] = wrap_cell(f);
        fade[a] = quintic(v - f);
    }

    let mut total = 0.0;
    for corner in 0..(1usize << n) {
        let mut cell = [0i32; 4];
        let mut weight = 1.0;
        for a in 0..n {
            let bit = (corner >> a) & 1;
            cell[a] = base[a].wrapping_add(bit as i32);
            weight *= if bit == 1 { fade[a] } else { 1.0 - fade[a] };
        }
        let h = hash_corner(perm, &cell[..n]);
        total += weight * (h as f64 / 127.5 - 1.0);
    }
    total
}

// ── Cellular Noise ──────────────────────────────────────────────────

/// Per-axis primes mixed into a cell's feature-point seed.
const HASH_PRIMES: [i32; 4] = [374761393, 668265263, 1103515245, 1664525];

/// Number of nearest feature points tracked per sample.
pub const CELLULAR_RANK: usize = 4;

/// The nearest feature points around a sample, sorted by distance.
#[derive(Debug, Clone, Copy)]
pub struct CellularSample {
    pub distance: [f64; CELLULAR_RANK],
    /// Per-cell random value in [-1, 1] of each ranked point.
    pub value: [f64; CELLULAR_RANK],
    /// Position of the nearest feature point.
    pub nearest: [f64; 4],
}

fn cell_seed(seed: i32, cell: &[i32]) -> i32 {
    let mut h = seed;
    for (a, &c) in cell.iter().enumerate() {
        h = h.wrapping_add(c.wrapping_mul(HASH_PRIMES[a]));
    }
    h ^ (h >> 15)
}

/// Scan the 3ⁿ cells around `p` and keep the four nearest feature points.
pub fn cellular(seed: i32, p: &[f64], jitter: f64, metric: DistanceFunction) -> CellularSample {
    let n = p.len().min(4);
    let mut p_in = [0.0f64; 4];
    let mut base = [0.0f64; 4];
    for a in 0..n {
        p_in[a] = finite(p[a]);
        base[a] = p_in[a].floor();
    }

    let mut out = CellularSample {
        distance: [f64::INFINITY; CELLULAR_RANK],
        value: [0.0; CELLULAR_RANK],
        nearest: [0.0; 4],
    };

    let neighbours = 3usize.pow(n as u32);
    for index in 0..neighbours {
        // cell origin in space, and its wrapped lattice index
        let mut origin = [0.0f64; 4];
        let mut cell = [0i32; 4];
        let mut digits = index;
        for a in 0..n {
            let step = (digits % 3) as i32 - 1;
            origin[a] = base[a] + step as f64;
            cell[a] = wrap_cell(base[a]).wrapping_add(step);
            digits /= 3;
        }

        let mut rng = Mulberry32::new(cell_seed(seed, &cell[..n]));
        let mut point = [0.0f64; 4];
        let mut delta = [0.0f64; 4];
        for a in 0..n {
            point[a] = origin[a] + 0.5 + (rng.next_f64() - 0.5) * jitter;
            delta[a] = point[a] - p_in[a];
        }
        let value = rng.next_f64() * 2.0 - 1.0;
        let dist = metric.apply(&delta[..n]);

        // insertion into the sorted top-k; ties keep the earlier cell
        let Some(slot) = out.distance.iter().position(|&d| dist < d) else {
            continue;
        };
        for r in (slot + 1..CELLULAR_RANK).rev() {
            out.distance[r] = out.distance[r - 1];
            out.value[r] = out.value[r - 1];
        }
        out.distance[slot] = dist;
        out.value[slot] = value;
        if slot == 0 {
            out.nearest = point;
        }
    }

    out
}

// ── Tests ───────────────────────────────────────────────────────────
