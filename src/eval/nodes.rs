// eval/nodes.rs - Batched evaluation of compiled ops
//
// `evaluate_batch` walks the compiled graph from one op down to its leaves
// for a whole batch of points at once. Point-moving ops build a new
// `Lanes` for their source; value ops post-process the source's lane
// buffer. Hybrid parameters are sampled at the same points and seed as
// the op that reads them.
//
// Recursion depth equals graph depth; see `eval/graph.rs`.

use crate::eval::cache::{EvalCache, SampleKey};
use crate::eval::compiled::{CellularOp, FractalKind, FractalOp, Op, Param};
use crate::eval::graph::EvalGraph;
use crate::eval::lanes::{self, LaneBuf, Lanes, MAX_LANES};
use crate::eval::noise::{self, CellularSample};
use crate::node::{pack_rgba8, rgba8_grey, Dim};
use rustc_hash::FxHashMap;

/// Per-worker scratch state, reused across every batch of a grid call.
pub struct EvalState {
    /// Permutation tables by seed (persists across batches).
    perm_cache: FxHashMap<i32, [u8; 512]>,
    /// Memo for `GeneratorCache` ops.
    pub cache: EvalCache,
}

impl EvalState {
    pub fn new(cache_capacity: usize) -> Self {
        EvalState {
            perm_cache: FxHashMap::default(),
            cache: EvalCache::new(cache_capacity),
        }
    }

    /// Permutation table for `seed`, built on first use.
    pub fn perm_table(&mut self, seed: i32) -> &[u8; 512] {
        self.perm_cache
            .entry(seed)
            .or_insert_with(|| noise::build_perm_table(seed))
    }
}

// ── Scalar helpers ──────────────────────────────────────────────────

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}

/// Triangle wave with period 2 and peak 1.
#[inline]
fn ping_pong(t: f32) -> f32 {
    let t = t - (t * 0.5).trunc() * 2.0;
    if t < 1.0 {
        t
    } else {
        2.0 - t
    }
}

fn terrace(value: f32, multiplier: f32, smoothness: f32) -> f32 {
    let t = value * multiplier;
    if smoothness <= 0.0 {
        return t.round() / multiplier;
    }
    let base = t.floor();
    let frac = t - base;
    let width = smoothness.min(1.0);
    let lo = 0.5 - width * 0.5;
    let k = ((frac - lo) / width).clamp(0.0, 1.0);
    (base + k * k * (3.0 - 2.0 * k)) / multiplier
}

// ── Evaluation ──────────────────────────────────────────────────────

/// Sample a single point through the graph's terminal op.
pub fn evaluate_point(graph: &EvalGraph, state: &mut EvalState, seed: i32, point: &[f32]) -> f32 {
    let pos = Lanes::single(point);
    let mut out = [0.0; MAX_LANES];
    evaluate_batch(graph, state, graph.root(), seed, &pos, &mut out);
    out[0]
}

/// Evaluate op `idx` for the first `pos.len` lanes of `pos`, writing into
/// the same lanes of `out`.
pub fn evaluate_batch(
    graph: &EvalGraph,
    state: &mut EvalState,
    idx: u32,
    seed: i32,
    pos: &Lanes,
    out: &mut LaneBuf,
) {
    match graph.op(idx) {
        Op::Simplex => {
            let perm = state.perm_table(seed);
            lattice(perm, pos, out, noise::simplex);
        }
        Op::OpenSimplex2 => {
            let perm = state.perm_table(seed ^ noise::OPEN_SIMPLEX2_SALT);
            lattice(perm, pos, out, noise::open_simplex2);
        }
        Op::Perlin => {
            let perm = state.perm_table(seed);
            lattice(perm, pos, out, noise::perlin);
        }
        Op::Value => {
            let perm = state.perm_table(seed);
            lattice(perm, pos, out, noise::value);
        }

        // ── Domain ──
        Op::DomainScale { source, scale } => {
            let mut moved = pos.clone();
            moved.scale_coords(*scale);
            evaluate_batch(graph, state, *source, seed, &moved, out);
        }
        Op::DomainOffset { source, offset } => {
            let mut moved = pos.clone();
            for (a, p) in offset.iter().enumerate().take(pos.dims) {
                let delta = param(graph, state, *p, seed, pos);
                lanes::add(moved.axis_mut(a), &delta);
            }
            evaluate_batch(graph, state, *source, seed, &moved, out);
        }
        Op::DomainRotate {
            source,
            matrix,
            planar,
        } => {
            let m = matrix.map(|v| v as f32);
            let mut moved = pos.clone();
            match (pos.dims, *planar) {
                (2, true) => {
                    let src = [*pos.axis(0), *pos.axis(1)];
                    *moved.axis_mut(0) = rotate_row(&m[0..2], &src);
                    *moved.axis_mut(1) = rotate_row(&m[3..5], &src);
                }
                (2, false) => {
                    // lifted into 3D at z = 0
                    let src = [*pos.axis(0), *pos.axis(1)];
                    moved.dims = 3;
                    for r in 0..3 {
                        *moved.axis_mut(r) = rotate_row(&m[r * 3..r * 3 + 2], &src);
                    }
                }
                _ => {
                    // W, if present, is left alone
                    let src = [*pos.axis(0), *pos.axis(1), *pos.axis(2)];
                    for r in 0..3 {
                        *moved.axis_mut(r) = rotate_row(&m[r * 3..r * 3 + 3], &src);
                    }
                }
            }
            evaluate_batch(graph, state, *source, seed, &moved, out);
        }
        Op::DomainAxisScale { source, scale } => {
            let mut moved = pos.clone();
            for (a, &s) in scale.iter().enumerate().take(pos.dims) {
                lanes::scale(moved.axis_mut(a), s);
            }
            evaluate_batch(graph, state, *source, seed, &moved, out);
        }
        Op::AddDimension { source, position } => {
            if pos.dims == 4 {
                return evaluate_batch(graph, state, *source, seed, pos, out);
            }
            let extra = param(graph, state, *position, seed, pos);
            let mut moved = pos.clone();
            moved.coords[pos.dims] = extra;
            moved.dims += 1;
            evaluate_batch(graph, state, *source, seed, &moved, out);
        }
        Op::RemoveDimension { source, axis } => {
            if pos.dims == 2 {
                return evaluate_batch(graph, state, *source, seed, pos, out);
            }
            let drop = match axis {
                Dim::W => pos.dims - 1,
                other => other.index(),
            };
            let mut moved = Lanes::new(pos.dims - 1, pos.len);
            for (dst, a) in (0..pos.dims).filter(|&a| a != drop).enumerate() {
                moved.coords[dst] = pos.coords[a];
            }
            evaluate_batch(graph, state, *source, seed, &moved, out);
        }
        Op::SeedOffset { source, offset } => {
            evaluate_batch(graph, state, *source, seed.wrapping_add(*offset), pos, out);
        }

        // ── Modifiers ──
        Op::Remap {
            source,
            from_min,
            scale,
            to_min,
        } => {
            evaluate_batch(graph, state, *source, seed, pos, out);
            lanes::affine(out, *from_min, *scale, *to_min);
        }
        Op::Terrace {
            source,
            multiplier,
            smoothness,
        } => {
            evaluate_batch(graph, state, *source, seed, pos, out);
            for v in out.iter_mut().take(pos.len) {
                *v = terrace(*v, *multiplier, *smoothness);
            }
        }
        Op::ConvertRgba8 { source, min, max } => {
            evaluate_batch(graph, state, *source, seed, pos, out);
            for v in out.iter_mut().take(pos.len) {
                *v = pack_rgba8(rgba8_grey(*v, *min, *max));
            }
        }
        Op::Cache { source } => cached(graph, state, idx, *source, seed, pos, out),

        // ── Fractal ──
        Op::Fractal(f) => fractal(graph, state, f, seed, pos, out),

        // ── Cellular ──
        Op::CellularValue { cell, index } => {
            for_each_cell(graph, state, cell, seed, pos, |lane, s| {
                out[lane] = s.value[*index] as f32;
            });
        }
        Op::CellularDistance {
            cell,
            index0,
            index1,
            return_type,
        } => {
            for_each_cell(graph, state, cell, seed, pos, |lane, s| {
                out[lane] = return_type.combine(s.distance[*index0], s.distance[*index1]) as f32;
            });
        }
        Op::CellularLookup {
            cell,
            lookup,
            frequency,
        } => {
            let mut at = Lanes::new(pos.dims, pos.len);
            let freq = *frequency as f64;
            for_each_cell(graph, state, cell, seed, pos, |lane, s| {
                for a in 0..pos.dims {
                    at.coords[a][lane] = (s.nearest[a] * freq) as f32;
                }
            });
            evaluate_batch(graph, state, *lookup, seed, &at, out);
        }
    }
}

/// Lane buffer of a hybrid parameter.
fn param(graph: &EvalGraph, state: &mut EvalState, p: Param, seed: i32, pos: &Lanes) -> LaneBuf {
    match p {
        Param::Const(v) => [v; MAX_LANES],
        Param::Source(idx) => {
            let mut buf = [0.0; MAX_LANES];
            evaluate_batch(graph, state, idx, seed, pos, &mut buf);
            buf
        }
    }
}

fn lattice(perm: &[u8; 512], pos: &Lanes, out: &mut LaneBuf, kernel: fn(&[u8; 512], &[f64]) -> f64) {
    for lane in 0..pos.len {
        let p = pos.point(lane);
        out[lane] = kernel(perm, &p[..pos.dims]).clamp(-1.0, 1.0) as f32;
    }
}

/// Dot product of one matrix row with the source axes.
fn rotate_row(row: &[f32], src: &[LaneBuf]) -> LaneBuf {
    let mut acc = [0.0; MAX_LANES];
    for (axis, &m) in src.iter().zip(row) {
        lanes::scale_add(&mut acc, axis, m);
    }
    acc
}

fn cached(
    graph: &EvalGraph,
    state: &mut EvalState,
    idx: u32,
    source: u32,
    seed: i32,
    pos: &Lanes,
    out: &mut LaneBuf,
) {
    if !state.cache.is_enabled() {
        return evaluate_batch(graph, state, source, seed, pos, out);
    }
    let key = |lane: usize| {
        let mut p = [0.0f32; 4];
        for (a, v) in p.iter_mut().enumerate().take(pos.dims) {
            *v = pos.coords[a][lane];
        }
        SampleKey::new(idx, seed, &p[..pos.dims])
    };

    let mut all_hit = true;
    for lane in 0..pos.len {
        match state.cache.lookup(&key(lane)) {
            Some(v) => out[lane] = v,
            None => {
                all_hit = false;
                break;
            }
        }
    }
    if all_hit {
        return;
    }

    evaluate_batch(graph, state, source, seed, pos, out);
    for lane in 0..pos.len {
        state.cache.store(key(lane), out[lane]);
    }
}

fn fractal(
    graph: &EvalGraph,
    state: &mut EvalState,
    f: &FractalOp,
    seed: i32,
    pos: &Lanes,
    out: &mut LaneBuf,
) {
    let gain = param(graph, state, f.gain, seed, pos);
    let weighted = param(graph, state, f.weighted_strength, seed, pos);
    let strength = match f.kind {
        FractalKind::PingPong => param(graph, state, f.ping_pong_strength, seed, pos),
        _ => [0.0; MAX_LANES],
    };

    let mut amp = [f.bounding; MAX_LANES];
    let mut sum = [0.0f32; MAX_LANES];
    let mut octave = [0.0f32; MAX_LANES];
    let mut octave_pos = pos.clone();
    let mut octave_seed = seed;

    for _ in 0..f.octaves {
        evaluate_batch(graph, state, f.source, octave_seed, &octave_pos, &mut octave);
        for lane in 0..pos.len {
            let n = octave[lane];
            let weight = match f.kind {
                FractalKind::FBm => {
                    sum[lane] += n * amp[lane];
                    (n + 1.0).min(2.0) * 0.5
                }
                FractalKind::Ridged => {
                    let a = n.abs();
                    sum[lane] += (1.0 - 2.0 * a) * amp[lane];
                    1.0 - a
                }
                FractalKind::PingPong => {
                    let p = ping_pong((n + 1.0) * strength[lane]);
                    sum[lane] += (p - 0.5) * 2.0 * amp[lane];
                    p
                }
            };
            amp[lane] *= lerp(1.0, weight, weighted[lane]);
            amp[lane] *= gain[lane];
        }
        octave_seed = octave_seed.wrapping_add(1);
        octave_pos.scale_coords(f.lacunarity);
    }

    out[..pos.len].copy_from_slice(&sum[..pos.len]);
}

fn for_each_cell(
    graph: &EvalGraph,
    state: &mut EvalState,
    cell: &CellularOp,
    seed: i32,
    pos: &Lanes,
    mut f: impl FnMut(usize, &CellularSample),
) {
    let jitter = param(graph, state, cell.jitter, seed, pos);
    for lane in 0..pos.len {
        let p = pos.point(lane);
        let sample = noise::cellular(seed, &p[..pos.dims], jitter[lane] as f64, cell.distance);
        f(lane, &sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{
        AddDimension, CellularDistance, CellularReturnType, DomainAxisScale, DomainOffset,
        DomainRotate, DomainScale, FractalFBm, FractalRidged, Generator, GeneratorCache, Perlin,
        RemoveDimension, Remap, SeedOffset, Simplex, Terrace, Value,
    };

    fn eval(gen: &Generator, seed: i32, point: &[f32]) -> f32 {
        let graph = EvalGraph::compile(gen).unwrap();
        let mut state = EvalState::new(64);
        evaluate_point(&graph, &mut state, seed, point)
    }

    #[test]
    fn ping_pong_wave() {
        assert_eq!(ping_pong(0.25), 0.25);
        assert_eq!(ping_pong(1.5), 0.5);
        assert_eq!(ping_pong(2.0), 0.0);
        assert_eq!(ping_pong(3.0), 1.0);
    }

    #[test]
    fn hard_and_smooth_terraces() {
        assert_eq!(terrace(0.26, 4.0, 0.0), 0.25);
        assert_eq!(terrace(0.9, 1.0, 0.0), 1.0);
        // fully smooth: centre of a step maps to the midpoint of the riser
        assert!((terrace(0.5, 1.0, 1.0) - 0.5).abs() < 1e-6);
        // plateau edges stay on the step
        assert_eq!(terrace(0.1, 1.0, 0.5), 0.0);
        assert_eq!(terrace(0.9, 1.0, 0.5), 1.0);
    }

    #[test]
    fn primitives_stay_in_range() {
        for gen in [
            Simplex::new().generator(),
            Perlin::new().generator(),
            Value::new().generator(),
        ] {
            for i in 0..50 {
                let v = eval(&gen, 9, &[i as f32 * 0.37, i as f32 * -0.21]);
                assert!((-1.0..=1.0).contains(&v));
            }
        }
    }

    #[test]
    fn domain_scale_matches_prescaled_point() {
        let simplex = Simplex::new();
        let scale = DomainScale::new();
        scale.set_source(&simplex).unwrap();
        scale.set_scale(3.0).unwrap();
        assert_eq!(eval(&scale, 1, &[0.5, 0.25]), eval(&simplex, 1, &[1.5, 0.75]));
    }

    #[test]
    fn domain_offset_shifts_axes() {
        let perlin = Perlin::new();
        let offset = DomainOffset::new();
        offset.set_source(&perlin).unwrap();
        offset.set_offset(Dim::Y, 2.5).unwrap();
        offset.set_offset(Dim::W, 100.0).unwrap();
        assert_eq!(eval(&offset, 4, &[0.3, 0.5]), eval(&perlin, 4, &[0.3, 3.0]));
    }

    #[test]
    fn axis_scale_per_axis() {
        let value = Value::new();
        let axis = DomainAxisScale::new();
        axis.set_source(&value).unwrap();
        axis.set_scale(Dim::X, 2.0).unwrap();
        axis.set_scale(Dim::Z, 0.5).unwrap();
        assert_eq!(
            eval(&axis, 0, &[1.25, 0.5, 3.0]),
            eval(&value, 0, &[2.5, 0.5, 1.5])
        );
    }

    #[test]
    fn planar_rotation_keeps_2d() {
        let perlin = Perlin::new();
        let rotate = DomainRotate::new();
        rotate.set_source(&perlin).unwrap();
        rotate.set_yaw(std::f32::consts::FRAC_PI_2).unwrap();
        // (x, y) -> (-y, x)
        let a = eval(&rotate, 2, &[0.75, 0.25]);
        let b = eval(&perlin, 2, &[-0.25, 0.75]);
        assert!((a - b).abs() < 1e-5);
    }

    #[test]
    fn zero_rotation_is_identity() {
        let simplex = Simplex::new();
        let rotate = DomainRotate::new();
        rotate.set_source(&simplex).unwrap();
        assert_eq!(eval(&rotate, 8, &[1.1, 2.2, 3.3]), eval(&simplex, 8, &[1.1, 2.2, 3.3]));
    }

    #[test]
    fn add_then_remove_dimension() {
        let simplex = Simplex::new();
        let remove = RemoveDimension::new();
        remove.set_source(&simplex).unwrap();
        remove.set_remove_dimension(Dim::W);
        let add = AddDimension::new();
        add.set_source(&remove).unwrap();
        add.set_new_dimension_position(0.25).unwrap();
        // 2D -> (x, y, 0.25) -> drop outermost -> (x, y)
        assert_eq!(eval(&add, 5, &[0.4, -0.9]), eval(&simplex, 5, &[0.4, -0.9]));
    }

    #[test]
    fn remove_dimension_shifts_axes() {
        let value = Value::new();
        let remove = RemoveDimension::new();
        remove.set_source(&value).unwrap();
        remove.set_remove_dimension(Dim::X);
        assert_eq!(
            eval(&remove, 1, &[9.0, 0.5, 1.5, 2.5]),
            eval(&value, 1, &[0.5, 1.5, 2.5])
        );
    }

    #[test]
    fn seed_offset_wraps() {
        let simplex = Simplex::new();
        let seeded = SeedOffset::new();
        seeded.set_source(&simplex).unwrap();
        seeded.set_offset(1);
        assert_eq!(eval(&seeded, i32::MAX, &[0.3, 0.7]), eval(&simplex, i32::MIN, &[0.3, 0.7]));
    }

    #[test]
    fn remap_applies_affine() {
        let perlin = Perlin::new();
        let remap = Remap::new();
        remap.set_source(&perlin).unwrap();
        let raw = eval(&perlin, 3, &[0.3, 0.6]);
        let mapped = eval(&remap, 3, &[0.3, 0.6]);
        assert!((mapped - (raw + 1.0) * 0.5).abs() < 1e-6);
    }

    #[test]
    fn terrace_node() {
        let value = Value::new();
        let terrace_node = Terrace::new();
        terrace_node.set_source(&value).unwrap();
        terrace_node.set_multiplier(4.0).unwrap();
        let v = eval(&terrace_node, 0, &[1.3, 2.7]);
        assert_eq!((v * 4.0).fract(), 0.0);
    }

    #[test]
    fn single_octave_fractals() {
        let perlin = Perlin::new();
        let fbm = FractalFBm::new();
        fbm.set_source(&perlin).unwrap();
        fbm.set_octave_count(1).unwrap();
        let ridged = FractalRidged::new();
        ridged.set_source(&perlin).unwrap();
        ridged.set_octave_count(1).unwrap();

        let p = [0.35, 0.8];
        let n = eval(&perlin, 6, &p);
        assert_eq!(eval(&fbm, 6, &p), n);
        assert_eq!(eval(&ridged, 6, &p), 1.0 - 2.0 * n.abs());
    }

    #[test]
    fn fbm_octaves_advance_seed_and_frequency() {
        let simplex = Simplex::new();
        let fbm = FractalFBm::new();
        fbm.set_source(&simplex).unwrap();
        fbm.set_octave_count(2).unwrap();
        let p = [0.3f32, 0.45];
        let expected = (eval(&simplex, 10, &p) + 0.5 * eval(&simplex, 11, &[0.6, 0.9])) / 1.5;
        assert!((eval(&fbm, 10, &p) - expected).abs() < 1e-6);
    }

    #[test]
    fn cache_is_transparent() {
        let perlin = Perlin::new();
        let cache = GeneratorCache::new();
        cache.set_source(&perlin).unwrap();
        let graph = EvalGraph::compile(&cache).unwrap();
        let mut state = EvalState::new(16);
        let first = evaluate_point(&graph, &mut state, 1, &[0.2, 0.9]);
        let second = evaluate_point(&graph, &mut state, 1, &[0.2, 0.9]);
        assert_eq!(first, second);
        assert_eq!(first, eval(&perlin, 1, &[0.2, 0.9]));
        assert_eq!(state.cache.stats(), (1, 1));
    }

    #[test]
    fn cellular_distance_index0() {
        let cell = CellularDistance::new();
        cell.set_return_type(CellularReturnType::Index0);
        let v = eval(&cell, 3, &[2.3, 4.1]);
        // nearest feature point within the 3x3 neighbourhood
        assert!((-1.0..=0.5).contains(&v), "{v}");
    }

    #[test]
    fn perm_tables_cached_per_seed() {
        let mut state = EvalState::new(0);
        let a = *state.perm_table(3);
        assert_eq!(&a, state.perm_table(3));
        assert_eq!(state.perm_cache.len(), 1);
    }
}
