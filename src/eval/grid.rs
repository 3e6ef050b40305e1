// eval/grid.rs - Uniform 2D grid evaluation with rayon parallelism
//
// Fills a caller-owned row-major buffer with the terminal node's value at
// `((x_start + i) · frequency, (y_start + j) · frequency)`. Rows are split
// across the rayon pool and each worker keeps its own `EvalState`, so perm
// tables and cache memos are never shared between threads. Within a row,
// points are evaluated in batches as wide as the selected tier's lanes.

use crate::config::EvalConfig;
use crate::error::{NoiseError, Result};
use crate::eval::graph::EvalGraph;
use crate::eval::lanes::{Lanes, MAX_LANES};
use crate::eval::nodes::{evaluate_batch, evaluate_point, EvalState};
use crate::node::Generator;
use crate::simd::SimdTier;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Value range written by a grid call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridResult {
    pub min: f32,
    pub max: f32,
}

/// Element count of an `x_size` by `y_size` grid, checked against the
/// `available` buffer length.
pub(crate) fn grid_len(x_size: i32, y_size: i32, available: usize) -> Result<usize> {
    let n = usize::try_from(x_size)
        .ok()
        .zip(usize::try_from(y_size).ok())
        .and_then(|(x, y)| x.checked_mul(y))
        .ok_or_else(|| NoiseError::size_mismatch(x_size, y_size, available))?;
    if available < n {
        return Err(NoiseError::size_mismatch(x_size, y_size, available));
    }
    Ok(n)
}

/// Row-invariant inputs of one grid call.
struct GridSpec {
    x_start: i32,
    y_start: i32,
    frequency: f32,
    seed: i32,
    lanes: usize,
}

impl Generator {
    /// Evaluate this node over a uniform 2D grid with default settings.
    ///
    /// `buffer` must hold at least `x_size * y_size` values; exactly that
    /// many are written, row-major (`buffer[y * x_size + x]`). Non-finite
    /// values are replaced by the returned `max` (for +∞) or `min`.
    ///
    /// When the terminal is a `ConvertRGBA8` node, each entry is a packed
    /// RGBA8 word reinterpreted as f32, and `min`/`max` are the lowest and
    /// highest grey levels (0..=255). They are not buffer entries then, so
    /// compare them against [`unpack_rgba8`](crate::unpack_rgba8) output.
    #[allow(clippy::too_many_arguments)]
    pub fn gen_uniform_grid_2d(
        &self,
        buffer: &mut [f32],
        x_start: i32,
        y_start: i32,
        x_size: i32,
        y_size: i32,
        frequency: f32,
        seed: i32,
    ) -> Result<GridResult> {
        self.gen_uniform_grid_2d_with(
            buffer,
            x_start,
            y_start,
            x_size,
            y_size,
            frequency,
            seed,
            &EvalConfig::default(),
        )
    }

    /// [`gen_uniform_grid_2d`](Self::gen_uniform_grid_2d) with explicit
    /// evaluation settings.
    #[allow(clippy::too_many_arguments)]
    pub fn gen_uniform_grid_2d_with(
        &self,
        buffer: &mut [f32],
        x_start: i32,
        y_start: i32,
        x_size: i32,
        y_size: i32,
        frequency: f32,
        seed: i32,
        config: &EvalConfig,
    ) -> Result<GridResult> {
        let n = grid_len(x_size, y_size, buffer.len())?;
        let graph = EvalGraph::compile(self)?;
        if n == 0 {
            return Ok(GridResult { min: 0.0, max: 0.0 });
        }

        let started = Instant::now();
        let tier = config.tier_for(self.simd_tier());
        let spec = GridSpec {
            x_start,
            y_start,
            frequency,
            seed,
            lanes: batch_width(tier),
        };
        let width = x_size as usize;
        let rows = y_size as usize;
        let grid = &mut buffer[..n];

        if config.runs_parallel(rows) {
            grid.par_chunks_mut(width).enumerate().for_each_init(
                || EvalState::new(config.cache_capacity),
                |state, (y, row)| fill_row(&graph, state, &spec, y, row),
            );
        } else {
            let mut state = EvalState::new(config.cache_capacity);
            for (y, row) in grid.chunks_mut(width).enumerate() {
                fill_row(&graph, &mut state, &spec, y, row);
            }
        }

        let result = if graph.output_is_packed() {
            packed_range(grid)
        } else {
            finish_range(grid)
        };

        tracing::debug!(
            x_size,
            y_size,
            tier = %tier,
            nodes = graph.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "uniform grid evaluated"
        );
        Ok(result)
    }

    /// Sample a single 2D point (no frequency scaling).
    pub fn gen_single_2d(&self, x: f32, y: f32, seed: i32) -> Result<f32> {
        self.gen_single(&[x, y], seed)
    }

    /// Sample a single 3D point.
    pub fn gen_single_3d(&self, x: f32, y: f32, z: f32, seed: i32) -> Result<f32> {
        self.gen_single(&[x, y, z], seed)
    }

    /// Sample a single 4D point.
    pub fn gen_single_4d(&self, x: f32, y: f32, z: f32, w: f32, seed: i32) -> Result<f32> {
        self.gen_single(&[x, y, z, w], seed)
    }

    fn gen_single(&self, point: &[f32], seed: i32) -> Result<f32> {
        let graph = EvalGraph::compile(self)?;
        let mut state = EvalState::new(0);
        Ok(evaluate_point(&graph, &mut state, seed, point))
    }
}

fn fill_row(graph: &EvalGraph, state: &mut EvalState, spec: &GridSpec, y: usize, row: &mut [f32]) {
    let y_coord = (spec.y_start as i64 + y as i64) as f32 * spec.frequency;
    let mut out = [0.0f32; MAX_LANES];

    for (batch, chunk) in row.chunks_mut(spec.lanes).enumerate() {
        let mut pos = Lanes::new(2, chunk.len());
        let first = batch * spec.lanes;
        for lane in 0..chunk.len() {
            let x = spec.x_start as i64 + (first + lane) as i64;
            pos.coords[0][lane] = x as f32 * spec.frequency;
            pos.coords[1][lane] = y_coord;
        }
        evaluate_batch(graph, state, graph.root(), spec.seed, &pos, &mut out);
        chunk.copy_from_slice(&out[..chunk.len()]);
    }
}

/// Range over finite samples; non-finite samples are then pinned to it.
fn finish_range(values: &mut [f32]) -> GridResult {
    let (min, max) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    if min > max {
        values.fill(0.0);
        return GridResult { min: 0.0, max: 0.0 };
    }

    for v in values.iter_mut().filter(|v| !v.is_finite()) {
        *v = if *v == f32::INFINITY { max } else { min };
    }
    GridResult { min, max }
}

/// Range of the grey channel of packed RGBA8 samples.
fn packed_range(values: &[f32]) -> GridResult {
    let (min, max) = values
        .iter()
        .map(|v| (v.to_bits() & 0xFF) as u8)
        .fold((u8::MAX, u8::MIN), |(lo, hi), g| (lo.min(g), hi.max(g)));
    GridResult {
        min: min as f32,
        max: max as f32,
    }
}

/// Batch width used for `tier`.
pub fn batch_width(tier: SimdTier) -> usize {
    tier.lane_count().clamp(1, MAX_LANES)
}
