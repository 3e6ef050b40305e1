//! Graph-based procedural noise.
//!
//! Build a graph out of node handles, then evaluate it over a uniform 2D
//! grid:
//!
//! ```
//! use noisegraph::{FractalFBm, Simplex};
//!
//! let fbm = FractalFBm::new();
//! fbm.set_source(&Simplex::new()).unwrap();
//! fbm.set_octave_count(4).unwrap();
//!
//! let mut buffer = vec![0.0f32; 64 * 64];
//! let range = fbm
//!     .gen_uniform_grid_2d(&mut buffer, 0, 0, 64, 64, 0.02, 1337)
//!     .unwrap();
//! assert!(range.min <= range.max);
//! ```
//!
//! Handles are cheap to clone and may be shared across threads. A grid
//! call compiles the graph reachable from the handle into a flat op list,
//! validates it and then evaluates rows in parallel.

pub mod bridge;
pub mod config;
pub mod error;
pub mod eval;
pub mod node;
pub mod simd;

pub use bridge::hello;
pub use config::EvalConfig;
pub use error::{NoiseError, Result};
pub use eval::grid::GridResult;
pub use node::{
    pack_rgba8, unpack_rgba8, AddDimension, Cellular, CellularDistance, CellularLookup,
    CellularReturnType, CellularValue, ConvertRgba8, Dim, DistanceFunction, DomainAxisScale,
    DomainOffset, DomainRotate, DomainScale, Fractal, FractalFBm, FractalPingPong, FractalRidged,
    Generator, GeneratorCache, HybridSource, NodeKind, OpenSimplex2, Perlin, RemoveDimension,
    Remap, SeedOffset, Simplex, SmartNode, Terrace, Value, WeakGenerator,
};
pub use simd::SimdTier;
