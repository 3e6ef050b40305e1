// bridge/mod.rs - Entry points for host-language bindings
//
// Bindings hand in a node handle plus a borrowed host array. Everything is
// validated in a fixed order (element type, then size, then alignment)
// before the first sample is written.

mod array;

pub use array::{DType, ExternalArray};

use crate::error::{NoiseError, Result};
use crate::eval::grid::grid_len;
use crate::node::Generator;
use std::io::{self, Write};

/// Greeting printed by [`hello`].
pub const HELLO_BANNER: &str = "Hello from noisegraph binding module!";

/// Write the binding greeting to `out`.
pub fn write_hello(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{HELLO_BANNER}")
}

/// Print the binding greeting to stdout; used as a load smoke test.
pub fn hello() {
    let _ = write_hello(&mut io::stdout().lock());
}

/// Fill a host array with a uniform 2D grid and return `(min, max)`.
#[allow(clippy::too_many_arguments)]
pub fn gen_uniform_grid_2d(
    generator: &Generator,
    array: &mut ExternalArray<'_>,
    x_start: i32,
    y_start: i32,
    x_size: i32,
    y_size: i32,
    frequency: f32,
    seed: i32,
) -> Result<(f32, f32)> {
    if array.dtype() != DType::F32 {
        return Err(NoiseError::TypeMismatch {
            found: array.dtype(),
        });
    }
    grid_len(x_size, y_size, array.len())?;
    let buffer = array.as_f32_mut()?;
    let range = generator.gen_uniform_grid_2d(
        buffer, x_start, y_start, x_size, y_size, frequency, seed,
    )?;
    tracing::trace!(min = range.min, max = range.max, "host array filled");
    Ok((range.min, range.max))
}
