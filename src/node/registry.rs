// node/registry.rs - Type-indexed construction of every concrete node
//
// Each variant gets a `Variant::new() -> SmartNode<Variant>` factory and an
// entry in `NodeKind`, which binding layers use to create nodes by name.

use crate::error::NoiseError;
use crate::node::{
    AddDimension, CellularDistance, CellularLookup, CellularValue, ConvertRgba8, DomainAxisScale,
    DomainOffset, DomainRotate, DomainScale, FractalFBm, FractalPingPong, FractalRidged,
    Generator, GeneratorCache, OpenSimplex2, Perlin, RemoveDimension, Remap, SeedOffset, Simplex,
    SmartNode, Terrace, Value,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! node_registry {
    ($($kind:ident($name:literal) => $ty:ident),* $(,)?) => {
        /// Every concrete node variant.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum NodeKind {
            $($kind),*
        }

        impl NodeKind {
            pub const ALL: &'static [NodeKind] = &[$(NodeKind::$kind),*];

            /// Display name, as exposed to binding layers.
            pub fn name(self) -> &'static str {
                match self {
                    $(NodeKind::$kind => $name),*
                }
            }

            /// Create a node of this kind with default parameters.
            pub fn create(self) -> Generator {
                match self {
                    $(NodeKind::$kind => $ty::new().into()),*
                }
            }
        }

        $(
            impl $ty {
                #[allow(clippy::new_ret_no_self)]
                pub fn new() -> SmartNode<$ty> {
                    SmartNode::from_node($ty::default())
                }
            }
        )*
    };
}

node_registry! {
    Simplex("Simplex") => Simplex,
    OpenSimplex2("OpenSimplex2") => OpenSimplex2,
    Perlin("Perlin") => Perlin,
    Value("Value") => Value,
    DomainScale("DomainScale") => DomainScale,
    DomainOffset("DomainOffset") => DomainOffset,
    DomainRotate("DomainRotate") => DomainRotate,
    DomainAxisScale("DomainAxisScale") => DomainAxisScale,
    AddDimension("AddDimension") => AddDimension,
    RemoveDimension("RemoveDimension") => RemoveDimension,
    SeedOffset("SeedOffset") => SeedOffset,
    Remap("Remap") => Remap,
    Terrace("Terrace") => Terrace,
    ConvertRgba8("ConvertRGBA8") => ConvertRgba8,
    GeneratorCache("GeneratorCache") => GeneratorCache,
    FractalFBm("FractalFBm") => FractalFBm,
    FractalRidged("FractalRidged") => FractalRidged,
    FractalPingPong("FractalPingPong") => FractalPingPong,
    CellularValue("CellularValue") => CellularValue,
    CellularDistance("CellularDistance") => CellularDistance,
    CellularLookup("CellularLookup") => CellularLookup,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NodeKind {
    type Err = NoiseError;

    /// Case-insensitive match on the display name.
    fn from_str(s: &str) -> Result<Self, NoiseError> {
        NodeKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| NoiseError::UnknownNode(s.to_string()))
    }
}
