// node/mod.rs - Node records, shared handles and source binding
//
// A node is a plain parameter record (`Simplex`, `DomainScale`, ...) kept
// behind a `parking_lot::RwLock` inside an `Arc`. User code only holds
// handles: `SmartNode<T>` for the typed setters, `Generator` once the
// concrete type no longer matters. Source slots store `Generator`s, so a
// parent keeps its whole subgraph alive and dropping the last handle to a
// root releases everything only it reached.
//
// Evaluation never reads these records directly; `EvalGraph::compile`
// lowers the reachable graph into a flat `Op` list first.

mod cellular;
mod domain;
mod fractal;
mod generators;
mod hybrid;
mod modifiers;
mod registry;

pub use cellular::{
    Cellular, CellularDistance, CellularLookup, CellularParams, CellularReturnType,
    CellularValue, DistanceFunction,
};
pub use domain::{
    AddDimension, DomainAxisScale, DomainOffset, DomainRotate, DomainScale, RemoveDimension,
    SeedOffset,
};
pub use fractal::{Fractal, FractalFBm, FractalParams, FractalPingPong, FractalRidged};
pub use generators::{OpenSimplex2, Perlin, Simplex, Value};
pub use hybrid::{Dim, HybridSource, SourceSlot};
pub use modifiers::{
    pack_rgba8, unpack_rgba8, ConvertRgba8, GeneratorCache, Remap, Terrace,
};
pub(crate) use modifiers::rgba8_grey;
pub use registry::NodeKind;

use crate::error::{NoiseError, Result};
use crate::eval::compiled::Op;
use crate::eval::graph::Lowering;
use crate::simd::SimdTier;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Sources a node currently references (slots and hybrid parameters).
pub type SourceList = SmallVec<[Generator; 4]>;

/// Process-unique node identity, stable for the node's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        NodeId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

// ── Node trait ──────────────────────────────────────────────────────

/// Parameter record of one concrete node variant.
pub trait Node: Default + Send + Sync + 'static {
    const KIND: NodeKind;

    /// Every generator this record references.
    fn sources(&self) -> SourceList;

    /// Validate the record and turn it into a compiled op, compiling its
    /// sources through `cx`.
    fn lower(&self, cx: &mut Lowering<'_>) -> Result<Op>;
}

/// Node variants driven by a single `source` slot.
pub trait HasSource: Node {
    fn source_slot(&mut self) -> &mut SourceSlot;
}

// ── Type-erased cell ────────────────────────────────────────────────

struct NodeCell<T> {
    id: NodeId,
    tier: SimdTier,
    node: RwLock<T>,
}

pub(crate) trait ErasedNode: Send + Sync {
    fn id(&self) -> NodeId;
    fn kind(&self) -> NodeKind;
    fn simd_tier(&self) -> SimdTier;
    fn sources(&self) -> SourceList;
    fn lower(&self, cx: &mut Lowering<'_>) -> Result<Op>;
}

impl<T: Node> ErasedNode for NodeCell<T> {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> NodeKind {
        T::KIND
    }

    fn simd_tier(&self) -> SimdTier {
        self.tier
    }

    fn sources(&self) -> SourceList {
        self.node.read().sources()
    }

    fn lower(&self, cx: &mut Lowering<'_>) -> Result<Op> {
        self.node.read().lower(cx)
    }
}

// ── Generator ───────────────────────────────────────────────────────

/// Type-erased shared handle to any node.
///
/// Cloning bumps an atomic reference count; the node is dropped with its
/// last handle (including handles held in other nodes' source slots).
#[derive(Clone)]
pub struct Generator {
    cell: Arc<dyn ErasedNode>,
}

impl Generator {
    pub fn id(&self) -> NodeId {
        self.cell.id()
    }

    pub fn kind(&self) -> NodeKind {
        self.cell.kind()
    }

    /// SIMD tier captured when the node was created.
    pub fn simd_tier(&self) -> SimdTier {
        self.cell.simd_tier()
    }

    /// Non-owning handle that observes whether the node is still alive.
    pub fn downgrade(&self) -> WeakGenerator {
        WeakGenerator {
            cell: Arc::downgrade(&self.cell),
        }
    }

    /// True when both handles refer to the same node.
    pub fn same_node(&self, other: &Generator) -> bool {
        self.id() == other.id()
    }

    pub(crate) fn sources(&self) -> SourceList {
        self.cell.sources()
    }

    pub(crate) fn lower(&self, cx: &mut Lowering<'_>) -> Result<Op> {
        self.cell.lower(cx)
    }

    /// True when `target` is this node or can be reached through its sources.
    pub(crate) fn reaches(&self, target: NodeId) -> bool {
        let mut seen = FxHashSet::default();
        let mut stack: Vec<Generator> = vec![self.clone()];
        while let Some(gen) = stack.pop() {
            let id = gen.id();
            if id == target {
                return true;
            }
            if seen.insert(id) {
                stack.extend(gen.sources());
            }
        }
        false
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("kind", &self.kind())
            .field("id", &self.id())
            .finish()
    }
}

/// Weak counterpart of `Generator`.
#[derive(Clone)]
pub struct WeakGenerator {
    cell: Weak<dyn ErasedNode>,
}

impl WeakGenerator {
    pub fn upgrade(&self) -> Option<Generator> {
        self.cell.upgrade().map(|cell| Generator { cell })
    }

    pub fn is_alive(&self) -> bool {
        self.cell.strong_count() > 0
    }
}

impl fmt::Debug for WeakGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakGenerator")
            .field("alive", &self.is_alive())
            .finish()
    }
}

// ── SmartNode ───────────────────────────────────────────────────────

/// Typed shared handle returned by every node factory.
///
/// Dereferences to `Generator`, so a `&SmartNode<T>` can be passed wherever
/// a source is expected.
pub struct SmartNode<T: Node> {
    cell: Arc<NodeCell<T>>,
    generator: Generator,
}

impl<T: Node> SmartNode<T> {
    pub(crate) fn from_node(node: T) -> Self {
        let cell = Arc::new(NodeCell {
            id: NodeId::next(),
            tier: SimdTier::detect(),
            node: RwLock::new(node),
        });
        let erased: Arc<dyn ErasedNode> = cell.clone();
        SmartNode {
            cell,
            generator: Generator { cell: erased },
        }
    }

    /// Read access to the parameter record.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.cell.node.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.cell.node.write()
    }

    /// Type-erased handle to the same node.
    pub fn generator(&self) -> Generator {
        self.generator.clone()
    }

    /// Refuse `source` if it can already reach this node.
    ///
    /// Must run before taking the write lock: the walk read-locks every
    /// node it visits.
    fn ensure_acyclic(&self, source: &Generator) -> Result<()> {
        if source.reaches(self.cell.id) {
            return Err(NoiseError::GraphCycle {
                node: T::KIND.name(),
            });
        }
        Ok(())
    }

    /// Bind `source` into the slot picked by `slot`.
    pub(crate) fn bind(
        &self,
        source: &Generator,
        slot: impl FnOnce(&mut T) -> &mut SourceSlot,
    ) -> Result<()> {
        self.ensure_acyclic(source)?;
        tracing::trace!(node = T::KIND.name(), source = source.kind().name(), "bound source");
        let mut node = self.write();
        slot(&mut *node).set(source.clone());
        Ok(())
    }

    /// Store a scalar-or-source value into the parameter picked by `slot`.
    pub(crate) fn bind_hybrid(
        &self,
        param: &'static str,
        value: HybridSource,
        slot: impl FnOnce(&mut T) -> &mut HybridSource,
    ) -> Result<()> {
        match &value {
            HybridSource::Constant(v) => {
                check_finite(T::KIND.name(), param, *v)?;
            }
            HybridSource::Source(source) => {
                self.ensure_acyclic(source)?;
            }
        }
        let mut node = self.write();
        *slot(&mut *node) = value;
        Ok(())
    }
}

impl<T: HasSource> SmartNode<T> {
    /// Bind the node this one transforms. Last write wins.
    pub fn set_source(&self, source: &Generator) -> Result<()> {
        self.bind(source, T::source_slot)
    }
}

impl<T: Node> Clone for SmartNode<T> {
    fn clone(&self) -> Self {
        SmartNode {
            cell: Arc::clone(&self.cell),
            generator: self.generator.clone(),
        }
    }
}

impl<T: Node> Deref for SmartNode<T> {
    type Target = Generator;

    fn deref(&self) -> &Generator {
        &self.generator
    }
}

impl<T: Node> fmt::Debug for SmartNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmartNode")
            .field("kind", &T::KIND)
            .field("id", &self.cell.id)
            .finish()
    }
}

impl<T: Node> From<SmartNode<T>> for Generator {
    fn from(node: SmartNode<T>) -> Generator {
        node.generator
    }
}

impl<T: Node> From<&SmartNode<T>> for Generator {
    fn from(node: &SmartNode<T>) -> Generator {
        node.generator.clone()
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

pub(crate) fn check_finite(node: &'static str, param: &'static str, value: f32) -> Result<f32> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(NoiseError::invalid(node, param, format!("{value} is not finite")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = Simplex::new();
        let b = Simplex::new();
        assert_ne!(a.id(), b.id());
        assert!(a.same_node(&a.generator()));
        assert!(!a.same_node(&b));
    }

    #[test]
    fn smart_node_derefs_to_generator() {
        let perlin = Perlin::new();
        assert_eq!(perlin.kind(), NodeKind::Perlin);
        assert_eq!(perlin.simd_tier(), SimdTier::detect());
        let erased: Generator = (&perlin).into();
        assert_eq!(erased.id(), perlin.id());
    }

    #[test]
    fn set_source_records_child() {
        let scale = DomainScale::new();
        let simplex = Simplex::new();
        scale.set_source(&simplex).unwrap();
        let sources = scale.generator().sources();
        assert_eq!(sources.len(), 1);
        assert!(sources[0].same_node(&simplex));
    }

    #[test]
    fn self_binding_is_a_cycle() {
        let scale = DomainScale::new();
        let err = scale.set_source(&scale).unwrap_err();
        assert!(matches!(err, NoiseError::GraphCycle { node: "DomainScale" }));
    }

    #[test]
    fn indirect_cycle_rejected_at_bind_time() {
        let a = DomainScale::new();
        let b = SeedOffset::new();
        let c = Remap::new();
        a.set_source(&b).unwrap();
        b.set_source(&c).unwrap();
        let err = c.set_source(&a).unwrap_err();
        assert!(matches!(err, NoiseError::GraphCycle { node: "Remap" }));
        // the rejected edge left the slot untouched
        assert!(c.read().source.get().is_none());
    }

    #[test]
    fn hybrid_cycle_rejected() {
        let fbm = FractalFBm::new();
        let offset = DomainOffset::new();
        fbm.set_source(&offset).unwrap();
        let err = offset.set_offset(Dim::X, &fbm).unwrap_err();
        assert!(matches!(err, NoiseError::GraphCycle { .. }));
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let perlin = Perlin::new();
        let fbm = FractalFBm::new();
        fbm.set_source(&perlin).unwrap();
        fbm.set_gain(&perlin).unwrap();
        assert_eq!(fbm.generator().sources().len(), 2);
    }

    #[test]
    fn weak_handle_tracks_lifetime() {
        let perlin = Perlin::new();
        let weak = perlin.downgrade();
        let scale = DomainScale::new();
        scale.set_source(&perlin).unwrap();

        drop(perlin);
        // still owned by the parent's slot
        let alive = weak.upgrade().expect("held by DomainScale");
        assert_eq!(alive.kind(), NodeKind::Perlin);
        drop(alive);

        drop(scale);
        assert!(!weak.is_alive());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn rebinding_releases_previous_source() {
        let first = Simplex::new();
        let weak = first.downgrade();
        let scale = DomainScale::new();
        scale.set_source(&first).unwrap();
        drop(first);
        assert!(weak.is_alive());

        scale.set_source(&Value::new()).unwrap();
        assert!(!weak.is_alive());
    }

    #[test]
    fn non_finite_hybrid_constant_rejected() {
        let fbm = FractalFBm::new();
        let err = fbm.set_gain(f32::NAN).unwrap_err();
        assert!(matches!(err, NoiseError::InvalidParameter { param: "gain", .. }));
    }
}
