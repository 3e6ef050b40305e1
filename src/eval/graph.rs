// eval/graph.rs - Node handles → flat, indexed evaluation graph
//
// The pre-walk runs a depth-first traversal from the terminal node and
// lowers every reachable node exactly once (shared subgraphs are
// deduplicated by `NodeId`). Children are emitted before their parents, so
// the terminal is always the last op.
//
// All graph-level validation happens here, before any sample is taken:
//   - empty required slots            → `UnboundSource`
//   - back-edges (node still on stack) → `GraphCycle`
//   - parameter combinations          → `InvalidParameter`
//
// Both the pre-walk and evaluation recurse once per graph level. Chain depth
// is therefore bounded by the thread's stack: a very long chain (around
// 10^5 transform nodes) overflows it.

use crate::error::{NoiseError, Result};
use crate::eval::compiled::{Op, Param};
use crate::node::{Generator, HybridSource, NodeId, SourceSlot};
use rustc_hash::{FxHashMap, FxHashSet};

/// Compiled graph ready for evaluation.
#[derive(Debug, Clone)]
pub struct EvalGraph {
    ops: Vec<Op>,
    root: u32,
}

impl EvalGraph {
    /// Lower everything reachable from `terminal`.
    pub fn compile(terminal: &Generator) -> Result<EvalGraph> {
        let mut builder = Builder::default();
        let root = builder.compile(terminal)?;
        tracing::debug!(
            terminal = terminal.kind().name(),
            nodes = builder.ops.len(),
            "compiled noise graph"
        );
        Ok(EvalGraph {
            ops: builder.ops,
            root,
        })
    }

    #[inline]
    pub fn root(&self) -> u32 {
        self.root
    }

    #[inline]
    pub fn op(&self, idx: u32) -> &Op {
        &self.ops[idx as usize]
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// True when the terminal's value is a packed RGBA8 word.
    ///
    /// Follows point-, seed- and memo-only ops down from the root.
    pub fn output_is_packed(&self) -> bool {
        let mut idx = self.root;
        loop {
            let op = self.op(idx);
            if matches!(op, Op::ConvertRgba8 { .. }) {
                return true;
            }
            match op.value_passthrough() {
                Some(next) => idx = next,
                None => return false,
            }
        }
    }
}

// ── Pre-walk ────────────────────────────────────────────────────────

#[derive(Default)]
struct Builder {
    ops: Vec<Op>,
    compiled: FxHashMap<NodeId, u32>,
    visiting: FxHashSet<NodeId>,
}

impl Builder {
    fn compile(&mut self, gen: &Generator) -> Result<u32> {
        let id = gen.id();
        if let Some(&idx) = self.compiled.get(&id) {
            return Ok(idx);
        }
        let kind = gen.kind();
        // Checked before the node is read-locked again further down the stack.
        if !self.visiting.insert(id) {
            return Err(NoiseError::GraphCycle { node: kind.name() });
        }

        let op = gen.lower(&mut Lowering {
            builder: self,
            node: kind.name(),
        })?;

        self.visiting.remove(&id);
        let idx = self.ops.len() as u32;
        self.ops.push(op);
        self.compiled.insert(id, idx);
        Ok(idx)
    }
}

/// Handed to `Node::lower` so a record can compile its sources.
pub struct Lowering<'a> {
    builder: &'a mut Builder,
    node: &'static str,
}

impl Lowering<'_> {
    /// Compile a required source slot.
    pub fn source(&mut self, slot: &'static str, source: &SourceSlot) -> Result<u32> {
        let gen = source.get().ok_or(NoiseError::UnboundSource {
            node: self.node,
            slot,
        })?;
        self.builder.compile(gen)
    }

    /// Compile a scalar-or-source parameter.
    pub fn param(&mut self, value: &HybridSource) -> Result<Param> {
        match value {
            HybridSource::Constant(v) => Ok(Param::Const(*v)),
            HybridSource::Source(gen) => Ok(Param::Source(self.builder.compile(gen)?)),
        }
    }

    /// Invalid parameter error attributed to the node being lowered.
    pub fn invalid(&self, param: &'static str, reason: impl Into<String>) -> NoiseError {
        NoiseError::invalid(self.node, param, reason)
    }
}
