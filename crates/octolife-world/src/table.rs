use std::hash::{BuildHasher, BuildHasherDefault, DefaultHasher};
use std::sync::Arc;

use hashbrown::HashMap;
use octolife_blocks::Block;
use octolife_geom::IVec3;

use crate::node::{
    LEAF_CELLS, LEAF_LEVEL, MAX_LEVEL, Node, NodeData, NodeRef, octant_offset,
};

/// Deterministic structural hasher used when none is supplied.
pub type FixedState = BuildHasherDefault<DefaultHasher>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TableStats {
    pub nodes: usize,
    pub buckets: usize,
    pub uniform_cached: usize,
    pub hits: u64,
    pub misses: u64,
    /// Lookups that landed in a non-empty bucket without a content match.
    pub collisions: u64,
}

/// Hash-consing table: structurally equal content always yields the same
/// [`NodeRef`].
///
/// Buckets are keyed by the structural hash computed with `S`; entries in a
/// bucket are told apart by comparing content (cells for leaves, child
/// identity for internal nodes), so hash collisions never merge nodes.
pub struct NodeTable<S = FixedState> {
    buckets: HashMap<u64, Vec<NodeRef>>,
    uniforms: HashMap<(Block, u8), NodeRef>,
    len: usize,
    hasher: S,
    hits: u64,
    misses: u64,
    collisions: u64,
}

impl NodeTable<FixedState> {
    pub fn new() -> Self {
        Self::with_hasher(FixedState::default())
    }
}

impl Default for NodeTable<FixedState> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: BuildHasher> NodeTable<S> {
    pub fn with_hasher(hasher: S) -> Self {
        NodeTable {
            buckets: HashMap::new(),
            uniforms: HashMap::new(),
            len: 0,
            hasher,
            hits: 0,
            misses: 0,
            collisions: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    pub fn intern_leaf(&mut self, cells: [Block; LEAF_CELLS]) -> NodeRef {
        let hash = self.hasher.hash_one((LEAF_LEVEL, &cells[..]));
        let bucket = self.buckets.entry(hash).or_default();
        if let Some(found) = bucket
            .iter()
            .find(|n| n.leaf_cells().is_some_and(|c| *c == cells))
        {
            self.hits += 1;
            return Arc::clone(found);
        }
        if !bucket.is_empty() {
            self.collisions += 1;
        }
        let first = cells[0];
        let uniform = cells.iter().all(|b| *b == first).then_some(first);
        let node = Arc::new(Node::new(
            LEAF_LEVEL,
            hash,
            uniform,
            NodeData::Leaf(Box::new(cells)),
        ));
        bucket.push(Arc::clone(&node));
        self.misses += 1;
        self.len += 1;
        node
    }

    pub fn intern_internal(&mut self, children: [NodeRef; 8]) -> NodeRef {
        let child_level = children[0].level();
        assert!(
            children.iter().all(|c| c.level() == child_level),
            "children of an internal node must share one level"
        );
        assert!(
            child_level < MAX_LEVEL,
            "internal node would exceed level {MAX_LEVEL}"
        );
        let level = child_level + 1;
        let child_hashes: [u64; 8] = std::array::from_fn(|o| children[o].structural_hash());
        let hash = self.hasher.hash_one((level, child_hashes));
        let bucket = self.buckets.entry(hash).or_default();
        if let Some(found) = bucket.iter().find(|n| {
            n.level() == level
                && n.children().is_some_and(|c| {
                    c.iter().zip(children.iter()).all(|(a, b)| Arc::ptr_eq(a, b))
                })
        }) {
            self.hits += 1;
            return Arc::clone(found);
        }
        if !bucket.is_empty() {
            self.collisions += 1;
        }
        let uniform = children[0]
            .uniform()
            .filter(|b| children.iter().all(|c| c.uniform() == Some(*b)));
        let node = Arc::new(Node::new(
            level,
            hash,
            uniform,
            NodeData::Internal(children),
        ));
        bucket.push(Arc::clone(&node));
        self.misses += 1;
        self.len += 1;
        node
    }

    /// Canonical node of `level` filled with `block`.
    pub fn uniform(&mut self, level: u8, block: Block) -> NodeRef {
        assert!(
            (LEAF_LEVEL..=MAX_LEVEL).contains(&level),
            "uniform node level {level} out of range"
        );
        if let Some(n) = self.uniforms.get(&(block, level)) {
            return Arc::clone(n);
        }
        let node = if level == LEAF_LEVEL {
            self.intern_leaf([block; LEAF_CELLS])
        } else {
            let c = self.uniform(level - 1, block);
            self.intern_internal(std::array::from_fn(|_| Arc::clone(&c)))
        };
        self.uniforms.insert((block, level), Arc::clone(&node));
        node
    }

    /// Interns the cube of `level` whose minimum corner is `min`, reading
    /// cells from `f`.
    pub fn build(&mut self, level: u8, min: IVec3, f: &impl Fn(IVec3) -> Block) -> NodeRef {
        assert!(level >= LEAF_LEVEL, "cannot build below the leaf level");
        if level == LEAF_LEVEL {
            let cells = std::array::from_fn(|i| {
                f(min + IVec3::new((i & 3) as i32, ((i >> 2) & 3) as i32, (i >> 4) as i32))
            });
            return self.intern_leaf(cells);
        }
        let half = 1i32 << (level - 1);
        let children = std::array::from_fn(|o| self.build(level - 1, min + octant_offset(o) * half, f));
        self.intern_internal(children)
    }

    /// True when `node` is the canonical entry for its content in this table.
    pub fn contains(&self, node: &NodeRef) -> bool {
        self.buckets
            .get(&node.structural_hash())
            .is_some_and(|b| b.iter().any(|n| Arc::ptr_eq(n, node)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeRef> {
        self.buckets.values().flatten()
    }

    /// Drops every entry for which `keep` is false; returns how many were
    /// removed.
    pub(crate) fn retain(&mut self, keep: impl Fn(&NodeRef) -> bool) -> usize {
        let before = self.len;
        self.buckets.retain(|_, bucket| {
            bucket.retain(|n| keep(n));
            !bucket.is_empty()
        });
        self.uniforms.retain(|_, n| keep(n));
        self.len = self.buckets.values().map(Vec::len).sum();
        before - self.len
    }

    pub fn stats(&self) -> TableStats {
        TableStats {
            nodes: self.len,
            buckets: self.buckets.len(),
            uniform_cached: self.uniforms.len(),
            hits: self.hits,
            misses: self.misses,
            collisions: self.collisions,
        }
    }
}
