use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use octolife_blocks::{Block, BlockAction};
use octolife_geom::IVec3;

/// Level of leaf nodes: a leaf holds `4×4×4` cells.
pub const LEAF_LEVEL: u8 = 2;
pub const LEAF_SIDE: usize = 1 << LEAF_LEVEL;
pub const LEAF_CELLS: usize = LEAF_SIDE * LEAF_SIDE * LEAF_SIDE;
/// Largest level a node may have.
pub const MAX_LEVEL: u8 = 30;

pub type NodeRef = Arc<Node>;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a canonical node. Never reused within a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Octant of a child: bit set means the upper half on that axis.
#[inline]
pub const fn octant(x: usize, y: usize, z: usize) -> usize {
    x | (y << 1) | (z << 2)
}

#[inline]
pub fn octant_offset(o: usize) -> IVec3 {
    IVec3::new((o & 1) as i32, ((o >> 1) & 1) as i32, ((o >> 2) & 1) as i32)
}

#[inline]
pub const fn leaf_index(x: usize, y: usize, z: usize) -> usize {
    x | (y << LEAF_LEVEL) | (z << (2 * LEAF_LEVEL))
}

/// Memoized result of stepping a node: its centered interior advanced one
/// world step, plus the actions produced inside that interior with positions
/// relative to the stepped node's minimum corner.
#[derive(Clone, Debug)]
pub struct StepResult {
    pub node: NodeRef,
    pub actions: Arc<[BlockAction]>,
}

pub(crate) enum NodeData {
    Leaf(Box<[Block; LEAF_CELLS]>),
    Internal([NodeRef; 8]),
}

/// Immutable cube of `2^level` cells per side. Only [`crate::NodeTable`]
/// creates nodes, so two live nodes with equal content are the same object.
pub struct Node {
    id: NodeId,
    level: u8,
    hash: u64,
    uniform: Option<Block>,
    pub(crate) data: NodeData,
    pub(crate) memo: OnceLock<StepResult>,
}

impl Node {
    pub(crate) fn new(level: u8, hash: u64, uniform: Option<Block>, data: NodeData) -> Self {
        Node {
            id: NodeId::next(),
            level,
            hash,
            uniform,
            data,
            memo: OnceLock::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn level(&self) -> u8 {
        self.level
    }

    #[inline]
    pub fn side(&self) -> i64 {
        1i64 << self.level
    }

    #[inline]
    pub fn structural_hash(&self) -> u64 {
        self.hash
    }

    /// The block filling every cell, if the node is uniform.
    #[inline]
    pub fn uniform(&self) -> Option<Block> {
        self.uniform
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.data, NodeData::Leaf(_))
    }

    #[inline]
    pub fn children(&self) -> Option<&[NodeRef; 8]> {
        match &self.data {
            NodeData::Internal(c) => Some(c),
            NodeData::Leaf(_) => None,
        }
    }

    #[inline]
    pub fn leaf_cells(&self) -> Option<&[Block; LEAF_CELLS]> {
        match &self.data {
            NodeData::Leaf(c) => Some(c),
            NodeData::Internal(_) => None,
        }
    }

    /// Child at octant `o`. Panics on leaves.
    #[inline]
    pub(crate) fn child(&self, o: usize) -> &NodeRef {
        match &self.data {
            NodeData::Internal(c) => &c[o],
            NodeData::Leaf(_) => panic!("leaf node {:?} has no children", self.id),
        }
    }

    /// Cached step result, if this node has been stepped.
    #[inline]
    pub fn memo(&self) -> Option<&StepResult> {
        self.memo.get()
    }

    /// Cell at `p` relative to the node's minimum corner.
    pub fn get(&self, p: IVec3) -> Block {
        let side = self.side();
        let inside = |v: i32| v >= 0 && (v as i64) < side;
        assert!(
            inside(p.x) && inside(p.y) && inside(p.z),
            "{p:?} outside node of level {}",
            self.level
        );
        let mut node = self;
        let mut p = p;
        loop {
            if let Some(b) = node.uniform {
                return b;
            }
            match &node.data {
                NodeData::Leaf(cells) => {
                    return cells[leaf_index(p.x as usize, p.y as usize, p.z as usize)];
                }
                NodeData::Internal(children) => {
                    let half = 1i32 << (node.level - 1);
                    let o = octant(
                        (p.x >= half) as usize,
                        (p.y >= half) as usize,
                        (p.z >= half) as usize,
                    );
                    p -= octant_offset(o) * half;
                    node = children[o].as_ref();
                }
            }
        }
    }

    /// Calls `f` with every cell of the node inside `[lo, hi)`, where all
    /// coordinates are in the frame in which the node's minimum corner is `min`.
    pub fn for_each_in(
        &self,
        min: IVec3,
        lo: IVec3,
        hi: IVec3,
        f: &mut impl FnMut(IVec3, Block),
    ) {
        let side = self.side();
        let (nlo, nhi) = clip(min, side, lo, hi);
        if !nlo.all_lt(nhi) {
            return;
        }
        if let Some(b) = self.uniform {
            for_each_point(nlo, nhi, |p| f(p, b));
            return;
        }
        match &self.data {
            NodeData::Leaf(cells) => for_each_point(nlo, nhi, |p| {
                let l = p - min;
                f(p, cells[leaf_index(l.x as usize, l.y as usize, l.z as usize)]);
            }),
            NodeData::Internal(children) => {
                let half = 1i32 << (self.level - 1);
                for (o, child) in children.iter().enumerate() {
                    child.for_each_in(min + octant_offset(o) * half, lo, hi, f);
                }
            }
        }
    }
}

/// Intersection of the cube `[min, min + side)` with `[lo, hi)`.
#[inline]
pub(crate) fn clip(min: IVec3, side: i64, lo: IVec3, hi: IVec3) -> (IVec3, IVec3) {
    let max = |v: i32| (v as i64 + side).min(i32::MAX as i64) as i32;
    let nmax = IVec3::new(max(min.x), max(min.y), max(min.z));
    (lo.max(min), hi.min(nmax))
}

#[inline]
pub(crate) fn for_each_point(lo: IVec3, hi: IVec3, mut f: impl FnMut(IVec3)) {
    for z in lo.z..hi.z {
        for y in lo.y..hi.y {
            for x in lo.x..hi.x {
                f(IVec3::new(x, y, z));
            }
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("level", &self.level)
            .field("uniform", &self.uniform)
            .field("stepped", &self.memo.get().is_some())
            .finish()
    }
}

/// True when `a` and `b` hold the same cells. Canonical nodes from one table
/// compare by identity; this walks content so nodes from different tables can
/// be compared too.
pub fn same_content(a: &Node, b: &Node) -> bool {
    if std::ptr::eq(a, b) {
        return true;
    }
    if a.level != b.level {
        return false;
    }
    if let (Some(x), Some(y)) = (a.uniform, b.uniform) {
        return x == y;
    }
    match (&a.data, &b.data) {
        (NodeData::Leaf(x), NodeData::Leaf(y)) => x == y,
        (NodeData::Internal(x), NodeData::Internal(y)) => {
            x.iter().zip(y.iter()).all(|(c, d)| same_content(c, d))
        }
        _ => false,
    }
}
