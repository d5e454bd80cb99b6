//! Memoized macrocell stepping.
//!
//! `step_node` maps a node of level `L` to its centered level `L-1` interior
//! advanced by a fixed number of generations `G`. Nodes at the base level are
//! simulated cell by cell; larger nodes are assembled from 27 overlapping
//! sub-steps, so repeated structure is only ever simulated once.

use std::cmp::Ordering;
use std::hash::BuildHasher;
use std::sync::Arc;

use hashbrown::HashMap;
use octolife_blocks::{
    Block, BlockAction, BlockStepResult, GlobalStepState, Neighborhood, TransitionFunction,
};
use octolife_geom::IVec3;

use crate::node::{
    LEAF_LEVEL, LEAF_SIDE, MAX_LEVEL, NodeData, NodeRef, StepResult, leaf_index, octant,
    octant_offset,
};
use crate::table::NodeTable;

pub const MAX_GENERATIONS_PER_STEP: u32 = 16;

/// Smallest level that can be advanced `generations` at once: the margin
/// `2^(level-2)` must cover one cell per generation.
pub fn base_level(generations: u32) -> u8 {
    assert!(
        (1..=MAX_GENERATIONS_PER_STEP).contains(&generations),
        "generations per step must be in 1..={MAX_GENERATIONS_PER_STEP}, got {generations}"
    );
    let ceil_log2 = u32::BITS - (generations - 1).leading_zeros();
    (LEAF_LEVEL + 1).max(2 + ceil_log2 as u8)
}

/// Picks the winning candidate for one cell: highest priority first, equal
/// priorities folded with the transition's `combine`.
pub fn resolve(
    transition: &dyn TransitionFunction,
    candidates: &mut Vec<BlockStepResult>,
) -> Option<BlockStepResult> {
    let mut best: Option<BlockStepResult> = None;
    for cand in candidates.drain(..) {
        best = Some(match best {
            None => cand,
            Some(cur) => match cand.priority.cmp(&cur.priority) {
                Ordering::Greater => cand,
                Ordering::Less => cur,
                Ordering::Equal => transition.combine(cur, cand),
            },
        });
    }
    best
}

pub struct Stepper {
    transition: Arc<dyn TransitionFunction>,
    generations: u32,
    base_level: u8,
    global: GlobalStepState,
    uniform_identity: HashMap<Block, bool>,
    candidates: Vec<BlockStepResult>,
    counters: StepCounters,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepCounters {
    pub memo_hits: u64,
    pub base_steps: u64,
    pub recursive_steps: u64,
    pub uniform_skips: u64,
}

impl Stepper {
    pub fn new(
        transition: Arc<dyn TransitionFunction>,
        generations: u32,
        global: GlobalStepState,
    ) -> Self {
        let base_level = base_level(generations);
        Stepper {
            transition,
            generations,
            base_level,
            global,
            uniform_identity: HashMap::new(),
            candidates: Vec::new(),
            counters: StepCounters::default(),
        }
    }

    #[inline]
    pub fn generations(&self) -> u32 {
        self.generations
    }

    #[inline]
    pub fn base_level(&self) -> u8 {
        self.base_level
    }

    #[inline]
    pub fn global(&self) -> &GlobalStepState {
        &self.global
    }

    #[inline]
    pub fn counters(&self) -> StepCounters {
        self.counters
    }

    pub fn transition(&self) -> &Arc<dyn TransitionFunction> {
        &self.transition
    }

    /// Memo slots only hold results for one global state, so callers must
    /// pair this with a fresh table.
    pub(crate) fn reset_global(&mut self, global: GlobalStepState) {
        self.global = global;
        self.uniform_identity.clear();
    }

    /// Centered interior of `node` advanced one world step.
    pub fn step_node<S: BuildHasher>(&mut self, table: &mut NodeTable<S>, node: &NodeRef) -> StepResult {
        let level = node.level();
        assert!(
            (self.base_level..=MAX_LEVEL).contains(&level),
            "cannot step a node of level {level}; base level is {}",
            self.base_level
        );
        if let Some(done) = node.memo.get() {
            self.counters.memo_hits += 1;
            return done.clone();
        }
        let result = match node.uniform() {
            Some(b) if self.is_identity_on(b) => {
                self.counters.uniform_skips += 1;
                StepResult {
                    node: table.uniform(level - 1, b),
                    actions: Arc::from([]),
                }
            }
            _ if level == self.base_level => {
                self.counters.base_steps += 1;
                self.step_base(table, node)
            }
            _ => {
                self.counters.recursive_steps += 1;
                self.step_recursive(table, node)
            }
        };
        // Single mutator, so the slot is empty here.
        let _ = node.memo.set(result.clone());
        result
    }

    fn is_identity_on(&mut self, b: Block) -> bool {
        if b == Block::OUTSIDE {
            return true;
        }
        if let Some(known) = self.uniform_identity.get(&b) {
            return *known;
        }
        let mut out = std::mem::take(&mut self.candidates);
        self.transition
            .step(&Neighborhood::uniform(b), &self.global, &mut out);
        let identity = match resolve(self.transition.as_ref(), &mut out) {
            None => true,
            Some(r) => r.block == b && r.actions.is_empty(),
        };
        self.candidates = out;
        self.uniform_identity.insert(b, identity);
        identity
    }

    fn step_base<S: BuildHasher>(&mut self, table: &mut NodeTable<S>, node: &NodeRef) -> StepResult {
        let side = node.side() as usize;
        let mut cur = vec![Block::AIR; side * side * side];
        flatten(node, &mut cur, side, 0, 0, 0);
        let mut next = cur.clone();
        let idx = |x: usize, y: usize, z: usize| (z * side + y) * side + x;
        let (out_lo, out_hi) = (side / 4, 3 * side / 4);
        let in_output = |x: usize, y: usize, z: usize| {
            (out_lo..out_hi).contains(&x) && (out_lo..out_hi).contains(&y) && (out_lo..out_hi).contains(&z)
        };

        let mut actions: Vec<BlockAction> = Vec::new();
        let mut cands = std::mem::take(&mut self.candidates);
        // Outside cells never change and read as the boundary block.
        let boundary = self.global.boundary;
        for generation in 0..self.generations {
            let g = generation as usize;
            let (lo, hi) = (g + 1, side - g - 1);
            for z in lo..hi {
                for y in lo..hi {
                    for x in lo..hi {
                        let i = idx(x, y, z);
                        if cur[i] == Block::OUTSIDE {
                            continue;
                        }
                        let mut n = Neighborhood::uniform(Block::AIR);
                        for dz in 0..3 {
                            for dy in 0..3 {
                                for dx in 0..3 {
                                    let c = cur[idx(x + dx - 1, y + dy - 1, z + dz - 1)];
                                    n.blocks[dz * 9 + dy * 3 + dx] =
                                        if c == Block::OUTSIDE { boundary } else { c };
                                }
                            }
                        }
                        self.transition.step(&n, &self.global, &mut cands);
                        match resolve(self.transition.as_ref(), &mut cands) {
                            Some(res) => {
                                next[i] = res.block;
                                if in_output(x, y, z) {
                                    let at = IVec3::new(x as i32, y as i32, z as i32);
                                    actions.extend(res.actions.into_iter().map(|a| BlockAction {
                                        position: at + a.position,
                                        generation: generation + a.generation,
                                        kind: a.kind,
                                    }));
                                }
                            }
                            None => next[i] = cur[i],
                        }
                    }
                }
            }
            std::mem::swap(&mut cur, &mut next);
        }
        self.candidates = cands;

        let q = (side / 4) as i32;
        let center = table.build(node.level() - 1, IVec3::splat(q), &|p: IVec3| {
            cur[idx(p.x as usize, p.y as usize, p.z as usize)]
        });
        StepResult {
            node: center,
            actions: actions.into(),
        }
    }

    fn step_recursive<S: BuildHasher>(&mut self, table: &mut NodeTable<S>, node: &NodeRef) -> StepResult {
        let level = node.level();
        let q = 1i32 << (level - 2);
        let (out_lo, out_hi) = (IVec3::splat(q), IVec3::splat(3 * q));
        let mut actions: Vec<BlockAction> = Vec::new();
        let mut results: Vec<NodeRef> = Vec::with_capacity(27);
        for k in 0..3 {
            for j in 0..3 {
                for i in 0..3 {
                    let sub = table.intern_internal(std::array::from_fn(|o| {
                        let d = octant_offset(o);
                        Arc::clone(grandchild(node, i + d.x as usize, j + d.y as usize, k + d.z as usize))
                    }));
                    let res = self.step_node(table, &sub);
                    let shift = IVec3::new(i as i32, j as i32, k as i32) * q;
                    actions.extend(res.actions.iter().filter_map(|a| {
                        let p = a.position + shift;
                        (p.all_ge(out_lo) && p.all_lt(out_hi)).then_some(BlockAction { position: p, ..*a })
                    }));
                    results.push(res.node);
                }
            }
        }

        let at = |i: usize, j: usize, k: usize| (k * 3 + j) * 3 + i;
        let centers: [NodeRef; 8] = std::array::from_fn(|o| {
            let w = octant_offset(o);
            let (a, b, c) = (w.x as usize, w.y as usize, w.z as usize);
            let window: [&NodeRef; 8] = std::array::from_fn(|p| {
                let d = octant_offset(p);
                &results[at(a + d.x as usize, b + d.y as usize, c + d.z as usize)]
            });
            center_of(table, window)
        });
        StepResult {
            node: table.intern_internal(centers),
            actions: actions.into(),
        }
    }
}

/// Grandchild at `(gx, gy, gz)` in the 4×4×4 grid one level below the children.
#[inline]
fn grandchild(node: &NodeRef, gx: usize, gy: usize, gz: usize) -> &NodeRef {
    node.child(octant(gx >> 1, gy >> 1, gz >> 1))
        .child(octant(gx & 1, gy & 1, gz & 1))
}

/// Centered cube of the level-`L+1` cube whose octants are `children`
/// (each of level `L`), without advancing time.
pub(crate) fn center_of<S: BuildHasher>(table: &mut NodeTable<S>, children: [&NodeRef; 8]) -> NodeRef {
    let level = children[0].level();
    if level > LEAF_LEVEL {
        return table.intern_internal(std::array::from_fn(|o| Arc::clone(children[o].child(7 - o))));
    }
    let half = LEAF_SIDE / 2;
    let cells = std::array::from_fn(|i| {
        let (x, y, z) = (i & 3, (i >> 2) & 3, i >> 4);
        let (sx, sy, sz) = (x + half, y + half, z + half);
        let child = children[octant(sx / LEAF_SIDE, sy / LEAF_SIDE, sz / LEAF_SIDE)];
        child.get(IVec3::new(
            (sx % LEAF_SIDE) as i32,
            (sy % LEAF_SIDE) as i32,
            (sz % LEAF_SIDE) as i32,
        ))
    });
    table.intern_leaf(cells)
}

/// Copies `node` into the dense cube `buf` of `side` cells at offset
/// `(x0, y0, z0)`, indexed x-fastest then y then z.
fn flatten(node: &NodeRef, buf: &mut [Block], side: usize, x0: usize, y0: usize, z0: usize) {
    let n = node.side() as usize;
    if let Some(b) = node.uniform() {
        for z in z0..z0 + n {
            for y in y0..y0 + n {
                let row = (z * side + y) * side;
                buf[row + x0..row + x0 + n].fill(b);
            }
        }
        return;
    }
    match &node.data {
        NodeData::Leaf(cells) => {
            for z in 0..LEAF_SIDE {
                for y in 0..LEAF_SIDE {
                    for x in 0..LEAF_SIDE {
                        buf[((z0 + z) * side + y0 + y) * side + x0 + x] = cells[leaf_index(x, y, z)];
                    }
                }
            }
        }
        NodeData::Internal(children) => {
            let h = n / 2;
            for (o, c) in children.iter().enumerate() {
                let d = octant_offset(o);
                flatten(
                    c,
                    buf,
                    side,
                    x0 + d.x as usize * h,
                    y0 + d.y as usize * h,
                    z0 + d.z as usize * h,
                );
            }
        }
    }
}
