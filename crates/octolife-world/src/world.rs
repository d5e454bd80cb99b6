use std::hash::BuildHasher;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Instant;

use hashbrown::HashMap;
use octolife_blocks::{Block, BlockAction, GlobalStepState, TransitionFunction};
use octolife_chunk::BlockArray;
use octolife_geom::IVec3;

use crate::config::{MAX_WORLD_LEVEL, MIN_WORLD_LEVEL, WorldConfig};
use crate::gc::{self, GcPolicy, GcStats};
use crate::node::{NodeData, NodeId, NodeRef, clip, for_each_point, leaf_index, octant_offset};
use crate::snapshot::{self, Snapshot, SnapshotManager};
use crate::step::{StepCounters, Stepper, center_of};
use crate::table::{FixedState, NodeTable, TableStats};

#[derive(Clone, Debug)]
pub struct WorldStats {
    pub generation: u64,
    pub level: u8,
    pub generations_per_step: u32,
    pub table: TableStats,
    pub step: StepCounters,
    pub live_snapshots: usize,
    pub last_gc: Option<GcStats>,
}

/// A simulated cube of `2^level` cells per axis spanning
/// `[-2^(level-1), 2^(level-1))`. Owns the node table; every mutation goes
/// through `&mut self`.
pub struct World<S = FixedState> {
    table: NodeTable<S>,
    stepper: Stepper,
    snapshots: SnapshotManager,
    gc: GcPolicy,
    root: NodeRef,
    generation: u64,
    level: u8,
    origin: IVec3,
    // Global state the current memo slots were computed under.
    memo_global: Option<GlobalStepState>,
    last_gc: Option<GcStats>,
    owner: Option<ThreadId>,
}

impl World<FixedState> {
    pub fn new(config: &WorldConfig, transition: Arc<dyn TransitionFunction>) -> Self {
        Self::with_hasher(config, transition, FixedState::default())
    }
}

impl<S: BuildHasher + Clone> World<S> {
    pub fn with_hasher(
        config: &WorldConfig,
        transition: Arc<dyn TransitionFunction>,
        hasher: S,
    ) -> Self {
        let level = config.world_level;
        assert!(
            (MIN_WORLD_LEVEL..=MAX_WORLD_LEVEL).contains(&level),
            "world level {level} outside {MIN_WORLD_LEVEL}..={MAX_WORLD_LEVEL}"
        );
        let stepper = Stepper::new(
            transition,
            config.generations_per_step,
            GlobalStepState::default(),
        );
        let mut table = NodeTable::with_hasher(hasher);
        let root = table.uniform(level, Block::AIR);
        let half = 1i32 << (level - 1);
        World {
            table,
            stepper,
            snapshots: SnapshotManager::new(),
            gc: GcPolicy::new(&config.gc),
            root,
            generation: 0,
            level,
            origin: IVec3::splat(-half),
            memo_global: None,
            last_gc: None,
            owner: None,
        }
    }

    #[inline]
    pub fn root(&self) -> &NodeRef {
        &self.root
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Minimum corner of the world in cell coordinates.
    #[inline]
    pub fn origin(&self) -> IVec3 {
        self.origin
    }

    #[inline]
    pub fn side(&self) -> i64 {
        1i64 << self.level
    }

    #[inline]
    pub fn generations_per_step(&self) -> u32 {
        self.stepper.generations()
    }

    pub fn table(&self) -> &NodeTable<S> {
        &self.table
    }

    /// Restricts the world to the calling thread; later calls from another
    /// thread trip a debug assertion.
    pub fn bind_to_current_thread(&mut self) {
        self.owner = Some(thread::current().id());
    }

    #[inline]
    fn check_owner(&self) {
        debug_assert!(
            self.owner.is_none_or(|t| t == thread::current().id()),
            "world used off its owner thread"
        );
    }

    /// Writes the array box `[array_offset, array_offset + size)` into the
    /// world box `[world_origin, world_origin + size)`.
    pub fn set_blocks(
        &mut self,
        src: &BlockArray,
        world_origin: IVec3,
        array_offset: IVec3,
        size: IVec3,
    ) {
        self.check_owner();
        assert!(
            src.contains_region(array_offset, size),
            "region {array_offset:?}+{size:?} outside array of size {:?}",
            src.size()
        );
        snapshot::assert_in_world(self.origin, self.side(), world_origin, size);
        if size.volume() == 0 {
            return;
        }
        let shift = array_offset - world_origin;
        let root = Arc::clone(&self.root);
        self.root = write_region(
            &mut self.table,
            &root,
            self.origin,
            world_origin,
            world_origin + size,
            &|p| src.get(p + shift),
        );
    }

    /// Reads the world box `[world_origin, world_origin + size)` into the
    /// array box `[array_offset, array_offset + size)`.
    pub fn get_blocks(
        &self,
        dest: &mut BlockArray,
        world_origin: IVec3,
        array_offset: IVec3,
        size: IVec3,
    ) {
        self.check_owner();
        snapshot::read_region(&self.root, self.origin, dest, world_origin, array_offset, size);
    }

    pub fn get_block(&self, pos: IVec3) -> Option<Block> {
        let rel = pos - self.origin;
        let side = self.side();
        let inside = |v: i32| v >= 0 && (v as i64) < side;
        (inside(rel.x) && inside(rel.y) && inside(rel.z)).then(|| self.root.get(rel))
    }

    /// Advances the whole world by `generations_per_step` generations, then
    /// collects garbage if the table has outgrown the policy threshold.
    /// Returns the actions produced inside the world, in world coordinates.
    pub fn step_and_collect_garbage(&mut self, global: &GlobalStepState) -> Vec<BlockAction> {
        self.check_owner();
        let start = Instant::now();
        if self.memo_global != Some(*global) {
            if self.memo_global.is_some() {
                self.rebase();
            }
            self.stepper.reset_global(*global);
            self.memo_global = Some(*global);
        }

        assert!(
            global.boundary != Block::OUTSIDE,
            "the outside marker cannot be a boundary block"
        );
        let mut padded = Arc::clone(&self.root);
        while padded.level() <= self.level || padded.level() < self.stepper.base_level() {
            padded = expand(&mut self.table, &padded, Block::OUTSIDE);
        }
        let result = self.stepper.step_node(&mut self.table, &padded);
        let mut next = result.node;
        while next.level() > self.level {
            let kids: [NodeRef; 8] = std::array::from_fn(|o| Arc::clone(next.child(o)));
            next = center_of(&mut self.table, std::array::from_fn(|o| &kids[o]));
        }

        // Padding keeps the root centered inside the stepped cube.
        let inset = (padded.side() - self.side()) / 2;
        let base = [
            self.origin.x as i64 - inset,
            self.origin.y as i64 - inset,
            self.origin.z as i64 - inset,
        ];
        let lo = [self.origin.x as i64, self.origin.y as i64, self.origin.z as i64];
        let side = self.side();
        let actions: Vec<BlockAction> = result
            .actions
            .iter()
            .filter_map(|a| {
                let abs = [
                    base[0] + a.position.x as i64,
                    base[1] + a.position.y as i64,
                    base[2] + a.position.z as i64,
                ];
                let inside = (0..3).all(|i| abs[i] >= lo[i] && abs[i] < lo[i] + side);
                inside.then(|| BlockAction {
                    position: IVec3::new(abs[0] as i32, abs[1] as i32, abs[2] as i32),
                    ..*a
                })
            })
            .collect();

        let changed = !Arc::ptr_eq(&next, &self.root);
        self.root = next;
        self.generation += self.stepper.generations() as u64;
        log::debug!(
            target: "step",
            "ms={} step generation={} changed={} actions={} nodes={}",
            start.elapsed().as_millis(),
            self.generation,
            changed,
            actions.len(),
            self.table.len()
        );

        if self.gc.should_collect(self.table.len()) {
            self.collect_garbage();
        }
        actions
    }

    /// Captures the current root. Never steps or collects.
    pub fn make_snapshot(&mut self) -> Snapshot {
        self.snapshots
            .capture(&self.root, self.generation, self.origin, self.level)
    }

    #[inline]
    pub fn is_same(a: &Snapshot, b: &Snapshot) -> bool {
        snapshot::is_same(a, b)
    }

    /// Runs a collection pass now, retaining the root and every live snapshot.
    pub fn collect_garbage(&mut self) -> GcStats {
        self.check_owner();
        let mut roots = self.snapshots.live_roots();
        roots.push(Arc::clone(&self.root));
        let stats = gc::collect(&mut self.table, roots.iter());
        self.gc.record(&stats);
        self.last_gc = Some(stats);
        stats
    }

    pub fn stats(&self) -> WorldStats {
        WorldStats {
            generation: self.generation,
            level: self.level,
            generations_per_step: self.stepper.generations(),
            table: self.table.stats(),
            step: self.stepper.counters(),
            live_snapshots: self.snapshots.live_count(),
            last_gc: self.last_gc,
        }
    }

    /// Moves the root into a fresh table, dropping every memo slot. Used when
    /// the global step state changes, since memoized results depend on it.
    fn rebase(&mut self) {
        let mut fresh = NodeTable::with_hasher(self.table_hasher());
        let mut seen: HashMap<NodeId, NodeRef> = HashMap::new();
        self.root = reintern(&mut fresh, &self.root, &mut seen);
        log::debug!(
            target: "step",
            "rebase global state changed nodes_before={} nodes_after={}",
            self.table.len(),
            fresh.len()
        );
        self.table = fresh;
    }

    fn table_hasher(&self) -> S {
        self.table.hasher().clone()
    }
}

/// Level `L+1` cube with `node` at its center and `fill` elsewhere.
fn expand<S: BuildHasher>(table: &mut NodeTable<S>, node: &NodeRef, fill: Block) -> NodeRef {
    let level = node.level();
    let fill = table.uniform(level - 1, fill);
    let children: [NodeRef; 8] = std::array::from_fn(|o| {
        let mut quad: [NodeRef; 8] = std::array::from_fn(|_| Arc::clone(&fill));
        quad[7 - o] = Arc::clone(node.child(o));
        table.intern_internal(quad)
    });
    table.intern_internal(children)
}

/// Rewrites the cells of `node` (minimum corner `min`) inside `[lo, hi)` with
/// `f`, returning the canonical replacement.
fn write_region<S: BuildHasher>(
    table: &mut NodeTable<S>,
    node: &NodeRef,
    min: IVec3,
    lo: IVec3,
    hi: IVec3,
    f: &impl Fn(IVec3) -> Block,
) -> NodeRef {
    let side = node.side();
    let (clo, chi) = clip(min, side, lo, hi);
    if !clo.all_lt(chi) {
        return Arc::clone(node);
    }
    let level = node.level();
    let covered = clo == min && (chi - min) == IVec3::splat(side as i32);
    if covered {
        return table.build(level, min, f);
    }
    if let NodeData::Leaf(old) = &node.data {
        let mut cells = **old;
        for_each_point(clo, chi, |p| {
            let l = p - min;
            cells[leaf_index(l.x as usize, l.y as usize, l.z as usize)] = f(p);
        });
        return table.intern_leaf(cells);
    }
    let half = 1i32 << (level - 1);
    let children: [NodeRef; 8] = std::array::from_fn(|o| {
        write_region(table, node.child(o), min + octant_offset(o) * half, lo, hi, f)
    });
    let unchanged = node
        .children()
        .is_some_and(|old| old.iter().zip(children.iter()).all(|(a, b)| Arc::ptr_eq(a, b)));
    if unchanged {
        return Arc::clone(node);
    }
    table.intern_internal(children)
}

fn reintern<S: BuildHasher>(
    table: &mut NodeTable<S>,
    node: &NodeRef,
    seen: &mut HashMap<NodeId, NodeRef>,
) -> NodeRef {
    if let Some(done) = seen.get(&node.id()) {
        return Arc::clone(done);
    }
    let fresh = match &node.data {
        NodeData::Leaf(cells) => table.intern_leaf(**cells),
        NodeData::Internal(children) => {
            let kids: [NodeRef; 8] = std::array::from_fn(|o| reintern(table, &children[o], seen));
            table.intern_internal(kids)
        }
    };
    seen.insert(node.id(), Arc::clone(&fresh));
    fresh
}
