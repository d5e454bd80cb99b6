use std::sync::{Arc, Weak};

use octolife_blocks::Block;
use octolife_chunk::BlockArray;
use octolife_geom::IVec3;

use crate::node::NodeRef;

struct SnapshotInner {
    root: NodeRef,
    generation: u64,
    origin: IVec3,
    level: u8,
}

/// Immutable capture of a world's root. Cheap to clone and safe to read from
/// any thread; holding one keeps its nodes alive across garbage collection.
#[derive(Clone)]
pub struct Snapshot {
    inner: Arc<SnapshotInner>,
}

impl Snapshot {
    #[inline]
    pub fn root(&self) -> &NodeRef {
        &self.inner.root
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.inner.generation
    }

    /// Minimum corner of the root cube in world coordinates.
    #[inline]
    pub fn origin(&self) -> IVec3 {
        self.inner.origin
    }

    #[inline]
    pub fn level(&self) -> u8 {
        self.inner.level
    }

    #[inline]
    pub fn contains(&self, pos: IVec3) -> bool {
        let side = self.inner.root.side();
        let rel = |v: i32, o: i32| v as i64 - o as i64;
        let o = self.inner.origin;
        [rel(pos.x, o.x), rel(pos.y, o.y), rel(pos.z, o.z)]
            .iter()
            .all(|d| (0..side).contains(d))
    }

    /// Block at `pos`, or `None` outside the world.
    pub fn get_block(&self, pos: IVec3) -> Option<Block> {
        self.contains(pos)
            .then(|| self.inner.root.get(pos - self.inner.origin))
    }

    /// Copies the world box `[world_origin, world_origin + size)` into `dest`
    /// at `array_offset`.
    pub fn get_blocks(
        &self,
        dest: &mut BlockArray,
        world_origin: IVec3,
        array_offset: IVec3,
        size: IVec3,
    ) {
        read_region(
            &self.inner.root,
            self.inner.origin,
            dest,
            world_origin,
            array_offset,
            size,
        );
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("root", &self.inner.root.id())
            .field("generation", &self.inner.generation)
            .field("origin", &self.inner.origin)
            .field("level", &self.inner.level)
            .finish()
    }
}

/// True when both snapshots hold the same content over the same region.
/// Constant time: roots are canonical, so identity is content equality.
pub fn is_same(a: &Snapshot, b: &Snapshot) -> bool {
    Arc::ptr_eq(&a.inner.root, &b.inner.root)
        && a.inner.origin == b.inner.origin
        && a.inner.level == b.inner.level
}

/// Tracks issued snapshots without keeping them alive, so the collector can
/// retain exactly the roots somebody still holds.
#[derive(Default)]
pub struct SnapshotManager {
    issued: Vec<Weak<SnapshotInner>>,
}

impl SnapshotManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture(
        &mut self,
        root: &NodeRef,
        generation: u64,
        origin: IVec3,
        level: u8,
    ) -> Snapshot {
        self.issued.retain(|w| w.strong_count() > 0);
        let inner = Arc::new(SnapshotInner {
            root: Arc::clone(root),
            generation,
            origin,
            level,
        });
        self.issued.push(Arc::downgrade(&inner));
        Snapshot { inner }
    }

    /// Roots of every snapshot still held somewhere.
    pub fn live_roots(&mut self) -> Vec<NodeRef> {
        let mut roots = Vec::with_capacity(self.issued.len());
        self.issued.retain(|w| match w.upgrade() {
            Some(s) => {
                roots.push(Arc::clone(&s.root));
                true
            }
            None => false,
        });
        roots
    }

    pub fn live_count(&self) -> usize {
        self.issued.iter().filter(|w| w.strong_count() > 0).count()
    }
}

/// Panics unless `[world_origin, world_origin + size)` lies in the root cube
/// `[origin, origin + side)`.
pub(crate) fn assert_in_world(origin: IVec3, side: i64, world_origin: IVec3, size: IVec3) {
    let inside = |lo: i32, n: i32, o: i32| {
        let rel = lo as i64 - o as i64;
        n >= 0 && rel >= 0 && rel + n as i64 <= side
    };
    assert!(
        inside(world_origin.x, size.x, origin.x)
            && inside(world_origin.y, size.y, origin.y)
            && inside(world_origin.z, size.z, origin.z),
        "region {world_origin:?}+{size:?} outside world [{origin:?}, +{side})"
    );
}

pub(crate) fn read_region(
    root: &NodeRef,
    origin: IVec3,
    dest: &mut BlockArray,
    world_origin: IVec3,
    array_offset: IVec3,
    size: IVec3,
) {
    assert!(
        dest.contains_region(array_offset, size),
        "region {array_offset:?}+{size:?} outside array of size {:?}",
        dest.size()
    );
    assert_in_world(origin, root.side(), world_origin, size);
    let shift = array_offset - world_origin;
    root.for_each_in(origin, world_origin, world_origin + size, &mut |p, b| {
        dest.set(p + shift, b)
    });
}
