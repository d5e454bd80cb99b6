//! Maps (node identity, level of detail) to render geometry.
//!
//! Meshes are built on a [`WorkerPool`] and handed back over a channel; the
//! coordinator never blocks on a build. Because nodes are canonical, a key
//! names content: a mesh stays valid for as long as its node is alive, no
//! matter how many steps the world takes.

use std::sync::{Arc, Weak};

use crossbeam_channel::{Receiver, Sender, unbounded};
use hashbrown::{HashMap, HashSet};
use octolife_blocks::{BlockRegistry, GlobalStepState};
use octolife_geom::{Aabb, IVec3, Vec3};
use octolife_mesh_cpu::{NodeMeshCPU, build_node_mesh};
use octolife_world::{LEAF_LEVEL, Node, NodeId, NodeRef, Snapshot, octant_offset};

use crate::config::RenderConfig;
use crate::worker::WorkerPool;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderKey {
    pub node: NodeId,
    pub lod: u8,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewParams {
    pub position: Vec3,
    pub view_distance: f32,
}

/// A GPU entry to draw this frame, placed at `origin` in world space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawItem {
    pub key: RenderKey,
    pub origin: IVec3,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewStats {
    pub frame: u64,
    /// Selected nodes, counting repeats of one key at several places.
    pub visible: usize,
    pub gpu_hits: usize,
    /// Completed builds handed to `on_ready` this frame.
    pub uploaded: usize,
    pub submitted: usize,
    /// Selections whose build was already in flight.
    pub coalesced: usize,
    pub in_flight: usize,
    pub evicted: usize,
    pub dropped_dead: usize,
    pub draws: Vec<DrawItem>,
}

struct GpuEntry<B> {
    buffer: B,
    last_seen: u64,
}

/// Caller-owned GPU resources keyed like the builds they came from.
pub struct GpuBufferCache<B> {
    entries: HashMap<RenderKey, GpuEntry<B>>,
    retain_frames: u64,
}

impl<B> GpuBufferCache<B> {
    pub fn new(retain_frames: u64) -> Self {
        Self {
            entries: HashMap::new(),
            retain_frames,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &RenderKey) -> Option<&B> {
        self.entries.get(key).map(|e| &e.buffer)
    }

    pub fn contains(&self, key: &RenderKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: RenderKey, buffer: B, frame: u64) {
        self.entries.insert(
            key,
            GpuEntry {
                buffer,
                last_seen: frame,
            },
        );
    }

    /// Marks `key` as used in `frame`; false when absent.
    pub fn touch(&mut self, key: &RenderKey, frame: u64) -> bool {
        match self.entries.get_mut(key) {
            Some(e) => {
                e.last_seen = e.last_seen.max(frame);
                true
            }
            None => false,
        }
    }

    /// Drops entries unseen for more than `retain_frames` frames.
    pub fn evict_stale(&mut self, frame: u64) -> usize {
        let before = self.entries.len();
        let retain = self.retain_frames;
        self.entries
            .retain(|_, e| frame.saturating_sub(e.last_seen) <= retain);
        before - self.entries.len()
    }
}

struct Completed {
    node: Weak<Node>,
    mesh: NodeMeshCPU,
}

type BuildResult = (RenderKey, Weak<Node>, NodeMeshCPU);

pub struct RenderCacheCoordinator {
    cfg: RenderConfig,
    registry: Arc<BlockRegistry>,
    pool: Arc<dyn WorkerPool>,
    tx: Sender<BuildResult>,
    rx: Receiver<BuildResult>,
    pending: HashSet<RenderKey>,
    completed: HashMap<RenderKey, Completed>,
    last_global: Option<GlobalStepState>,
    frame: u64,
}

impl RenderCacheCoordinator {
    pub fn new(cfg: RenderConfig, registry: Arc<BlockRegistry>, pool: Arc<dyn WorkerPool>) -> Self {
        let (tx, rx) = unbounded();
        Self {
            cfg,
            registry,
            pool,
            tx,
            rx,
            pending: HashSet::new(),
            completed: HashMap::new(),
            last_global: None,
            frame: 0,
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.cfg
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Builds submitted and not yet collected.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Completed builds waiting for their node to come into view.
    pub fn completed(&self) -> usize {
        self.completed.len()
    }

    /// Detail level for a node `distance` away from the viewer.
    pub fn lod_for_distance(&self, distance: f32) -> u8 {
        let ratio = (distance / self.cfg.lod_distance).max(1.0);
        (ratio.log2().floor() as u32).min(self.cfg.max_lod as u32) as u8
    }

    /// Advances one frame: collects finished builds, walks `snapshot` within
    /// the view sphere, uploads ready meshes through `on_ready`, and submits
    /// builds for keys nobody is working on yet.
    pub fn update_view<B>(
        &mut self,
        snapshot: &Snapshot,
        view: ViewParams,
        global: &GlobalStepState,
        gpu: &mut GpuBufferCache<B>,
        mut on_ready: impl FnMut(RenderKey, NodeMeshCPU) -> B,
    ) -> ViewStats {
        self.frame += 1;
        let frame = self.frame;
        let mut stats = ViewStats {
            frame,
            ..Default::default()
        };
        if self.last_global.is_some_and(|g| g != *global) {
            // Stepping under new global state rebuilds the table, so old keys
            // stop appearing and age out through eviction.
            log::debug!(
                target: "render",
                "global state changed frame={} ambient_light={}",
                frame,
                global.ambient_light
            );
        }
        self.last_global = Some(*global);

        self.collect_finished(&mut stats);

        let mut selected: Vec<(NodeRef, u8, IVec3)> = Vec::new();
        self.select(snapshot.root(), snapshot.origin(), view, &mut selected);
        stats.visible = selected.len();

        for (node, lod, origin) in selected {
            let key = RenderKey {
                node: node.id(),
                lod,
            };
            stats.draws.push(DrawItem { key, origin });
            if gpu.touch(&key, frame) {
                stats.gpu_hits += 1;
            } else if let Some(done) = self.completed.remove(&key) {
                gpu.insert(key, on_ready(key, done.mesh), frame);
                stats.uploaded += 1;
            } else if self.pending.contains(&key) {
                stats.coalesced += 1;
            } else {
                self.submit(key, node);
                stats.submitted += 1;
            }
        }

        stats.evicted = gpu.evict_stale(frame);
        stats.in_flight = self.pending.len();
        log::debug!(
            target: "render",
            "frame={} visible={} hits={} uploaded={} submitted={} coalesced={} in_flight={} evicted={}",
            frame,
            stats.visible,
            stats.gpu_hits,
            stats.uploaded,
            stats.submitted,
            stats.coalesced,
            stats.in_flight,
            stats.evicted
        );
        stats
    }

    fn collect_finished(&mut self, stats: &mut ViewStats) {
        for (key, node, mesh) in self.rx.try_iter() {
            self.pending.remove(&key);
            if node.strong_count() == 0 {
                stats.dropped_dead += 1;
                continue;
            }
            self.completed.insert(key, Completed { node, mesh });
        }
        let before = self.completed.len();
        self.completed.retain(|_, c| c.node.strong_count() > 0);
        stats.dropped_dead += before - self.completed.len();
    }

    fn select(
        &self,
        node: &NodeRef,
        min: IVec3,
        view: ViewParams,
        out: &mut Vec<(NodeRef, u8, IVec3)>,
    ) {
        if node
            .uniform()
            .is_some_and(|b| self.registry.is_invisible(b))
        {
            return;
        }
        let bbox = Aabb::from_cube(min, node.side());
        if !bbox.intersects_sphere(view.position, view.view_distance) {
            return;
        }
        let lod = self.lod_for_distance(bbox.distance_to(view.position));
        let target = (self.cfg.chunk_level + lod).max(LEAF_LEVEL);
        if node.level() <= target {
            let lod = node.level().saturating_sub(self.cfg.chunk_level).min(lod);
            out.push((Arc::clone(node), lod, min));
            return;
        }
        if let Some(children) = node.children() {
            let half = (node.side() / 2) as i32;
            for (o, child) in children.iter().enumerate() {
                self.select(child, min + octant_offset(o) * half, view, out);
            }
        }
    }

    fn submit(&mut self, key: RenderKey, node: NodeRef) {
        self.pending.insert(key);
        let registry = Arc::clone(&self.registry);
        let tx = self.tx.clone();
        self.pool.submit(Box::new(move || {
            let mesh = build_node_mesh(&node, key.lod, &registry);
            let _ = tx.send((key, Arc::downgrade(&node), mesh));
        }));
    }
}
