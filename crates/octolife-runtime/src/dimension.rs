//! One mutator thread per dimension. The thread owns the [`World`]; other
//! threads talk to it with [`Command`]s and read published snapshots.

use std::fmt;
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use octolife_blocks::{BlockAction, GlobalStepState, TransitionFunction};
use octolife_chunk::BlockArray;
use octolife_geom::IVec3;
use octolife_world::{GcStats, Snapshot, World, WorldConfig, WorldStats};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DimensionError {
    /// The mutator thread could not be started.
    Spawn(String),
    /// The mutator thread has exited, normally or by panic.
    Disconnected,
}

impl fmt::Display for DimensionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionError::Spawn(msg) => write!(f, "failed to start dimension thread: {msg}"),
            DimensionError::Disconnected => write!(f, "dimension thread is gone"),
        }
    }
}

impl std::error::Error for DimensionError {}

pub enum Command {
    SetBlocks {
        blocks: BlockArray,
        world_origin: IVec3,
        array_offset: IVec3,
        size: IVec3,
        reply: Sender<()>,
    },
    GetBlocks {
        world_origin: IVec3,
        size: IVec3,
        reply: Sender<BlockArray>,
    },
    Step {
        global: GlobalStepState,
        reply: Sender<Vec<BlockAction>>,
    },
    MakeSnapshot {
        reply: Sender<Snapshot>,
    },
    CollectGarbage {
        reply: Sender<GcStats>,
    },
    Stats {
        reply: Sender<WorldStats>,
    },
    Shutdown,
}

pub struct Dimension {
    name: String,
    tx: Sender<Command>,
    latest: Arc<RwLock<Snapshot>>,
    handle: Option<JoinHandle<()>>,
}

impl Dimension {
    /// Starts the mutator thread with an all-air world and waits for its
    /// first snapshot.
    pub fn spawn(
        name: &str,
        config: &WorldConfig,
        transition: Arc<dyn TransitionFunction>,
    ) -> Result<Self, DimensionError> {
        config
            .validate()
            .map_err(|e| DimensionError::Spawn(e.to_string()))?;
        let (tx, rx) = unbounded::<Command>();
        let (ready_tx, ready_rx) = bounded::<Arc<RwLock<Snapshot>>>(1);
        let cfg = config.clone();
        let thread_name = format!("octolife-dim-{name}");
        let handle = thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                let mut world = World::new(&cfg, transition);
                world.bind_to_current_thread();
                let latest = Arc::new(RwLock::new(world.make_snapshot()));
                if ready_tx.send(Arc::clone(&latest)).is_err() {
                    return;
                }
                drop(ready_tx);
                run(world, rx, &latest);
            })
            .map_err(|e| DimensionError::Spawn(e.to_string()))?;
        let latest = ready_rx.recv().map_err(|_| DimensionError::Disconnected)?;
        log::info!(
            target: "dimension",
            "spawned name={} level={} generations_per_step={}",
            name,
            config.world_level,
            config.generations_per_step
        );
        Ok(Self {
            name: name.to_string(),
            tx,
            latest,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Most recently published snapshot; no round trip to the mutator.
    pub fn latest_snapshot(&self) -> Snapshot {
        self.latest
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_blocks(
        &self,
        blocks: BlockArray,
        world_origin: IVec3,
        array_offset: IVec3,
        size: IVec3,
    ) -> Result<(), DimensionError> {
        self.request(|reply| Command::SetBlocks {
            blocks,
            world_origin,
            array_offset,
            size,
            reply,
        })
    }

    /// Reads `[world_origin, world_origin + size)` into a new array.
    pub fn get_blocks(&self, world_origin: IVec3, size: IVec3) -> Result<BlockArray, DimensionError> {
        self.request(|reply| Command::GetBlocks {
            world_origin,
            size,
            reply,
        })
    }

    pub fn step_and_collect_garbage(
        &self,
        global: GlobalStepState,
    ) -> Result<Vec<BlockAction>, DimensionError> {
        self.request(|reply| Command::Step { global, reply })
    }

    pub fn make_snapshot(&self) -> Result<Snapshot, DimensionError> {
        self.request(|reply| Command::MakeSnapshot { reply })
    }

    pub fn collect_garbage(&self) -> Result<GcStats, DimensionError> {
        self.request(|reply| Command::CollectGarbage { reply })
    }

    pub fn stats(&self) -> Result<WorldStats, DimensionError> {
        self.request(|reply| Command::Stats { reply })
    }

    fn request<T>(&self, make: impl FnOnce(Sender<T>) -> Command) -> Result<T, DimensionError> {
        let (reply, rx) = bounded(1);
        self.tx
            .send(make(reply))
            .map_err(|_| DimensionError::Disconnected)?;
        rx.recv().map_err(|_| DimensionError::Disconnected)
    }
}

impl Drop for Dimension {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!(target: "dimension", "name={} mutator thread panicked", self.name);
            }
        }
    }
}

/// Replaces the published snapshot; readers never wait on the mutator.
fn publish(world: &mut World, latest: &RwLock<Snapshot>) {
    let snap = world.make_snapshot();
    *latest
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = snap;
}

fn run(mut world: World, rx: Receiver<Command>, latest: &RwLock<Snapshot>) {
    while let Ok(cmd) = rx.recv() {
        match cmd {
            Command::SetBlocks {
                blocks,
                world_origin,
                array_offset,
                size,
                reply,
            } => {
                world.set_blocks(&blocks, world_origin, array_offset, size);
                publish(&mut world, latest);
                let _ = reply.send(());
            }
            Command::GetBlocks {
                world_origin,
                size,
                reply,
            } => {
                let mut out = BlockArray::new(size);
                world.get_blocks(&mut out, world_origin, IVec3::ZERO, size);
                let _ = reply.send(out);
            }
            Command::Step { global, reply } => {
                let t0 = Instant::now();
                let actions = world.step_and_collect_garbage(&global);
                publish(&mut world, latest);
                log::debug!(
                    target: "dimension",
                    "step generation={} actions={} nodes={} ms={}",
                    world.generation(),
                    actions.len(),
                    world.table().len(),
                    t0.elapsed().as_millis()
                );
                let _ = reply.send(actions);
            }
            Command::MakeSnapshot { reply } => {
                let _ = reply.send(world.make_snapshot());
            }
            Command::CollectGarbage { reply } => {
                let _ = reply.send(world.collect_garbage());
            }
            Command::Stats { reply } => {
                let _ = reply.send(world.stats());
            }
            Command::Shutdown => break,
        }
    }
    log::debug!(target: "dimension", "mutator exiting generation={}", world.generation());
}
