//! Hash-consed macrocell world: canonical node table, memoized stepper,
//! garbage collector, and snapshots.
#![forbid(unsafe_code)]

pub mod config;
pub mod gc;
pub mod node;
pub mod snapshot;
pub mod step;
pub mod table;
pub mod world;

pub use config::{GcConfig, WorldConfig};
pub use gc::{GcPolicy, GcStats};
pub use node::{
    LEAF_LEVEL, MAX_LEVEL, Node, NodeId, NodeRef, StepResult, leaf_index, octant, octant_offset,
    same_content,
};
pub use snapshot::{Snapshot, SnapshotManager, is_same};
pub use step::{StepCounters, Stepper, base_level};
pub use table::{FixedState, NodeTable, TableStats};
pub use world::{World, WorldStats};
