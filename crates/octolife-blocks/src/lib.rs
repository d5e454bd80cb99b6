//! Block, registry, and per-cell transition crate.
#![forbid(unsafe_code)]

pub mod config;
pub mod registry;
pub mod transition;
pub mod types;

pub use registry::{BlockBehavior, BlockRegistry, BlockType};
pub use transition::{
    ActionKind, BlockAction, BlockStepPriority, BlockStepResult, GlobalStepState,
    IdentityTransition, Neighborhood, RegistryTransition, TransitionFunction,
};
pub use types::{Block, BlockId, BlockState, LightLevel};
