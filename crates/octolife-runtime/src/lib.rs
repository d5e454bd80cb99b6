//! Threads around the world core: the per-dimension mutator actor, the
//! worker pool, and the render cache coordinator.
#![forbid(unsafe_code)]

pub mod config;
pub mod dimension;
pub mod render_cache;
pub mod worker;

pub use config::RenderConfig;
pub use dimension::{Dimension, DimensionError};
pub use render_cache::{
    DrawItem, GpuBufferCache, RenderCacheCoordinator, RenderKey, ViewParams, ViewStats,
};
pub use worker::{RayonWorkerPool, Task, WorkerPool};
