use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks off the calling thread.
pub trait WorkerPool: Send + Sync {
    fn submit(&self, task: Task);
}

pub struct RayonWorkerPool {
    pool: ThreadPool,
    threads: usize,
    queued: Arc<AtomicUsize>,
}

impl RayonWorkerPool {
    pub fn new(threads: usize) -> Result<Self, ThreadPoolBuildError> {
        let threads = threads.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("octolife-render-{i}"))
            .build()?;
        Ok(Self {
            pool,
            threads,
            queued: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Tasks submitted but not yet finished.
    pub fn pending(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }
}

impl WorkerPool for RayonWorkerPool {
    fn submit(&self, task: Task) {
        self.queued.fetch_add(1, Ordering::Relaxed);
        let queued = Arc::clone(&self.queued);
        self.pool.spawn(move || {
            task();
            queued.fetch_sub(1, Ordering::Relaxed);
        });
    }
}
