mod config;
mod scene;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use octolife_blocks::{BlockRegistry, GlobalStepState, RegistryTransition};
use octolife_geom::Vec3;
use octolife_runtime::{
    Dimension, GpuBufferCache, RayonWorkerPool, RenderCacheCoordinator, ViewParams, WorkerPool,
};

use crate::config::AppConfig;
use crate::scene::Scene;

#[derive(Parser, Debug)]
#[command(name = "octolife", about = "Headless driver for the octolife macrocell world")]
struct Cli {
    /// App config (`[world]`, `[render]`, `blocks = "path"`).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Block registry; overrides the config's `blocks`.
    #[arg(long)]
    blocks: Option<PathBuf>,
    #[arg(long, default_value_t = 16)]
    steps: u32,
    #[arg(long, value_enum, default_value_t = Scene::Sand)]
    scene: Scene,
    #[arg(long, default_value_t = 256.0)]
    view_distance: f32,
}

/// Frames spent waiting for outstanding mesh builds after the last step.
const DRAIN_FRAMES: u32 = 500;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let mut cfg = match &cli.config {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::default(),
    };
    if let Some(blocks) = &cli.blocks {
        cfg.blocks = blocks.clone();
    }
    let reg = Arc::new(
        BlockRegistry::load_from_path(&cfg.blocks)
            .map_err(|e| format!("blocks {}: {e}", cfg.blocks.display()))?,
    );
    log::info!(
        "blocks path={} kinds={}",
        cfg.blocks.display(),
        reg.by_name.len()
    );

    let transition = Arc::new(RegistryTransition::new(Arc::clone(&reg)));
    let dim = Dimension::spawn("overworld", &cfg.world, transition)?;
    scene::build(&dim, &reg, cli.scene)?;

    let pool = RayonWorkerPool::new(cfg.render.resolved_worker_threads())?;
    log::info!(target: "render", "workers threads={}", pool.threads());
    let pool: Arc<dyn WorkerPool> = Arc::new(pool);
    let mut render = RenderCacheCoordinator::new(cfg.render.clone(), Arc::clone(&reg), pool);
    // Headless: a "GPU buffer" is just the uploaded quad count.
    let mut gpu: GpuBufferCache<usize> = GpuBufferCache::new(cfg.render.gpu_retain_frames);
    let global = GlobalStepState::default();
    let view = ViewParams {
        position: Vec3::new(0.0, 16.0, 0.0),
        view_distance: cli.view_distance,
    };
    let mut quads = 0usize;

    for step in 0..cli.steps {
        let t0 = Instant::now();
        let actions = dim.step_and_collect_garbage(global)?;
        let step_ms = t0.elapsed().as_millis();
        let snap = dim.latest_snapshot();
        let vs = render.update_view(&snap, view, &global, &mut gpu, |_, mesh| {
            let n = mesh.mesh.quad_count();
            quads += n;
            n
        });
        log::info!(
            target: "perf",
            "step={} generation={} actions={} ms={} visible={} uploaded={} submitted={} in_flight={}",
            step,
            snap.generation(),
            actions.len(),
            step_ms,
            vs.visible,
            vs.uploaded,
            vs.submitted,
            vs.in_flight
        );
    }

    let snap = dim.latest_snapshot();
    for _ in 0..DRAIN_FRAMES {
        if render.in_flight() == 0 {
            break;
        }
        std::thread::sleep(Duration::from_millis(2));
        render.update_view(&snap, view, &global, &mut gpu, |_, mesh| {
            let n = mesh.mesh.quad_count();
            quads += n;
            n
        });
    }

    let stats = dim.stats()?;
    log::info!(
        "done generation={} nodes={} table_hits={} table_misses={} memo_hits={} base_steps={} recursive_steps={} uniform_skips={} live_snapshots={}",
        stats.generation,
        stats.table.nodes,
        stats.table.hits,
        stats.table.misses,
        stats.step.memo_hits,
        stats.step.base_steps,
        stats.step.recursive_steps,
        stats.step.uniform_skips,
        stats.live_snapshots
    );
    if let Some(gc) = stats.last_gc {
        log::info!(
            target: "gc",
            "last before={} after={} reclaimed={} ms={}",
            gc.before,
            gc.after,
            gc.reclaimed(),
            gc.elapsed.as_millis()
        );
    }
    log::info!(
        target: "render",
        "gpu entries={} quads_uploaded={} in_flight={}",
        gpu.len(),
        quads,
        render.in_flight()
    );
    Ok(())
}
