use std::error::Error;

use clap::ValueEnum;
use octolife_blocks::{Block, BlockRegistry};
use octolife_chunk::BlockArray;
use octolife_geom::IVec3;
use octolife_runtime::Dimension;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Scene {
    /// A stone cube of side 8 at the origin; nothing moves.
    Cube,
    /// Sand raining onto a stone floor, moss creeping over dirt, a lamp.
    Sand,
}

fn block(reg: &BlockRegistry, name: &str) -> Result<Block, Box<dyn Error>> {
    reg.block_by_name(name)
        .ok_or_else(|| format!("block registry has no '{name}'").into())
}

fn fill(dim: &Dimension, min: IVec3, size: IVec3, b: Block) -> Result<(), Box<dyn Error>> {
    dim.set_blocks(BlockArray::filled(size, b), min, IVec3::ZERO, size)?;
    Ok(())
}

pub fn build(dim: &Dimension, reg: &BlockRegistry, scene: Scene) -> Result<(), Box<dyn Error>> {
    match scene {
        Scene::Cube => fill(dim, IVec3::splat(-4), IVec3::splat(8), block(reg, "stone")?),
        Scene::Sand => {
            let stone = block(reg, "stone")?;
            let sand = block(reg, "sand")?;
            fill(dim, IVec3::new(-32, -2, -32), IVec3::new(64, 2, 64), stone)?;
            if let (Some(dirt), Some(moss)) = (reg.block_by_name("dirt"), reg.block_by_name("moss")) {
                fill(dim, IVec3::new(-24, 0, -24), IVec3::new(16, 1, 16), dirt)?;
                fill(dim, IVec3::new(-24, 0, -24), IVec3::ONE, moss)?;
            }
            if let Some(lamp) = reg.block_by_name("lamp") {
                fill(dim, IVec3::new(20, 0, -20), IVec3::ONE, lamp)?;
            }
            // Sparse grains at staggered heights above the floor.
            let size = IVec3::new(32, 24, 32);
            let mut grains = BlockArray::new(size);
            for z in (0..32).step_by(4) {
                for x in (0..32).step_by(4) {
                    let y = 4 + (x * 3 + z * 5) % 20;
                    grains.set(IVec3::new(x, y, z), sand);
                }
            }
            dim.set_blocks(grains, IVec3::ZERO, IVec3::ZERO, size)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octolife_blocks::RegistryTransition;
    use octolife_world::WorldConfig;
    use std::sync::Arc;

    fn registry() -> Arc<BlockRegistry> {
        let root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        Arc::new(BlockRegistry::load_from_path(root.join("assets/blocks.toml")).unwrap())
    }

    fn dimension(reg: &Arc<BlockRegistry>) -> Dimension {
        Dimension::spawn(
            "scene",
            &WorldConfig {
                world_level: 7,
                ..Default::default()
            },
            Arc::new(RegistryTransition::new(Arc::clone(reg))),
        )
        .unwrap()
    }

    #[test]
    fn cube_scene_is_a_fixed_point() {
        let reg = registry();
        let dim = dimension(&reg);
        build(&dim, &reg, Scene::Cube).unwrap();
        let before = dim.latest_snapshot();
        assert_eq!(before.get_block(IVec3::splat(-4)), reg.block_by_name("stone"));
        assert_eq!(before.get_block(IVec3::splat(4)), Some(Block::AIR));
        dim.step_and_collect_garbage(Default::default()).unwrap();
        assert!(octolife_world::is_same(&before, &dim.latest_snapshot()));
    }

    #[test]
    fn sand_scene_has_falling_grains() {
        let reg = registry();
        let dim = dimension(&reg);
        build(&dim, &reg, Scene::Sand).unwrap();
        let sand = reg.block_by_name("sand");
        // x = 0, z = 0 puts the grain at y = 4.
        assert_eq!(dim.latest_snapshot().get_block(IVec3::new(0, 4, 0)), sand);
        dim.step_and_collect_garbage(Default::default()).unwrap();
        assert_eq!(dim.latest_snapshot().get_block(IVec3::new(0, 3, 0)), sand);
    }

    #[test]
    fn missing_block_is_an_error() {
        let reg = Arc::new(BlockRegistry::new());
        let dim = dimension(&reg);
        assert!(build(&dim, &reg, Scene::Cube).is_err());
    }
}
