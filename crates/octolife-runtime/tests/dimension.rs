use std::sync::Arc;

use octolife_blocks::{Block, BlockRegistry, GlobalStepState, RegistryTransition};
use octolife_chunk::BlockArray;
use octolife_geom::IVec3;
use octolife_runtime::{Dimension, DimensionError};
use octolife_world::{WorldConfig, is_same};

fn registry() -> Arc<BlockRegistry> {
    Arc::new(
        BlockRegistry::from_toml_str(
            r#"
            [[blocks]]
            name = "stone"
            [[blocks]]
            name = "sand"
            behavior = { kind = "falling" }
            "#,
        )
        .unwrap(),
    )
}

fn spawn(reg: &Arc<BlockRegistry>) -> Dimension {
    Dimension::spawn(
        "test",
        &WorldConfig {
            world_level: 5,
            ..Default::default()
        },
        Arc::new(RegistryTransition::new(Arc::clone(reg))),
    )
    .unwrap()
}

#[test]
fn writes_reads_and_steps_through_the_actor() {
    let reg = registry();
    let stone = reg.block_by_name("stone").unwrap();
    let sand = reg.block_by_name("sand").unwrap();
    let dim = spawn(&reg);
    assert_eq!(dim.name(), "test");

    let floor = BlockArray::filled(IVec3::new(2, 1, 2), stone);
    dim.set_blocks(floor, IVec3::ZERO, IVec3::ZERO, IVec3::new(2, 1, 2))
        .unwrap();
    let grain = BlockArray::filled(IVec3::ONE, sand);
    dim.set_blocks(grain, IVec3::new(0, 5, 0), IVec3::ZERO, IVec3::ONE)
        .unwrap();

    let read = dim.get_blocks(IVec3::ZERO, IVec3::new(2, 6, 2)).unwrap();
    assert_eq!(read.get(IVec3::new(1, 0, 1)), stone);
    assert_eq!(read.get(IVec3::new(0, 5, 0)), sand);
    assert_eq!(read.get(IVec3::new(0, 4, 0)), Block::AIR);

    let before = dim.latest_snapshot();
    assert_eq!(before.generation(), 0);
    assert_eq!(before.get_block(IVec3::new(0, 5, 0)), Some(sand));

    dim.step_and_collect_garbage(GlobalStepState::default())
        .unwrap();
    let after = dim.latest_snapshot();
    assert_eq!(after.generation(), 1);
    assert_eq!(after.get_block(IVec3::new(0, 4, 0)), Some(sand));
    assert_eq!(after.get_block(IVec3::new(0, 5, 0)), Some(Block::AIR));
    // Held snapshots keep reading the content they captured.
    assert_eq!(before.get_block(IVec3::new(0, 5, 0)), Some(sand));
    assert!(!is_same(&before, &after));

    let stats = dim.stats().unwrap();
    assert_eq!(stats.generation, 1);
    assert_eq!(stats.level, 5);
    assert!(stats.live_snapshots >= 2);
}

#[test]
fn settled_world_publishes_identical_snapshots() {
    let reg = registry();
    let stone = reg.block_by_name("stone").unwrap();
    let dim = spawn(&reg);
    let cube = BlockArray::filled(IVec3::splat(4), stone);
    dim.set_blocks(cube, IVec3::splat(-2), IVec3::ZERO, IVec3::splat(4))
        .unwrap();
    let a = dim.make_snapshot().unwrap();
    dim.step_and_collect_garbage(GlobalStepState::default())
        .unwrap();
    let b = dim.latest_snapshot();
    assert!(is_same(&a, &b));
    assert_eq!(b.generation(), 1);
    let gc = dim.collect_garbage().unwrap();
    assert!(gc.after <= gc.before);
}

#[test]
fn readers_see_consistent_snapshots_while_the_mutator_steps() {
    let reg = registry();
    let stone = reg.block_by_name("stone").unwrap();
    let dim = spawn(&reg);
    let slab = BlockArray::filled(IVec3::new(8, 1, 8), stone);
    dim.set_blocks(slab, IVec3::new(-4, -1, -4), IVec3::ZERO, IVec3::new(8, 1, 8))
        .unwrap();
    std::thread::scope(|s| {
        for _ in 0..2 {
            s.spawn(|| {
                for _ in 0..200 {
                    let snap = dim.latest_snapshot();
                    assert_eq!(snap.get_block(IVec3::new(3, -1, -4)), Some(stone));
                    assert_eq!(snap.get_block(IVec3::new(3, 0, -4)), Some(Block::AIR));
                }
            });
        }
        for _ in 0..8 {
            dim.step_and_collect_garbage(GlobalStepState::default())
                .unwrap();
        }
    });
    assert_eq!(dim.latest_snapshot().generation(), 8);
}

#[test]
fn invalid_config_fails_to_spawn() {
    let err = Dimension::spawn(
        "bad",
        &WorldConfig {
            world_level: 2,
            ..Default::default()
        },
        Arc::new(RegistryTransition::new(registry())),
    )
    .err()
    .unwrap();
    assert!(matches!(err, DimensionError::Spawn(_)));
}

#[test]
fn calls_fail_once_the_mutator_has_died() {
    let reg = registry();
    let dim = spawn(&reg);
    // Writing outside the world is a fatal assertion on the mutator thread.
    let far = BlockArray::new(IVec3::ONE);
    let err = dim
        .set_blocks(far, IVec3::splat(1000), IVec3::ZERO, IVec3::ONE)
        .unwrap_err();
    assert_eq!(err, DimensionError::Disconnected);
    assert_eq!(dim.stats().unwrap_err(), DimensionError::Disconnected);
    assert_eq!(err.to_string(), "dimension thread is gone");
}
