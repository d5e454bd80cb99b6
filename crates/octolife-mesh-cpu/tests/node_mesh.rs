use octolife_blocks::{Block, BlockRegistry};
use octolife_geom::IVec3;
use octolife_mesh_cpu::{Face, build_node_mesh};
use octolife_world::NodeTable;

fn reg() -> BlockRegistry {
    BlockRegistry::from_toml_str(
        r#"
        [[blocks]]
        name = "stone"
        color = [120, 120, 120, 255]
        [[blocks]]
        name = "glass"
        opaque = false
        color = [200, 220, 255, 96]
        "#,
    )
    .unwrap()
}

fn cells(list: &[(IVec3, Block)]) -> impl Fn(IVec3) -> Block + '_ {
    move |p| {
        list.iter()
            .find(|(q, _)| *q == p)
            .map_or(Block::AIR, |(_, b)| *b)
    }
}

#[test]
fn lone_cube_has_six_faces() {
    let r = reg();
    let stone = r.block_by_name("stone").unwrap();
    let mut t = NodeTable::new();
    let n = t.build(4, IVec3::ZERO, &cells(&[(IVec3::new(3, 4, 5), stone)]));
    let m = build_node_mesh(&n, 0, &r);
    assert_eq!(m.node, n.id());
    assert_eq!(m.mesh.quad_count(), 6);
    assert_eq!(&m.mesh.col[..4], &[120, 120, 120, 255]);
    for v in m.mesh.positions().chunks(3) {
        assert!((3.0..=4.0).contains(&v[0]));
        assert!((4.0..=5.0).contains(&v[1]));
        assert!((5.0..=6.0).contains(&v[2]));
    }
}

#[test]
fn shared_faces_are_culled() {
    let r = reg();
    let stone = r.block_by_name("stone").unwrap();
    let glass = r.block_by_name("glass").unwrap();
    let mut t = NodeTable::new();

    let pair = t.build(
        4,
        IVec3::ZERO,
        &cells(&[(IVec3::new(1, 1, 1), stone), (IVec3::new(2, 1, 1), stone)]),
    );
    assert_eq!(build_node_mesh(&pair, 0, &r).mesh.quad_count(), 10);

    let panes = t.build(
        4,
        IVec3::ZERO,
        &cells(&[(IVec3::new(1, 1, 1), glass), (IVec3::new(2, 1, 1), glass)]),
    );
    assert_eq!(build_node_mesh(&panes, 0, &r).mesh.quad_count(), 10);

    // Stone shows its face through glass; glass hides the face against stone.
    let mixed = t.build(
        4,
        IVec3::ZERO,
        &cells(&[(IVec3::new(1, 1, 1), stone), (IVec3::new(2, 1, 1), glass)]),
    );
    assert_eq!(build_node_mesh(&mixed, 0, &r).mesh.quad_count(), 11);
}

#[test]
fn uniform_solid_node_emits_only_its_shell() {
    let r = reg();
    let stone = r.block_by_name("stone").unwrap();
    let mut t = NodeTable::new();
    let n = t.uniform(4, stone);
    let m = build_node_mesh(&n, 0, &r);
    assert_eq!(m.mesh.quad_count(), 6 * 16 * 16);
    let normals: Vec<&[f32]> = m.mesh.normals().chunks(3).collect();
    for face in Face::ALL {
        let nrm = face.normal();
        let count = normals.iter().filter(|n| **n == [nrm.x, nrm.y, nrm.z]).count();
        assert_eq!(count, 4 * 16 * 16);
    }
}

#[test]
fn air_node_is_empty() {
    let r = reg();
    let mut t = NodeTable::new();
    let n = t.uniform(5, Block::AIR);
    assert!(build_node_mesh(&n, 1, &r).mesh.is_empty());
}

#[test]
fn coarse_lod_keeps_thin_features() {
    let r = reg();
    let stone = r.block_by_name("stone").unwrap();
    let mut t = NodeTable::new();
    let n = t.build(4, IVec3::ZERO, &cells(&[(IVec3::new(5, 1, 1), stone)]));
    let m = build_node_mesh(&n, 2, &r);
    assert_eq!(m.lod, 2);
    assert_eq!(m.mesh.quad_count(), 6);
    for v in m.mesh.positions().chunks(3) {
        assert!((4.0..=8.0).contains(&v[0]));
        assert!((0.0..=4.0).contains(&v[1]));
        assert!((0.0..=4.0).contains(&v[2]));
    }
    assert_eq!(m.bbox.max.x, 16.0);
}

#[test]
fn lod_above_leaf_level_uses_subtree_representatives() {
    let r = reg();
    let stone = r.block_by_name("stone").unwrap();
    let glass = r.block_by_name("glass").unwrap();
    let mut t = NodeTable::new();
    let n = t.build(5, IVec3::ZERO, &|p: IVec3| {
        if p.x < 8 && p.y < 8 && p.z < 8 {
            if (p.x + p.y + p.z) % 3 == 0 { stone } else { glass }
        } else {
            Block::AIR
        }
    });
    let m = build_node_mesh(&n, 3, &r);
    // One coarse cell of edge 8 holding mostly glass.
    assert_eq!(m.mesh.quad_count(), 6);
    assert_eq!(&m.mesh.col[..4], &[200, 220, 255, 96]);
}

#[test]
fn meshing_is_deterministic() {
    let r = reg();
    let stone = r.block_by_name("stone").unwrap();
    let mut t = NodeTable::new();
    let n = t.build(4, IVec3::ZERO, &|p: IVec3| {
        if (p.x * 7 + p.y * 3 + p.z) % 5 == 0 { stone } else { Block::AIR }
    });
    let a = build_node_mesh(&n, 0, &r);
    let b = build_node_mesh(&n, 0, &r);
    assert_eq!(a.mesh, b.mesh);
}
