use std::collections::HashMap;
use std::time::Instant;

use octolife_blocks::{Block, BlockRegistry};
use octolife_geom::{Aabb, IVec3};
use octolife_world::{LEAF_LEVEL, Node, NodeId, leaf_index, octant_offset};

use crate::constants::{INITIAL_QUADS, UNKNOWN_RGBA};
use crate::face::Face;
use crate::mesh_build::MeshBuild;
use crate::node_mesh::NodeMeshCPU;

/// Meshes `node` with cells of edge `2^lod`.
///
/// Each coarse cell takes the most common visible block beneath it, so thin
/// features stay visible from afar. Faces between two opaque cells, or
/// between cells of the same kind, are culled; faces on the node boundary
/// are always emitted because the neighbors are unknown here.
pub fn build_node_mesh(node: &Node, lod: u8, reg: &BlockRegistry) -> NodeMeshCPU {
    assert!(
        lod <= node.level(),
        "lod {lod} exceeds node level {}",
        node.level()
    );
    let t0 = Instant::now();
    let mut grid = CoarseGrid::new(node.level() - lod, lod, reg);
    grid.fill(node, IVec3::ZERO);
    let mesh = grid.emit();
    log::trace!(
        target: "render",
        "mesh node={} lod={} quads={} us={}",
        node.id().0,
        lod,
        mesh.quad_count(),
        t0.elapsed().as_micros()
    );
    NodeMeshCPU {
        node: node.id(),
        lod,
        bbox: Aabb::from_cube(IVec3::ZERO, node.side()),
        mesh,
    }
}

struct CoarseGrid<'a> {
    reg: &'a BlockRegistry,
    lod: u8,
    /// Coarse cells per axis.
    n: i32,
    cells: Vec<Block>,
    reps: HashMap<NodeId, Block>,
}

impl<'a> CoarseGrid<'a> {
    fn new(grid_level: u8, lod: u8, reg: &'a BlockRegistry) -> Self {
        let n = 1i32 << grid_level;
        CoarseGrid {
            reg,
            lod,
            n,
            cells: vec![Block::AIR; (n as usize).pow(3)],
            reps: HashMap::new(),
        }
    }

    #[inline]
    fn idx(&self, p: IVec3) -> usize {
        ((p.y * self.n + p.z) * self.n + p.x) as usize
    }

    fn at(&self, p: IVec3) -> Option<Block> {
        (p.all_ge(IVec3::ZERO) && p.all_lt(IVec3::splat(self.n))).then(|| self.cells[self.idx(p)])
    }

    fn set(&mut self, p: IVec3, b: Block) {
        let i = self.idx(p);
        self.cells[i] = b;
    }

    /// Writes the coarse cells covered by `node`, whose first coarse cell is `at`.
    fn fill(&mut self, node: &Node, at: IVec3) {
        let span = (node.side() >> self.lod).max(1) as i32;
        if let Some(b) = node.uniform() {
            for_each_cell(span, |d| self.set(at + d, b));
            return;
        }
        if node.level() <= self.lod {
            let b = self.representative(node);
            self.set(at, b);
            return;
        }
        if let Some(children) = node.children() {
            for (o, c) in children.iter().enumerate() {
                self.fill(c, at + octant_offset(o) * (span / 2));
            }
        } else if let Some(leaf) = node.leaf_cells() {
            let step = 1usize << self.lod;
            for_each_cell(span, |d| {
                let b = dominant(
                    self.reg,
                    (0..step.pow(3)).map(|i| {
                        let x = d.x as usize * step + i % step;
                        let y = d.y as usize * step + (i / step) % step;
                        let z = d.z as usize * step + i / (step * step);
                        leaf[leaf_index(x, y, z)]
                    }),
                );
                self.set(at + d, b);
            });
        }
    }

    fn representative(&mut self, node: &Node) -> Block {
        if let Some(b) = node.uniform() {
            return b;
        }
        if let Some(b) = self.reps.get(&node.id()) {
            return *b;
        }
        let b = match (node.children(), node.leaf_cells()) {
            (Some(children), _) => {
                let reps: Vec<Block> = children.iter().map(|c| self.representative(c)).collect();
                dominant(self.reg, reps)
            }
            (None, Some(leaf)) => dominant(self.reg, leaf.iter().copied()),
            (None, None) => Block::AIR,
        };
        self.reps.insert(node.id(), b);
        b
    }

    fn emit(&self) -> MeshBuild {
        let mut mesh = MeshBuild::default();
        mesh.reserve_quads(INITIAL_QUADS);
        let scale = (1i32 << self.lod) as f32;
        for_each_cell(self.n, |p| {
            let b = self.cells[self.idx(p)];
            if self.reg.is_invisible(b) {
                return;
            }
            let rgba = self.reg.get(b.id).map_or(UNKNOWN_RGBA, |t| t.color);
            for face in Face::ALL {
                let hidden = self
                    .at(p + face.delta())
                    .is_some_and(|nb| self.reg.is_opaque(nb) || nb.same_kind(b));
                if !hidden {
                    mesh.add_cube_face(face, p.as_vec3() * scale, scale, rgba);
                }
            }
        });
        mesh
    }
}

fn for_each_cell(span: i32, mut f: impl FnMut(IVec3)) {
    for y in 0..span {
        for z in 0..span {
            for x in 0..span {
                f(IVec3::new(x, y, z));
            }
        }
    }
}

/// Most frequent visible block; ties go to the lower id. Air when nothing
/// is visible.
fn dominant(reg: &BlockRegistry, blocks: impl IntoIterator<Item = Block>) -> Block {
    let mut tally: Vec<(Block, u32)> = Vec::new();
    for b in blocks {
        if reg.is_invisible(b) {
            continue;
        }
        match tally.iter_mut().find(|(t, _)| t.same_kind(b)) {
            Some((_, n)) => *n += 1,
            None => tally.push((b, 1)),
        }
    }
    tally
        .into_iter()
        .max_by(|(a, na), (b, nb)| na.cmp(nb).then(b.id.cmp(&a.id)))
        .map_or(Block::AIR, |(b, _)| b)
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn dominant_prefers_visible_then_lower_id() {
        let r = reg();
        let stone = r.block_by_name("stone").unwrap();
        let glass = r.block_by_name("glass").unwrap();
        assert_eq!(dominant(&r, [Block::AIR; 10]), Block::AIR);
        assert_eq!(dominant(&r, [Block::AIR, Block::AIR, glass]), glass);
        assert_eq!(dominant(&r, [glass, stone]), stone);
        assert_eq!(dominant(&r, [glass, stone, glass]), glass);
    }

    #[test]
    fn lod_at_node_level_is_a_single_cell() {
        let r = reg();
        let mut g = CoarseGrid::new(0, 3, &r);
        assert_eq!(g.n, 1);
        g.set(IVec3::ZERO, r.block_by_name("stone").unwrap());
        assert_eq!(g.emit().quad_count(), 6);
    }
}
