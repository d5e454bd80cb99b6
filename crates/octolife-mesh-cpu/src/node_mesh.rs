use octolife_geom::Aabb;
use octolife_world::NodeId;

use crate::mesh_build::MeshBuild;

/// CPU-side mesh of one canonical node at one level of detail.
///
/// Vertices are relative to the node's minimum corner: a node that appears
/// at several places in the world is meshed once and drawn at each.
#[derive(Clone, Debug)]
pub struct NodeMeshCPU {
    pub node: NodeId,
    pub lod: u8,
    /// Local bounds, `[0, side)` on every axis.
    pub bbox: Aabb,
    pub mesh: MeshBuild,
}
