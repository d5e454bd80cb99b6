//! CPU meshing of canonical nodes: one colored, face-culled mesh per
//! (node, level of detail).
#![forbid(unsafe_code)]

mod build;
mod constants;
pub mod face;
pub mod mesh_build;
pub mod node_mesh;

pub use build::build_node_mesh;
pub use face::Face;
pub use mesh_build::MeshBuild;
pub use node_mesh::NodeMeshCPU;
