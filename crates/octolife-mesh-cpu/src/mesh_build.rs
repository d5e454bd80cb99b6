use octolife_geom::Vec3;

use crate::face::Face;

/// Flat vertex streams: three floats of position and normal and four color
/// bytes per vertex, six indices per quad.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshBuild {
    pub pos: Vec<f32>,
    pub norm: Vec<f32>,
    pub col: Vec<u8>,
    pub idx: Vec<u32>,
}

impl MeshBuild {
    /// Clears all arrays but retains capacity for reuse.
    #[inline]
    pub fn clear_keep_capacity(&mut self) {
        self.pos.clear();
        self.norm.clear();
        self.col.clear();
        self.idx.clear();
    }

    #[inline]
    pub fn reserve_quads(&mut self, n_quads: usize) {
        self.pos.reserve(n_quads * 4 * 3);
        self.norm.reserve(n_quads * 4 * 3);
        self.col.reserve(n_quads * 4 * 4);
        self.idx.reserve(n_quads * 6);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.idx.is_empty()
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.pos.len() / 3
    }

    #[inline]
    pub fn quad_count(&self) -> usize {
        self.idx.len() / 6
    }

    /// Appends a quad given its corners in cyclic order. Corners are
    /// reordered when needed so the front side faces along `n`.
    pub fn add_quad(&mut self, corners: [Vec3; 4], n: Vec3, rgba: [u8; 4]) {
        let base = self.vertex_count() as u32;
        let mut vs = corners;
        let e1 = vs[1] - vs[0];
        let e2 = vs[2] - vs[0];
        let cross = Vec3::new(
            e1.y * e2.z - e1.z * e2.y,
            e1.z * e2.x - e1.x * e2.z,
            e1.x * e2.y - e1.y * e2.x,
        );
        if cross.dot(n) < 0.0 {
            vs.swap(1, 3);
        }
        for v in vs {
            self.pos.extend_from_slice(&[v.x, v.y, v.z]);
            self.norm.extend_from_slice(&[n.x, n.y, n.z]);
            self.col.extend_from_slice(&rgba);
        }
        self.idx
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    /// Emits `face` of the axis-aligned cube with minimum corner `min` and
    /// edge length `size`.
    pub fn add_cube_face(&mut self, face: Face, min: Vec3, size: f32, rgba: [u8; 4]) {
        let max = min + Vec3::splat(size);
        let v = Vec3::new;
        let (x0, y0, z0) = (min.x, min.y, min.z);
        let (x1, y1, z1) = (max.x, max.y, max.z);
        let corners = match face {
            Face::PosY => [v(x0, y1, z0), v(x0, y1, z1), v(x1, y1, z1), v(x1, y1, z0)],
            Face::NegY => [v(x0, y0, z0), v(x1, y0, z0), v(x1, y0, z1), v(x0, y0, z1)],
            Face::PosX => [v(x1, y0, z0), v(x1, y1, z0), v(x1, y1, z1), v(x1, y0, z1)],
            Face::NegX => [v(x0, y0, z0), v(x0, y0, z1), v(x0, y1, z1), v(x0, y1, z0)],
            Face::PosZ => [v(x0, y0, z1), v(x1, y0, z1), v(x1, y1, z1), v(x0, y1, z1)],
            Face::NegZ => [v(x0, y0, z0), v(x0, y1, z0), v(x1, y1, z0), v(x1, y0, z0)],
        };
        self.add_quad(corners, face.normal(), rgba);
    }

    /// Interleaved vertex positions (x,y,z per vertex).
    pub fn positions(&self) -> &[f32] {
        &self.pos
    }

    pub fn normals(&self) -> &[f32] {
        &self.norm
    }
}
