//! Post-processing applied to every imported mesh: normals, UV flip, tangent space.

use std::collections::HashMap;

use glam::Vec3;
use mikktspace::{Geometry, generate_tangents};

use crate::mesh::MeshData;

/// Steps run after a front-end has produced triangulated meshes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PostProcess {
    /// Generate smooth normals for meshes that have none.
    pub gen_smooth_normals: bool,
    /// Flip the V texture axis (`v' = 1 - v`) for bottom-left origin samplers.
    pub flip_uvs: bool,
    /// Compute tangent and bitangent for meshes with texture coordinates.
    pub calc_tangent_space: bool,
}

impl Default for PostProcess {
    fn default() -> Self {
        Self {
            gen_smooth_normals: true,
            flip_uvs: true,
            calc_tangent_space: true,
        }
    }
}

impl PostProcess {
    /// Run the enabled steps on a mesh that has already passed validation.
    pub fn apply(&self, mesh: &mut MeshData) {
        if self.gen_smooth_normals && !mesh.has_normals {
            generate_smooth_normals(mesh);
        }
        if self.flip_uvs && mesh.has_tex_coords {
            flip_uvs(mesh);
        }
        if self.calc_tangent_space
            && mesh.has_tex_coords
            && mesh.has_normals
            && !compute_tangent_space(mesh)
        {
            log::warn!("Tangent generation failed for mesh '{}'", mesh.name);
        }
    }
}

/// Area-weighted vertex normals, shared between vertices at the same position.
pub fn generate_smooth_normals(mesh: &mut MeshData) {
    let key = |p: [f32; 3]| p.map(f32::to_bits);
    let mut accum: HashMap<[u32; 3], Vec3> = HashMap::new();

    for tri in mesh.indices.chunks_exact(3) {
        let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| mesh.vertices[i as usize].position);
        // Unnormalised cross product: magnitude is twice the triangle area.
        let face = (Vec3::from(b) - Vec3::from(a)).cross(Vec3::from(c) - Vec3::from(a));
        for p in [a, b, c] {
            *accum.entry(key(p)).or_insert(Vec3::ZERO) += face;
        }
    }

    for v in &mut mesh.vertices {
        let n = accum
            .get(&key(v.position))
            .copied()
            .unwrap_or(Vec3::ZERO)
            .normalize_or_zero();
        v.normal = n.to_array();
    }
    mesh.has_normals = true;
}

pub fn flip_uvs(mesh: &mut MeshData) {
    for v in &mut mesh.vertices {
        v.tex_coords[1] = 1.0 - v.tex_coords[1];
    }
}

struct TangentGeometry<'a> {
    mesh: &'a MeshData,
    tangents: Vec<[f32; 4]>,
}

impl TangentGeometry<'_> {
    fn vertex(&self, face: usize, vert: usize) -> usize {
        self.mesh.indices[face * 3 + vert] as usize
    }
}

impl Geometry for TangentGeometry<'_> {
    fn num_faces(&self) -> usize {
        self.mesh.indices.len() / 3
    }

    fn num_vertices_of_face(&self, _face: usize) -> usize {
        3
    }

    fn position(&self, face: usize, vert: usize) -> [f32; 3] {
        self.mesh.vertices[self.vertex(face, vert)].position
    }

    fn normal(&self, face: usize, vert: usize) -> [f32; 3] {
        self.mesh.vertices[self.vertex(face, vert)].normal
    }

    fn tex_coord(&self, face: usize, vert: usize) -> [f32; 2] {
        self.mesh.vertices[self.vertex(face, vert)].tex_coords
    }

    fn set_tangent_encoded(&mut self, tangent: [f32; 4], face: usize, vert: usize) {
        let idx = self.vertex(face, vert);
        self.tangents[idx] = tangent;
    }
}

/// MikkTSpace tangents; the bitangent is rebuilt as `w * (n x t)`.
/// Returns `false` and leaves the mesh untouched if generation fails.
pub fn compute_tangent_space(mesh: &mut MeshData) -> bool {
    if mesh.indices.is_empty() {
        return false;
    }
    let vertex_count = mesh.vertices.len();
    let tangents = {
        let mut geom = TangentGeometry {
            mesh: &*mesh,
            tangents: vec![[0.0; 4]; vertex_count],
        };
        if !generate_tangents(&mut geom) {
            return false;
        }
        geom.tangents
    };

    for (v, t) in mesh.vertices.iter_mut().zip(tangents) {
        let tangent = Vec3::new(t[0], t[1], t[2]);
        let sign = if t[3] < 0.0 { -1.0 } else { 1.0 };
        let bitangent = Vec3::from(v.normal).cross(tangent) * sign;
        v.tangent = tangent.to_array();
        v.bitangent = bitangent.to_array();
    }
    true
}
