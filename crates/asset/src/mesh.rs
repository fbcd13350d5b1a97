//! CPU-side mesh representation produced by the scene front-ends.

use bytemuck::{Pod, Zeroable};
use thiserror::Error;

/// Number of bone influences stored per vertex.
pub const MAX_BONE_INFLUENCE: usize = 4;

/// Interleaved vertex. Field order is the attribute order seen by shaders.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
    pub bone_ids: [i32; MAX_BONE_INFLUENCE],
    pub bone_weights: [f32; MAX_BONE_INFLUENCE],
}

impl Vertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coords: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            tex_coords,
            ..Self::default()
        }
    }
}

/// Structural problems in a mesh that would corrupt GPU memory if uploaded.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MeshError {
    #[error("mesh has no vertices")]
    NoVertices,
    #[error("index count {0} is not a multiple of 3")]
    NotTriangles(usize),
    #[error("index {index} at position {position} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        index: u32,
        position: usize,
        vertex_count: usize,
    },
    #[error("{0} vertices do not fit 32-bit indices")]
    TooManyVertices(usize),
    #[error("GPU upload failed: {0}")]
    Upload(String),
}

/// Checks the triangle-list invariants shared by the importers and the mesh builder.
pub fn validate_triangles(vertex_count: usize, indices: &[u32]) -> Result<(), MeshError> {
    if vertex_count == 0 {
        return Err(MeshError::NoVertices);
    }
    if u32::try_from(vertex_count).is_err() {
        return Err(MeshError::TooManyVertices(vertex_count));
    }
    if indices.len() % 3 != 0 {
        return Err(MeshError::NotTriangles(indices.len()));
    }
    if let Some((position, &index)) = indices
        .iter()
        .enumerate()
        .find(|&(_, &i)| i as usize >= vertex_count)
    {
        return Err(MeshError::IndexOutOfRange {
            index,
            position,
            vertex_count,
        });
    }
    Ok(())
}

/// Indexed triangle mesh with interleaved vertices, as copied out of the source scene.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    /// Index into [`SceneData::materials`](crate::scene::SceneData::materials).
    pub material: usize,
    /// Whether the source supplied a texture-coordinate channel. Tangent and
    /// bitangent are only meaningful when this is set.
    pub has_tex_coords: bool,
    pub has_normals: bool,
}

impl MeshData {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self {
            vertices,
            indices,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), MeshError> {
        validate_triangles(self.vertices.len(), &self.indices)
    }
}
