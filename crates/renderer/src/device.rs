//! Graphics device abstraction: opaque handles, sampler state, vertex layout
//! and the small set of GL-style calls the mesh/texture cache needs.

use std::mem::{offset_of, size_of};

use asset::{TextureData, Vertex};
use glam::Vec3;
use thiserror::Error;

/// Texture object handle. `0` never names a live texture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

impl TextureId {
    /// "No texture": returned by failed loads, binding it unbinds the unit.
    pub const NONE: TextureId = TextureId(0);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VertexArrayId(pub u32);

/// Linked shader program, owned by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

/// The buffer objects backing one mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshBuffers {
    pub vao: VertexArrayId,
    pub vbo: BufferId,
    pub ebo: BufferId,
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to create {what}: {reason}")]
    Allocation {
        what: &'static str,
        reason: String,
    },
    #[error("texture {width}x{height} is too large for the device")]
    TextureTooLarge { width: u32, height: u32 },
    #[error("{0} bytes of mesh data exceed the device limit")]
    BufferTooLarge(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WrapMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl FilterMode {
    pub fn uses_mipmaps(self) -> bool {
        !matches!(self, FilterMode::Nearest | FilterMode::Linear)
    }
}

/// Sampler state applied to a texture at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplerParams {
    pub wrap: WrapMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub generate_mipmaps: bool,
}

impl SamplerParams {
    /// Textures loaded from files: repeat, trilinear, full mip chain.
    pub const FILE: SamplerParams = SamplerParams {
        wrap: WrapMode::Repeat,
        mag_filter: FilterMode::Linear,
        min_filter: FilterMode::LinearMipmapLinear,
        generate_mipmaps: true,
    };

    /// Textures embedded in the scene file: clamped, bilinear, no mipmaps.
    pub const EMBEDDED: SamplerParams = SamplerParams {
        wrap: WrapMode::ClampToEdge,
        mag_filter: FilterMode::Linear,
        min_filter: FilterMode::Linear,
        generate_mipmaps: false,
    };
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self::FILE
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeKind {
    Float,
    /// Integer attribute, read by the shader as `ivec`.
    Int,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub components: i32,
    pub kind: AttributeKind,
    pub offset: usize,
}

/// Interleaved vertex layout shared by every mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: usize,
    pub attributes: &'static [VertexAttribute],
}

const fn float(location: u32, components: i32, offset: usize) -> VertexAttribute {
    VertexAttribute {
        location,
        components,
        kind: AttributeKind::Float,
        offset,
    }
}

const VERTEX_ATTRIBUTES: [VertexAttribute; 7] = [
    float(0, 3, offset_of!(Vertex, position)),
    float(1, 3, offset_of!(Vertex, normal)),
    float(2, 2, offset_of!(Vertex, tex_coords)),
    float(3, 3, offset_of!(Vertex, tangent)),
    float(4, 3, offset_of!(Vertex, bitangent)),
    VertexAttribute {
        location: 5,
        components: 4,
        kind: AttributeKind::Int,
        offset: offset_of!(Vertex, bone_ids),
    },
    float(6, 4, offset_of!(Vertex, bone_weights)),
];

/// Attribute locations 0..=6 as the shaders declare them.
pub const VERTEX_LAYOUT: VertexLayout = VertexLayout {
    stride: size_of::<Vertex>(),
    attributes: &VERTEX_ATTRIBUTES,
};

/// The GPU operations the cache performs. Calls are issued from the thread
/// that owns the context; implementations are expected to be `!Send`.
pub trait GraphicsDevice {
    fn create_texture(
        &self,
        data: &TextureData,
        sampler: &SamplerParams,
    ) -> Result<TextureId, DeviceError>;
    fn delete_texture(&self, texture: TextureId);

    fn create_mesh_buffers(
        &self,
        vertices: &[u8],
        indices: &[u32],
        layout: &VertexLayout,
    ) -> Result<MeshBuffers, DeviceError>;
    fn delete_mesh_buffers(&self, buffers: MeshBuffers);

    fn active_texture(&self, unit: u32);
    fn bind_texture(&self, texture: TextureId);

    fn set_uniform_i32(&self, program: ProgramId, name: &str, value: i32);
    fn set_uniform_f32(&self, program: ProgramId, name: &str, value: f32);
    fn set_uniform_vec3(&self, program: ProgramId, name: &str, value: Vec3);

    /// Indexed triangle-list draw of `index_count` u32 indices.
    fn draw_indexed(&self, vao: VertexArrayId, index_count: u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_vertex_struct() {
        assert_eq!(VERTEX_LAYOUT.stride, 88);
        let offsets: Vec<_> = VERTEX_LAYOUT.attributes.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, [0, 12, 24, 32, 44, 56, 72]);
        let locations: Vec<_> = VERTEX_LAYOUT.attributes.iter().map(|a| a.location).collect();
        assert_eq!(locations, [0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn only_bone_ids_are_integer() {
        for attr in VERTEX_LAYOUT.attributes {
            let expected = if attr.location == 5 {
                AttributeKind::Int
            } else {
                AttributeKind::Float
            };
            assert_eq!(attr.kind, expected);
        }
    }

    #[test]
    fn sampler_presets() {
        assert!(SamplerParams::FILE.generate_mipmaps);
        assert!(SamplerParams::FILE.min_filter.uses_mipmaps());
        assert_eq!(SamplerParams::EMBEDDED.wrap, WrapMode::ClampToEdge);
        assert!(!SamplerParams::EMBEDDED.min_filter.uses_mipmaps());
        assert!(TextureId::NONE.is_none());
        assert!(!TextureId(3).is_none());
    }
}
