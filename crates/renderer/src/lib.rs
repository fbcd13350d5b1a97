//! Renderer: GPU-resident mesh/texture cache over a small device trait.
//! Backends: OpenGL (`glow`) and a headless recorder for tests and tooling.

pub mod device;
pub mod gl;
pub mod headless;
pub mod material;
pub mod mesh;
pub mod model;
pub mod options;
pub mod texture_cache;

pub use asset::MeshError;
pub use device::{
    DeviceError, GraphicsDevice, ProgramId, SamplerParams, TextureId, VERTEX_LAYOUT,
};
pub use gl::GlDevice;
pub use headless::HeadlessDevice;
pub use material::{MaterialResolver, ResolvedMaterial, TextureRef, TextureTable};
pub use mesh::{Mesh, MeshTexture};
pub use model::{ImportError, ImportStats, Model};
pub use options::ImportOptions;
pub use texture_cache::{TextureLoader, TextureParams, TextureSource};
