//! Scene asset loading (CPU side).
//! Front-ends: OBJ/MTL via `tobj`, glTF 2.0 via `gltf`.
//! Output is an owned [`scene::SceneData`]: node tree, triangulated meshes,
//! material records and embedded images, ready for GPU upload.

pub mod gltf_import;
pub mod material;
pub mod mesh;
pub mod obj;
pub mod postprocess;
pub mod scene;
pub mod slots;
pub mod texture;

pub use material::{MaterialRecord, MaterialSnapshot, Slot, TextureKind};
pub use mesh::{MeshData, MeshError, Vertex};
pub use postprocess::PostProcess;
pub use scene::{SceneData, SceneError, load_scene};
pub use slots::{SceneFormat, SlotMapping};
pub use texture::{ColorSpace, InternalFormat, PixelFormat, TextureData};
