//! Model import and the per-frame draw entry point.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use asset::{MaterialRecord, SceneData, SceneError, load_scene};
use thiserror::Error;

use crate::device::{GraphicsDevice, ProgramId, TextureId};
use crate::material::{MaterialResolver, TextureRef, TextureTable};
use crate::mesh::Mesh;
use crate::options::ImportOptions;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// What one import did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub meshes: usize,
    pub skipped_meshes: usize,
    pub textures_uploaded: usize,
    pub textures_reused: usize,
    pub textures_failed: usize,
}

/// Meshes in draw order plus the textures they share. Dropping the model
/// releases every GPU object it created.
pub struct Model {
    device: Rc<dyn GraphicsDevice>,
    meshes: Vec<Mesh>,
    textures: Vec<TextureRef>,
    texture_ids: Vec<TextureId>,
    placeholder: Option<TextureId>,
    directory: PathBuf,
    gamma_correction: bool,
    stats: ImportStats,
}

impl Model {
    /// Parse `path` and upload it. Structural scene errors fail before any
    /// GPU allocation.
    pub fn load(
        device: Rc<dyn GraphicsDevice>,
        path: impl AsRef<Path>,
        options: &ImportOptions,
    ) -> Result<Self, ImportError> {
        let path = path.as_ref();
        let scene = load_scene(path, &options.post_process)?;
        let model = Self::from_scene(device, &scene, options);
        log::info!(
            "Loaded {}: {} meshes ({} skipped), {} textures uploaded, {} reused, {} failed",
            path.display(),
            model.stats.meshes,
            model.stats.skipped_meshes,
            model.stats.textures_uploaded,
            model.stats.textures_reused,
            model.stats.textures_failed
        );
        Ok(model)
    }

    /// Build from an already parsed scene: nodes in pre-order, each node's
    /// meshes in order. Meshes failing validation are logged and skipped.
    pub fn from_scene(
        device: Rc<dyn GraphicsDevice>,
        scene: &SceneData,
        options: &ImportOptions,
    ) -> Self {
        let mapping = options.slot_mapping_for(scene.format);
        let resolver = MaterialResolver::new(&*device, mapping, options);
        let fallback = MaterialRecord::named("DefaultMaterial");
        let mut table = TextureTable::new();
        let mut meshes = Vec::new();
        let mut skipped_meshes = 0;

        for mesh_index in scene.mesh_order() {
            let Some(data) = scene.meshes.get(mesh_index) else {
                log::error!("Node references missing mesh {mesh_index}");
                skipped_meshes += 1;
                continue;
            };
            if let Err(err) = data.validate() {
                log::error!("Skipping mesh '{}': {err}", data.name);
                skipped_meshes += 1;
                continue;
            }
            let material = scene.materials.get(data.material).unwrap_or(&fallback);
            let resolved = resolver.resolve(material, scene, &mut table);
            let built = Mesh::build(
                device.clone(),
                data.vertices.clone(),
                data.indices.clone(),
                resolved.textures,
                resolved.snapshot,
            );
            match built {
                Ok(mesh) => meshes.push(
                    mesh.with_name(data.name.clone())
                        .with_tex_coords(data.has_tex_coords),
                ),
                Err(err) => {
                    log::error!("Skipping mesh '{}': {err}", data.name);
                    skipped_meshes += 1;
                }
            }
        }

        let (textures, placeholder, texture_stats) = table.into_parts();
        let texture_ids = textures.iter().map(|t| t.id).collect();
        let stats = ImportStats {
            meshes: meshes.len(),
            skipped_meshes,
            textures_uploaded: texture_stats.uploaded,
            textures_reused: texture_stats.reused,
            textures_failed: texture_stats.failed,
        };
        Self {
            device,
            meshes,
            textures,
            texture_ids,
            placeholder,
            directory: scene.directory.clone(),
            gamma_correction: options.gamma_correction,
            stats,
        }
    }

    /// Draw every mesh with `program` bound, then leave texture unit 0 active.
    pub fn draw(&self, program: ProgramId) {
        for mesh in &self.meshes {
            mesh.draw(program, &self.texture_ids);
        }
        self.device.active_texture(0);
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn textures(&self) -> &[TextureRef] {
        &self.textures
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn gamma_correction(&self) -> bool {
        self.gamma_correction
    }

    pub fn stats(&self) -> ImportStats {
        self.stats
    }
}

impl Drop for Model {
    fn drop(&mut self) {
        // Degraded entries alias the placeholder; it is released once below.
        for texture in self.textures.iter().filter(|t| !t.degraded) {
            self.device.delete_texture(texture.id);
        }
        if let Some(placeholder) = self.placeholder.filter(|p| !p.is_none()) {
            self.device.delete_texture(placeholder);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{Command, HeadlessDevice, UniformValue};
    use asset::scene::SceneNode;
    use asset::{MeshData, SceneFormat, Slot, TextureKind, Vertex};
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::fs;
    use std::io::Cursor;

    const OBJ: &str = "\
mtllib crate.mtl
o lid
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
usemtl wood
f 1/1 2/2 3/3 4/4
o side
v 0 0 1
v 1 0 1
v 0 1 1
vt 0 0
vt 1 0
vt 0 1
usemtl painted
f 5/5 6/6 7/7
o bare
v 0 0 2
v 1 0 2
v 0 1 2
usemtl painted
f 8 9 10
";

    const MTL: &str = "\
newmtl wood
Kd 0.5 0.4 0.3
Ks 0.2 0.2 0.2
Ns 8
map_Kd shared.png
map_Ks wood_spec.png

newmtl painted
Kd 1 0 0
map_Kd shared.png
map_Bump missing_normal.png
";

    fn png() -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(2, 2))
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn write_crate(dir: &Path) -> PathBuf {
        fs::write(dir.join("crate.obj"), OBJ).unwrap();
        fs::write(dir.join("crate.mtl"), MTL).unwrap();
        fs::write(dir.join("shared.png"), png()).unwrap();
        fs::write(dir.join("wood_spec.png"), png()).unwrap();
        dir.join("crate.obj")
    }

    /// One textured triangle. The base colour image lives in the buffer and
    /// the normal map is a data URI.
    fn write_gltf(dir: &Path) -> PathBuf {
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let uvs: [f32; 6] = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
        let indices: [u16; 4] = [0, 1, 2, 0];
        let mut bin = Vec::new();
        bin.extend_from_slice(bytemuck::cast_slice(&positions));
        bin.extend_from_slice(bytemuck::cast_slice(&uvs));
        bin.extend_from_slice(bytemuck::cast_slice(&indices));
        let image_offset = bin.len();
        let image = png();
        bin.extend_from_slice(&image);
        fs::write(dir.join("tri.bin"), &bin).unwrap();

        let json = format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [{{ "name": "tri", "mesh": 0 }}],
  "meshes": [{{ "name": "tri", "primitives": [{{ "attributes": {{ "POSITION": 0, "TEXCOORD_0": 1 }}, "indices": 2, "material": 0 }}] }}],
  "materials": [{{
    "pbrMetallicRoughness": {{ "baseColorTexture": {{ "index": 0 }} }},
    "normalTexture": {{ "index": 1 }}
  }}],
  "textures": [{{ "source": 0 }}, {{ "source": 1 }}],
  "images": [
    {{ "bufferView": 3, "mimeType": "image/png" }},
    {{ "uri": "data:image/png;base64,{encoded}" }}
  ],
  "buffers": [{{ "uri": "tri.bin", "byteLength": {len} }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 24 }},
    {{ "buffer": 0, "byteOffset": 60, "byteLength": 6 }},
    {{ "buffer": 0, "byteOffset": {image_offset}, "byteLength": {image_len} }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0, 0, 0], "max": [1, 1, 0] }},
    {{ "bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC2" }},
    {{ "bufferView": 2, "componentType": 5123, "count": 3, "type": "SCALAR" }}
  ]
}}"#,
            encoded = base64::encode(png()),
            len = bin.len(),
            image_len = image.len(),
        );
        let path = dir.join("tri.gltf");
        fs::write(&path, json).unwrap();
        path
    }

    fn triangle_scene(names: &[(&str, Vec<usize>)], root: usize) -> SceneData {
        let mut scene = SceneData::new(SceneFormat::Obj, "");
        scene.materials.push(MaterialRecord::named("m"));
        for (name, children) in names {
            let mesh_index = scene.meshes.len();
            let mut mesh = MeshData::new(
                vec![Vertex::default(); 3 + mesh_index],
                vec![0, 1, 2],
            );
            mesh.name = name.to_string();
            scene.meshes.push(mesh);
            scene.add_node(SceneNode {
                name: name.to_string(),
                meshes: vec![mesh_index],
                children: children.clone(),
            });
        }
        scene.root = Some(root);
        scene
    }

    #[test]
    fn shared_texture_uploads_once_across_materials() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_crate(dir.path());
        let device = Rc::new(HeadlessDevice::new());
        let model = Model::load(device.clone(), &path, &ImportOptions::default()).unwrap();

        assert_eq!(model.meshes().len(), 3);
        // shared.png, wood_spec.png and the placeholder for missing_normal.png.
        assert_eq!(device.counters().textures_created, 3);
        let stats = model.stats();
        assert_eq!(stats.textures_uploaded, 2);
        assert_eq!(stats.textures_failed, 1);
        assert_eq!(stats.textures_reused, 3);
        assert_eq!(model.directory(), dir.path());

        let lid = &model.meshes()[0];
        let side = &model.meshes()[1];
        assert_eq!(lid.textures()[0].texture, side.textures()[0].texture);
    }

    #[test]
    fn dropping_model_releases_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_crate(dir.path());
        let device = Rc::new(HeadlessDevice::new());
        let model = Model::load(device.clone(), &path, &ImportOptions::default()).unwrap();
        drop(model);
        let counters = device.counters();
        assert_eq!(counters.live_textures(), 0);
        assert_eq!(counters.live_meshes(), 0);
        assert_eq!(counters.textures_deleted, counters.textures_created);
    }

    #[test]
    fn importing_twice_is_deterministic_and_not_shared() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_crate(dir.path());
        let device = Rc::new(HeadlessDevice::new());
        let a = Model::load(device.clone(), &path, &ImportOptions::default()).unwrap();
        let b = Model::load(device.clone(), &path, &ImportOptions::default()).unwrap();

        let shape = |m: &Model| {
            m.meshes()
                .iter()
                .map(|mesh| (mesh.vertices().len(), mesh.indices().len()))
                .collect::<Vec<_>>()
        };
        assert_eq!(shape(&a), shape(&b));
        assert_eq!(a.stats(), b.stats());
        assert_eq!(device.counters().textures_created, 6);
        assert_ne!(a.textures()[0].id, b.textures()[0].id);
    }

    #[test]
    fn mesh_without_tex_coords_has_zero_tangents() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_crate(dir.path());
        let device = Rc::new(HeadlessDevice::new());
        let model = Model::load(device, &path, &ImportOptions::default()).unwrap();

        let bare = &model.meshes()[2];
        assert_eq!(bare.name(), "bare");
        assert!(!bare.has_tex_coords());
        for v in bare.vertices() {
            assert_eq!(v.tex_coords, [0.0, 0.0]);
            assert_eq!(v.tangent, [0.0; 3]);
            assert_eq!(v.bitangent, [0.0; 3]);
        }
        assert!(model.meshes()[0].has_tex_coords());
    }

    #[test]
    fn every_mesh_holds_valid_triangles() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_crate(dir.path());
        let model = Model::load(Rc::new(HeadlessDevice::new()), &path, &ImportOptions::default())
            .unwrap();
        for mesh in model.meshes() {
            assert_eq!(mesh.indices().len() % 3, 0);
            assert!(mesh.indices().iter().all(|&i| (i as usize) < mesh.vertices().len()));
        }
    }

    #[test]
    fn material_without_specular_draws_black_specular() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_crate(dir.path());
        let model = Model::load(Rc::new(HeadlessDevice::new()), &path, &ImportOptions::default())
            .unwrap();
        let painted = model.meshes()[1].material();
        assert_eq!(painted.specular, glam::Vec3::ZERO);
        assert_eq!(painted.shininess, 0.0);
        assert_eq!(model.meshes()[0].material().shininess, 8.0);
    }

    #[test]
    fn missing_file_fails_without_allocating() {
        let device = Rc::new(HeadlessDevice::new());
        let result = Model::load(device.clone(), "/no/such/model.obj", &ImportOptions::default());
        assert!(matches!(result, Err(ImportError::Scene(SceneError::NotFound(_)))));
        assert!(device.commands().is_empty());
    }

    #[test]
    fn draw_order_is_preorder() {
        // Arena order: grandchild, child, root.
        let scene = triangle_scene(
            &[("grandchild", vec![]), ("child", vec![0]), ("root", vec![1])],
            2,
        );
        let device = Rc::new(HeadlessDevice::new());
        let model = Model::from_scene(device.clone(), &scene, &ImportOptions::default());
        let names: Vec<_> = model.meshes().iter().map(Mesh::name).collect();
        assert_eq!(names, ["root", "child", "grandchild"]);

        device.take_commands();
        model.draw(ProgramId(1));
        let commands = device.take_commands();
        let drawn: Vec<_> = commands
            .iter()
            .filter_map(|c| match c {
                Command::DrawIndexed { vao, .. } => Some(*vao),
                _ => None,
            })
            .collect();
        let expected: Vec<_> = model.meshes().iter().map(|m| m.buffers().vao).collect();
        assert_eq!(drawn, expected);
        assert_eq!(commands.last(), Some(&Command::ActiveTexture(0)));
    }

    #[test]
    fn two_slots_one_texture_binds_two_samplers() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("both.png"), png()).unwrap();
        let mut scene = triangle_scene(&[("tri", vec![])], 0);
        scene.directory = dir.path().to_path_buf();
        scene.materials[0].push_texture(TextureKind::Diffuse, "both.png");
        scene.materials[0].push_texture(TextureKind::Specular, "both.png");

        let device = Rc::new(HeadlessDevice::new());
        let model = Model::from_scene(device.clone(), &scene, &ImportOptions::default());
        assert_eq!(device.counters().textures_created, 1);

        device.take_commands();
        model.draw(ProgramId(3));
        let texture = model.textures()[0].id;
        let commands = device.take_commands();
        let bound = commands
            .iter()
            .filter(|c| **c == Command::BindTexture(texture))
            .count();
        assert_eq!(bound, 2);
        assert!(commands.iter().any(|c| matches!(
            c,
            Command::Uniform { name, .. } if name == "texture_specular1"
        )));
    }

    #[test]
    fn invalid_mesh_is_skipped_and_counted() {
        let mut scene = triangle_scene(&[("good", vec![1]), ("broken", vec![])], 0);
        scene.meshes[1].indices = vec![0, 1, 9];
        let device = Rc::new(HeadlessDevice::new());
        let model = Model::from_scene(device.clone(), &scene, &ImportOptions::default());
        assert_eq!(model.meshes().len(), 1);
        assert_eq!(model.stats().skipped_meshes, 1);
        assert_eq!(device.counters().meshes_created, 1);
    }

    #[test]
    fn gltf_embedded_images_bind_to_their_slots() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_gltf(dir.path());
        let device = Rc::new(HeadlessDevice::new());
        let model = Model::load(device.clone(), &path, &ImportOptions::default()).unwrap();

        assert_eq!(model.meshes().len(), 1);
        let references: Vec<_> = model
            .textures()
            .iter()
            .map(|t| (t.reference.as_str(), t.slot, t.degraded))
            .collect();
        assert_eq!(
            references,
            [("*0", Slot::Diffuse, false), ("*1", Slot::Normal, false)]
        );
        assert_eq!(device.counters().textures_created, 2);

        device.take_commands();
        model.draw(ProgramId(2));
        let commands = device.take_commands();
        let diffuse = model.textures()[0].id;
        let normal = model.textures()[1].id;
        assert_eq!(
            commands[..6],
            [
                Command::ActiveTexture(0),
                Command::Uniform {
                    program: ProgramId(2),
                    name: "texture_diffuse1".into(),
                    value: UniformValue::Int(0),
                },
                Command::BindTexture(diffuse),
                Command::ActiveTexture(1),
                Command::Uniform {
                    program: ProgramId(2),
                    name: "texture_normal1".into(),
                    value: UniformValue::Int(1),
                },
                Command::BindTexture(normal),
            ]
        );
    }
}
