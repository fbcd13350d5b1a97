//! glTF 2.0 front-end (`.gltf` and `.glb`) built on the `gltf` crate.
//!
//! Every primitive becomes one [`MeshData`]. Images stored in buffer views
//! become embedded textures referenced as `*N`; external images keep their
//! URI as a path relative to the model.

use std::path::Path;

use glam::Vec3;
use gltf::mesh::Mode;

use crate::material::{MaterialRecord, TextureKind};
use crate::mesh::{MeshData, Vertex};
use crate::scene::{EmbeddedTexture, SceneData, SceneError, SceneNode, base_directory};
use crate::slots::SceneFormat;

const MAX_NODE_DEPTH: usize = 256;

pub fn load_gltf_scene(path: &Path) -> Result<SceneData, SceneError> {
    let to_err = |source| SceneError::Gltf {
        path: path.to_path_buf(),
        source,
    };
    let gltf::Gltf { document, blob } = gltf::Gltf::open(path).map_err(to_err)?;
    let directory = base_directory(path);
    let buffers =
        gltf::import_buffers(&document, Some(directory.as_path()), blob).map_err(to_err)?;

    let mut scene = SceneData::new(SceneFormat::Gltf, directory);
    let image_refs = collect_images(&document, &buffers, &mut scene);
    scene.materials = document
        .materials()
        .map(|m| convert_material(&m, &image_refs))
        .collect();

    let mut default_material = None;
    let mut mesh_map: Vec<Vec<usize>> = Vec::with_capacity(document.meshes().len());
    for mesh in document.meshes() {
        let mut converted = Vec::new();
        for primitive in mesh.primitives() {
            let Some(mut data) = convert_primitive(&mesh, &primitive, &buffers) else {
                continue;
            };
            data.material = match primitive.material().index() {
                Some(i) => i,
                None => *default_material.get_or_insert_with(|| {
                    scene.materials.push(MaterialRecord::named("DefaultMaterial"));
                    scene.materials.len() - 1
                }),
            };
            scene.meshes.push(data);
            converted.push(scene.meshes.len() - 1);
        }
        mesh_map.push(converted);
    }

    let Some(gltf_scene) = document.default_scene().or_else(|| document.scenes().next()) else {
        return Err(SceneError::NoRoot);
    };
    let mut nodes = NodeConverter::new(document.nodes().len(), &mesh_map);
    let roots = gltf_scene
        .nodes()
        .map(|node| nodes.add(&node, &mut scene, 0))
        .collect::<Result<Vec<usize>, SceneError>>()?;
    scene.root = match roots.as_slice() {
        [] => None,
        [single] => Some(*single),
        _ => Some(scene.add_node(SceneNode {
            name: gltf_scene.name().unwrap_or("Root").to_owned(),
            meshes: Vec::new(),
            children: roots,
        })),
    };
    Ok(scene)
}

/// Copies glTF nodes into the arena. A node reached twice is converted once;
/// a node reached from one of its own descendants fails the import.
struct NodeConverter<'a> {
    mesh_map: &'a [Vec<usize>],
    converted: Vec<Option<usize>>,
    on_path: Vec<bool>,
}

impl<'a> NodeConverter<'a> {
    fn new(node_count: usize, mesh_map: &'a [Vec<usize>]) -> Self {
        Self {
            mesh_map,
            converted: vec![None; node_count],
            on_path: vec![false; node_count],
        }
    }

    fn add(
        &mut self,
        node: &gltf::Node,
        scene: &mut SceneData,
        depth: usize,
    ) -> Result<usize, SceneError> {
        let index = node.index();
        if index >= self.converted.len() {
            return Err(SceneError::Incomplete(format!("node {index} does not exist")));
        }
        if let Some(existing) = self.converted[index] {
            return Ok(existing);
        }
        if self.on_path[index] {
            return Err(SceneError::Incomplete(format!("node {index} is its own ancestor")));
        }
        if depth >= MAX_NODE_DEPTH {
            return Err(SceneError::Incomplete(format!(
                "node hierarchy deeper than {MAX_NODE_DEPTH}"
            )));
        }

        self.on_path[index] = true;
        let children = node
            .children()
            .map(|child| self.add(&child, scene, depth + 1))
            .collect::<Result<Vec<usize>, SceneError>>()?;
        self.on_path[index] = false;

        let meshes = node
            .mesh()
            .and_then(|m| self.mesh_map.get(m.index()).cloned())
            .unwrap_or_default();
        let added = scene.add_node(SceneNode {
            name: node.name().unwrap_or_default().to_owned(),
            meshes,
            children,
        });
        self.converted[index] = Some(added);
        Ok(added)
    }
}

/// Texture reference for every glTF image, by image index.
fn collect_images(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    scene: &mut SceneData,
) -> Vec<Option<String>> {
    document
        .images()
        .map(|image| match image.source() {
            gltf::image::Source::View { view, mime_type } => {
                let start = view.offset();
                let end = start + view.length();
                let bytes = buffers
                    .get(view.buffer().index())
                    .and_then(|data| data.0.get(start..end));
                let Some(bytes) = bytes else {
                    log::warn!("Image {} points outside its buffer", image.index());
                    return None;
                };
                Some(scene.push_embedded(EmbeddedTexture {
                    bytes: bytes.to_vec(),
                    mime_type: Some(mime_type.to_owned()),
                }))
            }
            gltf::image::Source::Uri { uri, mime_type } if uri.starts_with("data:") => {
                let embedded = decode_data_uri(uri, mime_type).unwrap_or_else(|| {
                    // Kept as an empty blob so the slot degrades instead of vanishing.
                    log::warn!("Image {} has a malformed data URI", image.index());
                    EmbeddedTexture {
                        bytes: Vec::new(),
                        mime_type: mime_type.map(str::to_owned),
                    }
                });
                Some(scene.push_embedded(embedded))
            }
            gltf::image::Source::Uri { uri, .. } => Some(percent_decode(uri)),
        })
        .collect()
}

/// Decodes `data:[<mime>][;base64],<payload>`.
fn decode_data_uri(uri: &str, mime_type: Option<&str>) -> Option<EmbeddedTexture> {
    let (header, payload) = uri.strip_prefix("data:")?.split_once(',')?;
    let mut params = header.split(';');
    let declared = params.next().filter(|m| !m.is_empty());
    let bytes = if params.any(|p| p == "base64") {
        let payload: String = payload.split_ascii_whitespace().collect();
        base64::decode(payload).ok()?
    } else {
        percent_decode_bytes(payload)
    };
    Some(EmbeddedTexture {
        bytes,
        mime_type: declared.or(mime_type).map(str::to_owned),
    })
}

fn convert_material(material: &gltf::Material, images: &[Option<String>]) -> MaterialRecord {
    let pbr = material.pbr_metallic_roughness();
    let [r, g, b, _] = pbr.base_color_factor();
    let mut record = MaterialRecord {
        name: material.name().unwrap_or_default().to_owned(),
        diffuse: Some(Vec3::new(r, g, b)),
        ..MaterialRecord::default()
    };

    let mut add = |kind: TextureKind, texture: gltf::Texture| {
        if let Some(Some(reference)) = images.get(texture.source().index()) {
            record.push_texture(kind, reference.clone());
        }
    };
    if let Some(info) = pbr.base_color_texture() {
        add(TextureKind::BaseColor, info.texture());
    }
    if let Some(info) = pbr.metallic_roughness_texture() {
        add(TextureKind::MetallicRoughness, info.texture());
    }
    if let Some(normal) = material.normal_texture() {
        add(TextureKind::Normals, normal.texture());
    }
    if let Some(occlusion) = material.occlusion_texture() {
        add(TextureKind::Occlusion, occlusion.texture());
    }
    if let Some(info) = material.emissive_texture() {
        add(TextureKind::Emissive, info.texture());
    }
    record
}

fn convert_primitive(
    mesh: &gltf::Mesh,
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
) -> Option<MeshData> {
    let name = format!("{}#{}", mesh.name().unwrap_or("mesh"), primitive.index());
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| d.0.as_slice()));

    let Some(positions) = reader.read_positions() else {
        log::warn!("Primitive '{name}' has no POSITION attribute; skipped");
        return None;
    };
    let positions: Vec<[f32; 3]> = positions.collect();
    let count = positions.len();

    let normals: Option<Vec<[f32; 3]>> = reader
        .read_normals()
        .map(|n| n.collect())
        .filter(|n: &Vec<_>| n.len() == count);
    let uvs: Option<Vec<[f32; 2]>> = reader
        .read_tex_coords(0)
        .map(|tc| tc.into_f32().collect())
        .filter(|t: &Vec<_>| t.len() == count);
    let joints: Option<Vec<[u16; 4]>> = reader
        .read_joints(0)
        .map(|j| j.into_u16().collect())
        .filter(|j: &Vec<_>| j.len() == count);
    let weights: Option<Vec<[f32; 4]>> = reader
        .read_weights(0)
        .map(|w| w.into_f32().collect())
        .filter(|w: &Vec<_>| w.len() == count);

    let raw: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..count as u32).collect(),
    };
    let indices = match primitive.mode() {
        Mode::Triangles => raw,
        Mode::TriangleStrip => strip_to_list(&raw),
        Mode::TriangleFan => fan_to_list(&raw),
        mode => {
            log::warn!("Primitive '{name}' uses {mode:?} topology; skipped");
            return None;
        }
    };

    let vertices = (0..count)
        .map(|i| {
            let normal = normals.as_ref().map_or([0.0; 3], |n| n[i]);
            // Stored bottom-left like OBJ, so the shared V flip restores glTF's top-left origin.
            let uv = uvs.as_ref().map_or([0.0; 2], |t| [t[i][0], 1.0 - t[i][1]]);
            let mut vertex = Vertex::new(positions[i], normal, uv);
            if let (Some(joints), Some(weights)) = (&joints, &weights) {
                vertex.bone_ids = joints[i].map(i32::from);
                vertex.bone_weights = weights[i];
            }
            vertex
        })
        .collect();

    Some(MeshData {
        name,
        vertices,
        indices,
        material: 0,
        has_tex_coords: uvs.is_some(),
        has_normals: normals.is_some(),
    })
}

pub fn strip_to_list(strip: &[u32]) -> Vec<u32> {
    let mut list = Vec::with_capacity(strip.len().saturating_sub(2) * 3);
    for (i, w) in strip.windows(3).enumerate() {
        // Odd triangles swap their first two vertices to keep the winding.
        if i % 2 == 0 {
            list.extend_from_slice(&[w[0], w[1], w[2]]);
        } else {
            list.extend_from_slice(&[w[1], w[0], w[2]]);
        }
    }
    list
}

pub fn fan_to_list(fan: &[u32]) -> Vec<u32> {
    let Some((&center, rest)) = fan.split_first() else {
        return Vec::new();
    };
    rest.windows(2).flat_map(|w| [center, w[0], w[1]]).collect()
}

fn percent_decode(uri: &str) -> String {
    String::from_utf8_lossy(&percent_decode_bytes(uri)).into_owned()
}

fn percent_decode_bytes(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = text
                .get(i + 1..i + 3)
                .and_then(|h| u8::from_str_radix(h, 16).ok());
            if let Some(value) = hex {
                out.push(value);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}
