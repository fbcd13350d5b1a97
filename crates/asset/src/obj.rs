//! OBJ/MTL front-end built on `tobj`.
//!
//! OBJ has no node hierarchy: the root node gets one child per object/group,
//! each owning that group's mesh.

use std::path::Path;

use glam::Vec3;

use crate::material::{MaterialRecord, TextureKind};
use crate::mesh::{MeshData, Vertex};
use crate::scene::{SceneData, SceneError, SceneNode, base_directory};
use crate::slots::SceneFormat;

/// MTL statements `tobj` leaves in `unknown_param`, with the kind each maps to.
const EXTRA_MAP_KEYS: [(&str, TextureKind); 7] = [
    ("bump", TextureKind::Height),
    ("map_bump", TextureKind::Height),
    ("map_Bump", TextureKind::Height),
    ("norm", TextureKind::Normals),
    ("refl", TextureKind::Reflection),
    ("disp", TextureKind::Displacement),
    ("map_Ke", TextureKind::Emissive),
];

/// Texture statement options: (name, required args, max args). Arguments past
/// the required ones are only consumed while they are numeric.
const MAP_OPTIONS: [(&str, usize, usize); 12] = [
    ("-blendu", 1, 1),
    ("-blendv", 1, 1),
    ("-boost", 1, 1),
    ("-mm", 2, 2),
    ("-o", 1, 3),
    ("-s", 1, 3),
    ("-t", 1, 3),
    ("-texres", 1, 1),
    ("-clamp", 1, 1),
    ("-bm", 1, 1),
    ("-imfchan", 1, 1),
    ("-type", 1, 1),
];

/// Load an OBJ file (and the MTL libraries it references) into an owned scene.
pub fn load_obj_scene(path: &Path) -> Result<SceneData, SceneError> {
    let options = tobj::LoadOptions {
        single_index: true,
        triangulate: true,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    };
    let (models, materials) = tobj::load_obj(path, &options).map_err(|source| SceneError::Obj {
        path: path.to_path_buf(),
        source,
    })?;

    let materials = materials.unwrap_or_else(|e| {
        log::warn!("No usable MTL for {}: {e}; using default material", path.display());
        Vec::new()
    });

    let mut scene = SceneData::new(SceneFormat::Obj, base_directory(path));
    scene.materials = materials.iter().map(convert_material).collect();

    let root_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut children = Vec::with_capacity(models.len());
    let mut default_material = None;

    for model in models {
        let material = match model.mesh.material_id {
            Some(id) if id < scene.materials.len() => id,
            other => {
                if let Some(id) = other {
                    log::warn!("Mesh '{}' uses unknown material {id}", model.name);
                }
                *default_material.get_or_insert_with(|| {
                    scene.materials.push(MaterialRecord::named("DefaultMaterial"));
                    scene.materials.len() - 1
                })
            }
        };

        let mut mesh = convert_mesh(&model.name, &model.mesh);
        mesh.material = material;
        if mesh.indices.is_empty() {
            log::debug!("Skipping empty OBJ group '{}'", model.name);
            continue;
        }
        scene.meshes.push(mesh);
        let node = scene.add_node(SceneNode {
            name: model.name,
            meshes: vec![scene.meshes.len() - 1],
            children: Vec::new(),
        });
        children.push(node);
    }

    let root = scene.add_node(SceneNode {
        name: root_name,
        meshes: Vec::new(),
        children,
    });
    scene.root = Some(root);
    Ok(scene)
}

fn convert_mesh(name: &str, mesh: &tobj::Mesh) -> MeshData {
    let vertex_count = mesh.positions.len() / 3;
    let has_normals = !mesh.normals.is_empty() && mesh.normals.len() == mesh.positions.len();
    let has_tex_coords = !mesh.texcoords.is_empty() && mesh.texcoords.len() / 2 == vertex_count;

    let vertices = (0..vertex_count)
        .map(|i| {
            let position = [
                mesh.positions[3 * i],
                mesh.positions[3 * i + 1],
                mesh.positions[3 * i + 2],
            ];
            let normal = if has_normals {
                [
                    mesh.normals[3 * i],
                    mesh.normals[3 * i + 1],
                    mesh.normals[3 * i + 2],
                ]
            } else {
                [0.0; 3]
            };
            let uv = if has_tex_coords {
                [mesh.texcoords[2 * i], mesh.texcoords[2 * i + 1]]
            } else {
                [0.0, 0.0]
            };
            Vertex::new(position, normal, uv)
        })
        .collect();

    MeshData {
        name: name.to_owned(),
        vertices,
        indices: mesh.indices.clone(),
        material: 0,
        has_tex_coords,
        has_normals,
    }
}

fn convert_material(mtl: &tobj::Material) -> MaterialRecord {
    let mut record = MaterialRecord {
        name: mtl.name.clone(),
        ambient: mtl.ambient.map(Vec3::from),
        diffuse: mtl.diffuse.map(Vec3::from),
        specular: mtl.specular.map(Vec3::from),
        shininess: mtl.shininess,
        optical_density: mtl.optical_density,
        textures: Vec::new(),
    };

    let known = [
        (TextureKind::Diffuse, &mtl.diffuse_texture),
        (TextureKind::Specular, &mtl.specular_texture),
        (TextureKind::Ambient, &mtl.ambient_texture),
        (TextureKind::Height, &mtl.normal_texture),
        (TextureKind::Shininess, &mtl.shininess_texture),
        (TextureKind::Opacity, &mtl.dissolve_texture),
    ];
    for (kind, statement) in known {
        if let Some(statement) = statement {
            record.push_texture(kind, texture_reference(statement));
        }
    }
    for (key, kind) in EXTRA_MAP_KEYS {
        if let Some(statement) = mtl.unknown_param.get(key) {
            record.push_texture(kind, texture_reference(statement));
        }
    }
    record
}

/// Reduce a texture statement (`-bm 0.5 maps\bump.png`) to its file reference.
pub fn texture_reference(statement: &str) -> String {
    let mut tokens = statement.split_whitespace().peekable();
    while let Some(&token) = tokens.peek() {
        let Some(&(_, required, max)) = MAP_OPTIONS.iter().find(|(opt, _, _)| *opt == token)
        else {
            break;
        };
        tokens.next();
        for _ in 0..required {
            tokens.next();
        }
        for _ in required..max {
            if tokens.next_if(|arg| arg.parse::<f32>().is_ok()).is_none() {
                break;
            }
        }
    }
    tokens.collect::<Vec<_>>().join(" ").replace('\\', "/")
}
