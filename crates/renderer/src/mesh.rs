//! GPU-resident mesh: validated vertex/index data plus the buffers backing it.

use std::rc::Rc;

use asset::mesh::validate_triangles;
use asset::{MaterialSnapshot, MeshError, Slot, Vertex};

use crate::device::{GraphicsDevice, MeshBuffers, ProgramId, TextureId, VERTEX_LAYOUT};

/// A texture binding: the slot it is sampled as and its index in the model's
/// texture arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshTexture {
    pub slot: Slot,
    pub texture: usize,
}

pub struct Mesh {
    device: Rc<dyn GraphicsDevice>,
    name: String,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    textures: Vec<MeshTexture>,
    material: MaterialSnapshot,
    has_tex_coords: bool,
    buffers: MeshBuffers,
}

impl Mesh {
    /// Validate, then upload. Invalid input allocates nothing.
    pub fn build(
        device: Rc<dyn GraphicsDevice>,
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
        textures: Vec<MeshTexture>,
        material: MaterialSnapshot,
    ) -> Result<Self, MeshError> {
        validate_triangles(vertices.len(), &indices)?;
        let buffers = device
            .create_mesh_buffers(bytemuck::cast_slice(&vertices), &indices, &VERTEX_LAYOUT)
            .map_err(|e| MeshError::Upload(e.to_string()))?;
        Ok(Self {
            device,
            name: String::new(),
            vertices,
            indices,
            textures,
            material,
            has_tex_coords: true,
            buffers,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_tex_coords(mut self, has_tex_coords: bool) -> Self {
        self.has_tex_coords = has_tex_coords;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn textures(&self) -> &[MeshTexture] {
        &self.textures
    }

    pub fn material(&self) -> &MaterialSnapshot {
        &self.material
    }

    pub fn has_tex_coords(&self) -> bool {
        self.has_tex_coords
    }

    pub fn buffers(&self) -> MeshBuffers {
        self.buffers
    }

    /// Bind textures to units 0.. with `<prefix><n>` sampler names (n counted
    /// per slot from 1), set the material uniforms and issue one draw.
    /// `arena` resolves texture indices; out-of-range indices bind nothing.
    pub fn draw(&self, program: ProgramId, arena: &[TextureId]) {
        let device = &*self.device;
        let mut counters = [0u32; Slot::ALL.len()];
        for (unit, binding) in self.textures.iter().enumerate() {
            let counter = &mut counters[binding.slot.index()];
            *counter += 1;
            let name = format!("{}{}", binding.slot.sampler_prefix(), counter);
            let unit = unit as u32;
            device.active_texture(unit);
            device.set_uniform_i32(program, &name, unit as i32);
            device.bind_texture(arena.get(binding.texture).copied().unwrap_or_default());
        }

        device.set_uniform_vec3(program, "Ka", self.material.ambient);
        device.set_uniform_vec3(program, "Kd", self.material.diffuse);
        device.set_uniform_vec3(program, "Ks", self.material.specular);
        device.set_uniform_f32(program, "shininess", self.material.shininess);

        device.draw_indexed(self.buffers.vao, self.indices.len() as u32);
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        self.device.delete_mesh_buffers(self.buffers);
    }
}

impl std::fmt::Debug for Mesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mesh")
            .field("name", &self.name)
            .field("vertices", &self.vertices.len())
            .field("indices", &self.indices.len())
            .field("textures", &self.textures)
            .field("buffers", &self.buffers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{Command, HeadlessDevice, UniformValue};
    use glam::Vec3;

    fn triangle() -> Vec<Vertex> {
        vec![
            Vertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            Vertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
        ]
    }

    fn sampler_names(commands: &[Command]) -> Vec<(String, i32)> {
        commands
            .iter()
            .filter_map(|c| match c {
                Command::Uniform {
                    name,
                    value: UniformValue::Int(unit),
                    ..
                } => Some((name.clone(), *unit)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn invalid_input_allocates_nothing() {
        let device = Rc::new(HeadlessDevice::new());
        let cases = [
            (Vec::new(), vec![]),
            (triangle(), vec![0, 1]),
            (triangle(), vec![0, 1, 3]),
        ];
        for (vertices, indices) in cases {
            let result = Mesh::build(
                device.clone(),
                vertices,
                indices,
                Vec::new(),
                MaterialSnapshot::default(),
            );
            assert!(result.is_err());
        }
        assert_eq!(device.counters().meshes_created, 0);
    }

    #[test]
    fn out_of_range_index_is_described() {
        let device = Rc::new(HeadlessDevice::new());
        let err = Mesh::build(
            device,
            triangle(),
            vec![0, 1, 5],
            Vec::new(),
            MaterialSnapshot::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            MeshError::IndexOutOfRange {
                index: 5,
                position: 2,
                vertex_count: 3
            }
        );
    }

    #[test]
    fn draw_numbers_samplers_per_slot() {
        let device = Rc::new(HeadlessDevice::new());
        let textures = vec![
            MeshTexture {
                slot: Slot::Diffuse,
                texture: 0,
            },
            MeshTexture {
                slot: Slot::Diffuse,
                texture: 1,
            },
            MeshTexture {
                slot: Slot::Specular,
                texture: 2,
            },
            MeshTexture {
                slot: Slot::Normal,
                texture: 0,
            },
            MeshTexture {
                slot: Slot::Reflection,
                texture: 3,
            },
        ];
        let mesh = Mesh::build(
            device.clone(),
            triangle(),
            vec![0, 1, 2],
            textures,
            MaterialSnapshot::default(),
        )
        .unwrap();
        device.take_commands();

        let arena = [TextureId(10), TextureId(11), TextureId(12), TextureId(13)];
        mesh.draw(ProgramId(1), &arena);
        let commands = device.take_commands();
        assert_eq!(
            sampler_names(&commands),
            [
                ("texture_diffuse1".to_owned(), 0),
                ("texture_diffuse2".to_owned(), 1),
                ("texture_specular1".to_owned(), 2),
                ("texture_normal1".to_owned(), 3),
                ("texture_refl1".to_owned(), 4),
            ]
        );
        let bound: Vec<_> = commands
            .iter()
            .filter_map(|c| match c {
                Command::BindTexture(t) => Some(t.0),
                _ => None,
            })
            .collect();
        assert_eq!(bound, [10, 11, 12, 10, 13]);
        assert_eq!(
            commands.last(),
            Some(&Command::DrawIndexed {
                vao: mesh.buffers().vao,
                index_count: 3
            })
        );
    }

    #[test]
    fn draw_sets_material_uniforms() {
        let device = Rc::new(HeadlessDevice::new());
        let material = MaterialSnapshot {
            diffuse: Vec3::new(0.8, 0.1, 0.1),
            shininess: 16.0,
            ..MaterialSnapshot::default()
        };
        let mesh = Mesh::build(device.clone(), triangle(), vec![0, 1, 2], Vec::new(), material)
            .unwrap();
        device.take_commands();
        mesh.draw(ProgramId(1), &[]);

        let commands = device.take_commands();
        let uniform = |wanted: &str| {
            commands.iter().find_map(|c| match c {
                Command::Uniform { name, value, .. } if name == wanted => Some(value.clone()),
                _ => None,
            })
        };
        assert_eq!(uniform("Kd"), Some(UniformValue::Vec3(Vec3::new(0.8, 0.1, 0.1))));
        assert_eq!(uniform("Ks"), Some(UniformValue::Vec3(Vec3::ZERO)));
        assert_eq!(uniform("shininess"), Some(UniformValue::Float(16.0)));
    }

    #[test]
    fn drop_releases_buffers() {
        let device = Rc::new(HeadlessDevice::new());
        let mesh = Mesh::build(
            device.clone(),
            triangle(),
            vec![0, 1, 2],
            Vec::new(),
            MaterialSnapshot::default(),
        )
        .unwrap();
        assert_eq!(device.counters().live_meshes(), 1);
        drop(mesh);
        assert_eq!(device.counters().live_meshes(), 0);
    }
}
