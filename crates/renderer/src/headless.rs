//! Context-free device that hands out handles, counts live objects and records
//! every call. Used by tests and by the CLI to inspect imports without a GPU.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;

use asset::{InternalFormat, TextureData};
use glam::Vec3;

use crate::device::{
    BufferId, DeviceError, GraphicsDevice, MeshBuffers, ProgramId, SamplerParams, TextureId,
    VertexArrayId, VertexLayout,
};

#[derive(Clone, Debug, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec3(Vec3),
}

/// One recorded device call.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    CreateTexture {
        texture: TextureId,
        width: u32,
        height: u32,
        format: InternalFormat,
        sampler: SamplerParams,
    },
    DeleteTexture(TextureId),
    CreateMesh {
        vao: VertexArrayId,
        vertex_bytes: usize,
        index_count: usize,
    },
    DeleteMesh(VertexArrayId),
    ActiveTexture(u32),
    BindTexture(TextureId),
    Uniform {
        program: ProgramId,
        name: String,
        value: UniformValue,
    },
    DrawIndexed {
        vao: VertexArrayId,
        index_count: u32,
    },
}

/// Allocation counters since the device was created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceCounters {
    pub textures_created: usize,
    pub textures_deleted: usize,
    pub meshes_created: usize,
    pub meshes_deleted: usize,
    pub draw_calls: usize,
}

impl DeviceCounters {
    pub fn live_textures(&self) -> usize {
        self.textures_created - self.textures_deleted
    }

    pub fn live_meshes(&self) -> usize {
        self.meshes_created - self.meshes_deleted
    }
}

#[derive(Debug, Default)]
pub struct HeadlessDevice {
    next_handle: Cell<u32>,
    counters: Cell<DeviceCounters>,
    live_textures: RefCell<BTreeSet<TextureId>>,
    commands: RefCell<Vec<Command>>,
    /// When set, every texture creation fails.
    fail_textures: Cell<bool>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counters(&self) -> DeviceCounters {
        self.counters.get()
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.borrow().clone()
    }

    /// Drain the recorded calls, e.g. to look at a single frame.
    pub fn take_commands(&self) -> Vec<Command> {
        std::mem::take(&mut *self.commands.borrow_mut())
    }

    pub fn is_live(&self, texture: TextureId) -> bool {
        self.live_textures.borrow().contains(&texture)
    }

    pub fn set_fail_textures(&self, fail: bool) {
        self.fail_textures.set(fail);
    }

    fn handle(&self) -> u32 {
        let next = self.next_handle.get() + 1;
        self.next_handle.set(next);
        next
    }

    fn count(&self, update: impl FnOnce(&mut DeviceCounters)) {
        let mut counters = self.counters.get();
        update(&mut counters);
        self.counters.set(counters);
    }

    fn record(&self, command: Command) {
        self.commands.borrow_mut().push(command);
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_texture(
        &self,
        data: &TextureData,
        sampler: &SamplerParams,
    ) -> Result<TextureId, DeviceError> {
        if self.fail_textures.get() {
            return Err(DeviceError::Allocation {
                what: "texture",
                reason: "out of texture memory".into(),
            });
        }
        let texture = TextureId(self.handle());
        self.live_textures.borrow_mut().insert(texture);
        self.count(|c| c.textures_created += 1);
        self.record(Command::CreateTexture {
            texture,
            width: data.width,
            height: data.height,
            format: data.internal_format(),
            sampler: *sampler,
        });
        Ok(texture)
    }

    fn delete_texture(&self, texture: TextureId) {
        if self.live_textures.borrow_mut().remove(&texture) {
            self.count(|c| c.textures_deleted += 1);
            self.record(Command::DeleteTexture(texture));
        } else {
            log::warn!("Deleting unknown texture {texture:?}");
        }
    }

    fn create_mesh_buffers(
        &self,
        vertices: &[u8],
        indices: &[u32],
        _layout: &VertexLayout,
    ) -> Result<MeshBuffers, DeviceError> {
        let buffers = MeshBuffers {
            vao: VertexArrayId(self.handle()),
            vbo: BufferId(self.handle()),
            ebo: BufferId(self.handle()),
        };
        self.count(|c| c.meshes_created += 1);
        self.record(Command::CreateMesh {
            vao: buffers.vao,
            vertex_bytes: vertices.len(),
            index_count: indices.len(),
        });
        Ok(buffers)
    }

    fn delete_mesh_buffers(&self, buffers: MeshBuffers) {
        self.count(|c| c.meshes_deleted += 1);
        self.record(Command::DeleteMesh(buffers.vao));
    }

    fn active_texture(&self, unit: u32) {
        self.record(Command::ActiveTexture(unit));
    }

    fn bind_texture(&self, texture: TextureId) {
        self.record(Command::BindTexture(texture));
    }

    fn set_uniform_i32(&self, program: ProgramId, name: &str, value: i32) {
        self.record(Command::Uniform {
            program,
            name: name.to_owned(),
            value: UniformValue::Int(value),
        });
    }

    fn set_uniform_f32(&self, program: ProgramId, name: &str, value: f32) {
        self.record(Command::Uniform {
            program,
            name: name.to_owned(),
            value: UniformValue::Float(value),
        });
    }

    fn set_uniform_vec3(&self, program: ProgramId, name: &str, value: Vec3) {
        self.record(Command::Uniform {
            program,
            name: name.to_owned(),
            value: UniformValue::Vec3(value),
        });
    }

    fn draw_indexed(&self, vao: VertexArrayId, index_count: u32) {
        self.count(|c| c.draw_calls += 1);
        self.record(Command::DrawIndexed { vao, index_count });
    }
}
