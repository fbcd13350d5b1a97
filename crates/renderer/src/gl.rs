//! OpenGL 3.3 core backend on `glow`.

use std::num::NonZeroU32;

use asset::{InternalFormat, PixelFormat, TextureData};
use glam::Vec3;
use glow::HasContext;

use crate::device::{
    AttributeKind, BufferId, DeviceError, FilterMode, GraphicsDevice, MeshBuffers, ProgramId,
    SamplerParams, TextureId, VertexArrayId, VertexLayout, WrapMode,
};

pub struct GlDevice {
    gl: glow::Context,
}

impl GlDevice {
    /// # Safety
    /// `gl` must stay current on the calling thread for the device's lifetime.
    pub unsafe fn new(gl: glow::Context) -> Self {
        Self { gl }
    }

    pub fn context(&self) -> &glow::Context {
        &self.gl
    }
}

pub fn gl_internal_format(format: InternalFormat) -> u32 {
    match format {
        InternalFormat::R8 => glow::R8,
        InternalFormat::Rgb8 => glow::RGB8,
        InternalFormat::Rgba8 => glow::RGBA8,
        InternalFormat::Srgb8 => glow::SRGB8,
        InternalFormat::Srgb8Alpha8 => glow::SRGB8_ALPHA8,
    }
}

pub fn gl_pixel_format(format: PixelFormat) -> u32 {
    match format {
        PixelFormat::R8 => glow::RED,
        PixelFormat::Rgb8 => glow::RGB,
        PixelFormat::Rgba8 => glow::RGBA,
    }
}

pub fn gl_wrap(wrap: WrapMode) -> i32 {
    (match wrap {
        WrapMode::Repeat => glow::REPEAT,
        WrapMode::MirroredRepeat => glow::MIRRORED_REPEAT,
        WrapMode::ClampToEdge => glow::CLAMP_TO_EDGE,
    }) as i32
}

pub fn gl_filter(filter: FilterMode) -> i32 {
    (match filter {
        FilterMode::Nearest => glow::NEAREST,
        FilterMode::Linear => glow::LINEAR,
        FilterMode::NearestMipmapNearest => glow::NEAREST_MIPMAP_NEAREST,
        FilterMode::LinearMipmapNearest => glow::LINEAR_MIPMAP_NEAREST,
        FilterMode::NearestMipmapLinear => glow::NEAREST_MIPMAP_LINEAR,
        FilterMode::LinearMipmapLinear => glow::LINEAR_MIPMAP_LINEAR,
    }) as i32
}

/// A mipmapped min filter on a texture without mipmaps leaves it incomplete.
pub fn effective_min_filter(sampler: &SamplerParams) -> FilterMode {
    match sampler.min_filter {
        FilterMode::NearestMipmapNearest | FilterMode::NearestMipmapLinear
            if !sampler.generate_mipmaps =>
        {
            FilterMode::Nearest
        }
        FilterMode::LinearMipmapNearest | FilterMode::LinearMipmapLinear
            if !sampler.generate_mipmaps =>
        {
            FilterMode::Linear
        }
        filter => filter,
    }
}

fn native_texture(id: TextureId) -> Option<glow::NativeTexture> {
    NonZeroU32::new(id.0).map(glow::NativeTexture)
}

fn native_program(id: ProgramId) -> Option<glow::NativeProgram> {
    NonZeroU32::new(id.0).map(glow::NativeProgram)
}

fn native_vertex_array(id: VertexArrayId) -> Option<glow::NativeVertexArray> {
    NonZeroU32::new(id.0).map(glow::NativeVertexArray)
}

fn native_buffer(id: BufferId) -> Option<glow::NativeBuffer> {
    NonZeroU32::new(id.0).map(glow::NativeBuffer)
}

fn allocation(what: &'static str) -> impl FnOnce(String) -> DeviceError {
    move |reason| DeviceError::Allocation { what, reason }
}

impl GraphicsDevice for GlDevice {
    fn create_texture(
        &self,
        data: &TextureData,
        sampler: &SamplerParams,
    ) -> Result<TextureId, DeviceError> {
        let too_large = || DeviceError::TextureTooLarge {
            width: data.width,
            height: data.height,
        };
        let width = i32::try_from(data.width).map_err(|_| too_large())?;
        let height = i32::try_from(data.height).map_err(|_| too_large())?;
        let gl = &self.gl;
        unsafe {
            let texture = gl.create_texture().map_err(allocation("texture"))?;
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            // Rows of 1- and 3-channel images are not 4-byte aligned.
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                gl_internal_format(data.internal_format()) as i32,
                width,
                height,
                0,
                gl_pixel_format(data.format),
                glow::UNSIGNED_BYTE,
                Some(&data.data),
            );
            if sampler.generate_mipmaps {
                gl.generate_mipmap(glow::TEXTURE_2D);
            }
            let wrap = gl_wrap(sampler.wrap);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, wrap);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, wrap);
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                gl_filter(effective_min_filter(sampler)),
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                gl_filter(sampler.mag_filter),
            );
            gl.bind_texture(glow::TEXTURE_2D, None);
            Ok(TextureId(texture.0.get()))
        }
    }

    fn delete_texture(&self, texture: TextureId) {
        if let Some(texture) = native_texture(texture) {
            unsafe { self.gl.delete_texture(texture) };
        }
    }

    fn create_mesh_buffers(
        &self,
        vertices: &[u8],
        indices: &[u32],
        layout: &VertexLayout,
    ) -> Result<MeshBuffers, DeviceError> {
        let stride =
            i32::try_from(layout.stride).map_err(|_| DeviceError::BufferTooLarge(layout.stride))?;
        let gl = &self.gl;
        unsafe {
            let vao = gl.create_vertex_array().map_err(allocation("vertex array"))?;
            let vbo = match gl.create_buffer() {
                Ok(vbo) => vbo,
                Err(reason) => {
                    gl.delete_vertex_array(vao);
                    return Err(allocation("vertex buffer")(reason));
                }
            };
            let ebo = match gl.create_buffer() {
                Ok(ebo) => ebo,
                Err(reason) => {
                    gl.delete_buffer(vbo);
                    gl.delete_vertex_array(vao);
                    return Err(allocation("index buffer")(reason));
                }
            };

            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, vertices, glow::STATIC_DRAW);
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ebo));
            gl.buffer_data_u8_slice(
                glow::ELEMENT_ARRAY_BUFFER,
                bytemuck::cast_slice(indices),
                glow::STATIC_DRAW,
            );

            for attr in layout.attributes {
                let offset = attr.offset as i32;
                gl.enable_vertex_attrib_array(attr.location);
                match attr.kind {
                    AttributeKind::Float => gl.vertex_attrib_pointer_f32(
                        attr.location,
                        attr.components,
                        glow::FLOAT,
                        false,
                        stride,
                        offset,
                    ),
                    AttributeKind::Int => gl.vertex_attrib_pointer_i32(
                        attr.location,
                        attr.components,
                        glow::INT,
                        stride,
                        offset,
                    ),
                }
            }
            gl.bind_vertex_array(None);

            Ok(MeshBuffers {
                vao: VertexArrayId(vao.0.get()),
                vbo: BufferId(vbo.0.get()),
                ebo: BufferId(ebo.0.get()),
            })
        }
    }

    fn delete_mesh_buffers(&self, buffers: MeshBuffers) {
        unsafe {
            if let Some(vao) = native_vertex_array(buffers.vao) {
                self.gl.delete_vertex_array(vao);
            }
            for buffer in [buffers.vbo, buffers.ebo].into_iter().filter_map(native_buffer) {
                self.gl.delete_buffer(buffer);
            }
        }
    }

    fn active_texture(&self, unit: u32) {
        unsafe { self.gl.active_texture(glow::TEXTURE0 + unit) };
    }

    fn bind_texture(&self, texture: TextureId) {
        unsafe { self.gl.bind_texture(glow::TEXTURE_2D, native_texture(texture)) };
    }

    fn set_uniform_i32(&self, program: ProgramId, name: &str, value: i32) {
        let Some(program) = native_program(program) else {
            return;
        };
        unsafe {
            let location = self.gl.get_uniform_location(program, name);
            self.gl.uniform_1_i32(location.as_ref(), value);
        }
    }

    fn set_uniform_f32(&self, program: ProgramId, name: &str, value: f32) {
        let Some(program) = native_program(program) else {
            return;
        };
        unsafe {
            let location = self.gl.get_uniform_location(program, name);
            self.gl.uniform_1_f32(location.as_ref(), value);
        }
    }

    fn set_uniform_vec3(&self, program: ProgramId, name: &str, value: Vec3) {
        let Some(program) = native_program(program) else {
            return;
        };
        unsafe {
            let location = self.gl.get_uniform_location(program, name);
            self.gl.uniform_3_f32(location.as_ref(), value.x, value.y, value.z);
        }
    }

    fn draw_indexed(&self, vao: VertexArrayId, index_count: u32) {
        let Some(vao) = native_vertex_array(vao) else {
            return;
        };
        unsafe {
            self.gl.bind_vertex_array(Some(vao));
            self.gl.draw_elements(glow::TRIANGLES, index_count as i32, glow::UNSIGNED_INT, 0);
            self.gl.bind_vertex_array(None);
        }
    }
}
