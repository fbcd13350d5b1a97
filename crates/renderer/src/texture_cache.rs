//! Texture upload service: decode a file or an in-memory blob and create one
//! GPU texture. No memoisation here; deduplication belongs to the caller.

use std::path::Path;

use anyhow::Context;
use asset::{ColorSpace, TextureData};

use crate::device::{GraphicsDevice, SamplerParams, TextureId};

#[derive(Clone, Copy, Debug)]
pub enum TextureSource<'a> {
    File(&'a Path),
    /// Compressed image bytes (PNG, JPEG, ...).
    Memory {
        bytes: &'a [u8],
        mime_type: Option<&'a str>,
    },
}

impl std::fmt::Display for TextureSource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextureSource::File(path) => write!(f, "{}", path.display()),
            TextureSource::Memory { bytes, .. } => write!(f, "<embedded, {} bytes>", bytes.len()),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextureParams {
    pub sampler: SamplerParams,
    pub color_space: ColorSpace,
}

impl TextureParams {
    pub fn new(sampler: SamplerParams, color_space: ColorSpace) -> Self {
        Self {
            sampler,
            color_space,
        }
    }
}

pub struct TextureLoader<'d> {
    device: &'d dyn GraphicsDevice,
}

impl<'d> TextureLoader<'d> {
    pub fn new(device: &'d dyn GraphicsDevice) -> Self {
        Self { device }
    }

    /// Load and upload; on any failure logs a warning and returns [`TextureId::NONE`].
    pub fn load(&self, source: TextureSource<'_>, params: &TextureParams) -> TextureId {
        match self.try_load(source, params) {
            Ok(texture) => texture,
            Err(err) => {
                log::warn!("Texture failed to load at {source}: {err:#}");
                TextureId::NONE
            }
        }
    }

    pub fn try_load(
        &self,
        source: TextureSource<'_>,
        params: &TextureParams,
    ) -> anyhow::Result<TextureId> {
        let data = match source {
            TextureSource::File(path) => TextureData::decode_file(path, params.color_space)?,
            TextureSource::Memory { bytes, mime_type } => {
                TextureData::decode_memory(bytes, mime_type, params.color_space)?
            }
        };
        let texture = self
            .device
            .create_texture(&data, &params.sampler)
            .with_context(|| format!("Failed to upload {source}"))?;
        log::debug!(
            "Uploaded {source} as {texture:?} ({}x{} {:?})",
            data.width,
            data.height,
            data.internal_format()
        );
        Ok(texture)
    }

    /// Upload the 1x1 white placeholder.
    pub fn placeholder(&self) -> TextureId {
        self.device
            .create_texture(&TextureData::placeholder(), &SamplerParams::EMBEDDED)
            .unwrap_or_else(|err| {
                log::warn!("Placeholder texture could not be created: {err}");
                TextureId::NONE
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{Command, HeadlessDevice};
    use asset::InternalFormat;
    use image::{DynamicImage, GrayAlphaImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    fn encode(img: DynamicImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn memory(bytes: &[u8]) -> TextureSource<'_> {
        TextureSource::Memory {
            bytes,
            mime_type: None,
        }
    }

    fn created_formats(device: &HeadlessDevice) -> Vec<InternalFormat> {
        device
            .commands()
            .into_iter()
            .filter_map(|c| match c {
                Command::CreateTexture { format, .. } => Some(format),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn loads_file_with_requested_color_space() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wall.png");
        std::fs::write(&path, encode(DynamicImage::ImageRgb8(RgbImage::new(4, 2)))).unwrap();

        let device = HeadlessDevice::new();
        let loader = TextureLoader::new(&device);
        let linear = loader.load(
            TextureSource::File(&path),
            &TextureParams::new(SamplerParams::FILE, ColorSpace::Linear),
        );
        let srgb = loader.load(
            TextureSource::File(&path),
            &TextureParams::new(SamplerParams::FILE, ColorSpace::Srgb),
        );
        assert!(!linear.is_none());
        assert_ne!(linear, srgb);
        assert_eq!(
            created_formats(&device),
            [InternalFormat::Rgb8, InternalFormat::Srgb8]
        );
    }

    #[test]
    fn missing_file_yields_none_without_allocation() {
        let device = HeadlessDevice::new();
        let loader = TextureLoader::new(&device);
        let id = loader.load(
            TextureSource::File(Path::new("/no/such/texture.png")),
            &TextureParams::default(),
        );
        assert!(id.is_none());
        assert_eq!(device.counters().textures_created, 0);
    }

    #[test]
    fn luma_alpha_blob_is_rejected() {
        let device = HeadlessDevice::new();
        let loader = TextureLoader::new(&device);
        let bytes = encode(DynamicImage::ImageLumaA8(GrayAlphaImage::new(2, 2)));
        let id = loader.load(memory(&bytes), &TextureParams::default());
        assert!(id.is_none());
        assert_eq!(device.counters().textures_created, 0);
    }

    #[test]
    fn embedded_blob_uses_given_sampler() {
        let device = HeadlessDevice::new();
        let loader = TextureLoader::new(&device);
        let bytes = encode(DynamicImage::ImageRgb8(RgbImage::new(1, 1)));
        let params = TextureParams::new(SamplerParams::EMBEDDED, ColorSpace::Linear);
        let id = loader.load(memory(&bytes), &params);
        assert!(!id.is_none());
        assert!(matches!(
            device.commands()[0],
            Command::CreateTexture { sampler, .. } if sampler == SamplerParams::EMBEDDED
        ));
    }

    #[test]
    fn device_failure_yields_none() {
        let device = HeadlessDevice::new();
        device.set_fail_textures(true);
        let loader = TextureLoader::new(&device);
        let bytes = encode(DynamicImage::ImageRgb8(RgbImage::new(1, 1)));
        assert!(loader.load(memory(&bytes), &TextureParams::default()).is_none());
        assert!(loader.placeholder().is_none());
    }
}
