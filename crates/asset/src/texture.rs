//! Texture decoding into CPU pixel data ready for upload.

use std::path::Path;

use anyhow::{Context, Result, bail};
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};

/// Channel layout of decoded pixels, one byte per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    R8,
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    pub fn channels(self) -> u32 {
        match self {
            PixelFormat::R8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// How colour data should be interpreted when sampled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    #[default]
    Linear,
    Srgb,
}

/// GPU-side storage format requested for a texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InternalFormat {
    R8,
    Rgb8,
    Rgba8,
    Srgb8,
    Srgb8Alpha8,
}

/// Texture data in CPU-friendly format before GPU upload.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub color_space: ColorSpace,
}

impl TextureData {
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        color_space: ColorSpace,
        data: Vec<u8>,
    ) -> Self {
        Self {
            data,
            width,
            height,
            format,
            color_space,
        }
    }

    /// Decode an image file from disk.
    pub fn decode_file<P: AsRef<Path>>(path: P, color_space: ColorSpace) -> Result<Self> {
        let path = path.as_ref();
        let img = image::open(path)
            .with_context(|| format!("Failed to open image {}", path.display()))?;
        Self::from_image(img, color_space)
            .with_context(|| format!("Unsupported image {}", path.display()))
    }

    /// Decode a compressed image (PNG, JPEG, ...) held in memory. The content
    /// signature wins; `mime_type` names formats without one, such as TGA.
    pub fn decode_memory(
        bytes: &[u8],
        mime_type: Option<&str>,
        color_space: ColorSpace,
    ) -> Result<Self> {
        let format = image::guess_format(bytes)
            .ok()
            .or_else(|| mime_type.and_then(ImageFormat::from_mime_type))
            .with_context(|| match mime_type {
                Some(mime) => format!("Unrecognised embedded image ({mime})"),
                None => "Unrecognised embedded image".to_owned(),
            })?;
        let img = image::load_from_memory_with_format(bytes, format)
            .context("Failed to decode embedded image")?;
        Self::from_image(img, color_space)
    }

    /// Keep 1/3/4 channel images, narrowing wider sample types to 8 bits.
    fn from_image(img: DynamicImage, color_space: ColorSpace) -> Result<Self> {
        let (width, height) = (img.width(), img.height());
        let (format, data) = match img.color().channel_count() {
            1 => (PixelFormat::R8, img.into_luma8().into_raw()),
            3 => (PixelFormat::Rgb8, img.into_rgb8().into_raw()),
            4 => (PixelFormat::Rgba8, img.into_rgba8().into_raw()),
            n => bail!("unsupported channel count {n}"),
        };
        let texture = Self::new(width, height, format, color_space, data);
        if !texture.is_valid() {
            bail!("decoded image has no pixels");
        }
        log::debug!(
            "Decoded texture {}x{} {:?} ({} bytes)",
            width,
            height,
            format,
            texture.data.len()
        );
        Ok(texture)
    }

    /// 1x1 opaque white, bound in place of textures that failed to load.
    pub fn placeholder() -> Self {
        Self::new(
            1,
            1,
            PixelFormat::Rgba8,
            ColorSpace::Linear,
            vec![255, 255, 255, 255],
        )
    }

    /// Storage format for the upload; sRGB only applies to colour channels.
    pub fn internal_format(&self) -> InternalFormat {
        match (self.format, self.color_space) {
            (PixelFormat::R8, _) => InternalFormat::R8,
            (PixelFormat::Rgb8, ColorSpace::Linear) => InternalFormat::Rgb8,
            (PixelFormat::Rgb8, ColorSpace::Srgb) => InternalFormat::Srgb8,
            (PixelFormat::Rgba8, ColorSpace::Linear) => InternalFormat::Rgba8,
            (PixelFormat::Rgba8, ColorSpace::Srgb) => InternalFormat::Srgb8Alpha8,
        }
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        self.format.channels()
    }

    /// Check if the texture data is valid.
    pub fn is_valid(&self) -> bool {
        let expected_size = (self.width * self.height * self.bytes_per_pixel()) as usize;
        self.data.len() == expected_size && self.width > 0 && self.height > 0
    }
}
