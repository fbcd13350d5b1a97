//! Material records copied out of the source scene.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Format-level texture type code, as the source file labels a texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureKind {
    Diffuse,
    Specular,
    Ambient,
    Emissive,
    Height,
    Normals,
    Shininess,
    Opacity,
    Displacement,
    Reflection,
    BaseColor,
    MetallicRoughness,
    Occlusion,
}

/// Semantic texture role a shader samples from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Diffuse,
    Specular,
    Normal,
    Height,
    Reflection,
}

impl Slot {
    /// Resolution order; also the order bindings appear in a mesh.
    pub const ALL: [Slot; 5] = [
        Slot::Diffuse,
        Slot::Specular,
        Slot::Normal,
        Slot::Height,
        Slot::Reflection,
    ];

    pub fn index(self) -> usize {
        match self {
            Slot::Diffuse => 0,
            Slot::Specular => 1,
            Slot::Normal => 2,
            Slot::Height => 3,
            Slot::Reflection => 4,
        }
    }

    /// Sampler uniform prefix; the shader declares `<prefix><n>` starting at 1.
    pub fn sampler_prefix(self) -> &'static str {
        match self {
            Slot::Diffuse => "texture_diffuse",
            Slot::Specular => "texture_specular",
            Slot::Normal => "texture_normal",
            Slot::Height => "texture_height",
            Slot::Reflection => "texture_refl",
        }
    }

    /// Whether the slot carries colour (and so may be sampled as sRGB).
    pub fn is_color(self) -> bool {
        matches!(self, Slot::Diffuse)
    }
}

/// One texture statement of a material.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureEntry {
    pub kind: TextureKind,
    /// Raw reference: a path relative to the model, or `*N` for an embedded image.
    pub reference: String,
}

/// Material as stored in the source file. Absent properties stay `None`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterialRecord {
    pub name: String,
    pub ambient: Option<Vec3>,
    pub diffuse: Option<Vec3>,
    pub specular: Option<Vec3>,
    pub shininess: Option<f32>,
    pub optical_density: Option<f32>,
    pub textures: Vec<TextureEntry>,
}

impl MaterialRecord {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a texture statement, ignoring exact duplicates.
    pub fn push_texture(&mut self, kind: TextureKind, reference: impl Into<String>) {
        let reference = reference.into();
        if reference.is_empty() {
            return;
        }
        let entry = TextureEntry { kind, reference };
        if !self.textures.contains(&entry) {
            self.textures.push(entry);
        }
    }

    /// Entries of `kind` in statement order.
    pub fn textures_of(&self, kind: TextureKind) -> impl Iterator<Item = &TextureEntry> {
        self.textures.iter().filter(move |t| t.kind == kind)
    }

    pub fn texture_count(&self, kind: TextureKind) -> usize {
        self.textures_of(kind).count()
    }
}

/// Resolved reflectance parameters with defaults applied.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialSnapshot {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    pub refractive_index: f32,
}

impl Default for MaterialSnapshot {
    fn default() -> Self {
        Self {
            ambient: Vec3::ZERO,
            diffuse: Vec3::ZERO,
            specular: Vec3::ZERO,
            shininess: 0.0,
            refractive_index: 1.0,
        }
    }
}

impl MaterialSnapshot {
    pub fn from_record(record: &MaterialRecord) -> Self {
        let defaults = Self::default();
        Self {
            ambient: record.ambient.unwrap_or(defaults.ambient),
            diffuse: record.diffuse.unwrap_or(defaults.diffuse),
            specular: record.specular.unwrap_or(defaults.specular),
            shininess: record.shininess.unwrap_or(defaults.shininess),
            refractive_index: record.optical_density.unwrap_or(defaults.refractive_index),
        }
    }
}
