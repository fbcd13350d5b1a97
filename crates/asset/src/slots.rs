//! Per-format mapping from semantic slots to format-level texture kinds.
//!
//! Interchange formats repurpose texture type codes inconsistently: MTL has no
//! normal-map statement, so `map_bump` (Height) carries normal maps, and
//! reflection maps are commonly smuggled through `map_Ka` (Ambient). The
//! mapping is therefore data, chosen per format and overridable from TOML.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::material::{Slot, TextureKind};

/// Scene file formats understood by the importer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneFormat {
    Obj,
    Gltf,
}

impl SceneFormat {
    /// Detect the format from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "obj" => Some(SceneFormat::Obj),
            "gltf" | "glb" => Some(SceneFormat::Gltf),
            _ => None,
        }
    }
}

/// Texture kinds consulted for each slot, in lookup order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlotMapping {
    pub diffuse: Vec<TextureKind>,
    pub specular: Vec<TextureKind>,
    pub normal: Vec<TextureKind>,
    pub height: Vec<TextureKind>,
    pub reflection: Vec<TextureKind>,
}

impl SlotMapping {
    pub fn for_format(format: SceneFormat) -> Self {
        match format {
            SceneFormat::Obj => Self {
                diffuse: vec![TextureKind::Diffuse],
                specular: vec![TextureKind::Specular],
                normal: vec![TextureKind::Height],
                height: vec![TextureKind::Displacement],
                reflection: vec![TextureKind::Ambient],
            },
            SceneFormat::Gltf => Self {
                diffuse: vec![TextureKind::BaseColor],
                specular: vec![TextureKind::Specular],
                normal: vec![TextureKind::Normals],
                height: Vec::new(),
                reflection: Vec::new(),
            },
        }
    }

    pub fn kinds(&self, slot: Slot) -> &[TextureKind] {
        match slot {
            Slot::Diffuse => &self.diffuse,
            Slot::Specular => &self.specular,
            Slot::Normal => &self.normal,
            Slot::Height => &self.height,
            Slot::Reflection => &self.reflection,
        }
    }

    pub fn with(mut self, slot: Slot, kinds: impl Into<Vec<TextureKind>>) -> Self {
        let kinds = kinds.into();
        match slot {
            Slot::Diffuse => self.diffuse = kinds,
            Slot::Specular => self.specular = kinds,
            Slot::Normal => self.normal = kinds,
            Slot::Height => self.height = kinds,
            Slot::Reflection => self.reflection = kinds,
        }
        self
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse slot mapping")
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read slot mapping {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid slot mapping {}", path.display()))
    }
}
