//! Material resolution: reflectance scalars plus per-slot textures, deduplicated
//! by reference across one model import.

use std::collections::HashMap;

use asset::scene::embedded_index;
use asset::{MaterialRecord, MaterialSnapshot, SceneData, Slot, SlotMapping};

use crate::device::{GraphicsDevice, TextureId};
use crate::mesh::MeshTexture;
use crate::options::ImportOptions;
use crate::texture_cache::{TextureLoader, TextureParams, TextureSource};

/// A texture owned by a model, shared by index among its meshes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureRef {
    pub id: TextureId,
    /// Slot the texture was first requested for.
    pub slot: Slot,
    /// Raw reference from the material; the dedup key.
    pub reference: String,
    /// The load failed; `id` is the placeholder (or `NONE`).
    pub degraded: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextureStats {
    pub uploaded: usize,
    pub reused: usize,
    pub failed: usize,
}

/// Reference-keyed dedup table for one import session.
#[derive(Debug, Default)]
pub struct TextureTable {
    by_reference: HashMap<String, usize>,
    entries: Vec<TextureRef>,
    placeholder: Option<TextureId>,
    stats: TextureStats,
}

impl TextureTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, reference: &str) -> Option<usize> {
        self.by_reference.get(reference).copied()
    }

    pub fn entries(&self) -> &[TextureRef] {
        &self.entries
    }

    pub fn placeholder(&self) -> Option<TextureId> {
        self.placeholder
    }

    pub fn stats(&self) -> TextureStats {
        self.stats
    }

    /// End the session: the arena, the placeholder (if one was created) and counters.
    pub fn into_parts(self) -> (Vec<TextureRef>, Option<TextureId>, TextureStats) {
        (self.entries, self.placeholder, self.stats)
    }

    fn insert(&mut self, texture: TextureRef) -> usize {
        let index = self.entries.len();
        self.by_reference.insert(texture.reference.clone(), index);
        self.entries.push(texture);
        index
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedMaterial {
    pub snapshot: MaterialSnapshot,
    pub textures: Vec<MeshTexture>,
}

pub struct MaterialResolver<'a> {
    loader: TextureLoader<'a>,
    mapping: SlotMapping,
    options: &'a ImportOptions,
}

impl<'a> MaterialResolver<'a> {
    pub fn new(
        device: &'a dyn GraphicsDevice,
        mapping: SlotMapping,
        options: &'a ImportOptions,
    ) -> Self {
        Self {
            loader: TextureLoader::new(device),
            mapping,
            options,
        }
    }

    /// Bindings come out slot by slot (diffuse, specular, normal, height,
    /// reflection), then in mapping order, then in record order.
    pub fn resolve(
        &self,
        material: &MaterialRecord,
        scene: &SceneData,
        table: &mut TextureTable,
    ) -> ResolvedMaterial {
        let mut textures = Vec::new();
        for slot in Slot::ALL {
            for &kind in self.mapping.kinds(slot) {
                for entry in material.textures_of(kind) {
                    let texture = self.texture_index(&entry.reference, slot, scene, table);
                    textures.push(MeshTexture { slot, texture });
                }
            }
        }
        ResolvedMaterial {
            snapshot: MaterialSnapshot::from_record(material),
            textures,
        }
    }

    fn texture_index(
        &self,
        reference: &str,
        slot: Slot,
        scene: &SceneData,
        table: &mut TextureTable,
    ) -> usize {
        if let Some(index) = table.lookup(reference) {
            table.stats.reused += 1;
            return index;
        }

        let color_space = self.options.color_space(slot);
        let id = match scene.embedded_texture(reference) {
            Some(blob) => self.loader.load(
                TextureSource::Memory {
                    bytes: &blob.bytes,
                    mime_type: blob.mime_type.as_deref(),
                },
                &TextureParams::new(self.options.embedded_sampler, color_space),
            ),
            None if embedded_index(reference).is_some() => {
                log::warn!("Material references missing embedded texture {reference}");
                TextureId::NONE
            }
            None => {
                let path = scene.directory.join(reference);
                self.loader.load(
                    TextureSource::File(&path),
                    &TextureParams::new(self.options.file_sampler, color_space),
                )
            }
        };

        let degraded = id.is_none();
        let id = if degraded {
            table.stats.failed += 1;
            if self.options.placeholder_on_failure {
                *table
                    .placeholder
                    .get_or_insert_with(|| self.loader.placeholder())
            } else {
                TextureId::NONE
            }
        } else {
            table.stats.uploaded += 1;
            id
        };

        table.insert(TextureRef {
            id,
            slot,
            reference: reference.to_owned(),
            degraded,
        })
    }
}
