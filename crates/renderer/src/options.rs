use asset::{ColorSpace, PostProcess, SceneFormat, Slot, SlotMapping};

use crate::device::SamplerParams;

/// Knobs for one model import.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportOptions {
    /// Request sRGB storage for colour slots.
    pub gamma_correction: bool,
    /// Overrides the per-format default mapping when set.
    pub slot_mapping: Option<SlotMapping>,
    pub file_sampler: SamplerParams,
    pub embedded_sampler: SamplerParams,
    pub post_process: PostProcess,
    /// Bind a 1x1 white texture where a texture failed to load; otherwise
    /// such slots bind [`crate::TextureId::NONE`].
    pub placeholder_on_failure: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            gamma_correction: false,
            slot_mapping: None,
            file_sampler: SamplerParams::FILE,
            embedded_sampler: SamplerParams::EMBEDDED,
            post_process: PostProcess::default(),
            placeholder_on_failure: true,
        }
    }
}

impl ImportOptions {
    pub fn with_gamma(mut self, gamma_correction: bool) -> Self {
        self.gamma_correction = gamma_correction;
        self
    }

    pub fn with_slot_mapping(mut self, mapping: SlotMapping) -> Self {
        self.slot_mapping = Some(mapping);
        self
    }

    pub fn slot_mapping_for(&self, format: SceneFormat) -> SlotMapping {
        self.slot_mapping
            .clone()
            .unwrap_or_else(|| SlotMapping::for_format(format))
    }

    pub fn color_space(&self, slot: Slot) -> ColorSpace {
        if self.gamma_correction && slot.is_color() {
            ColorSpace::Srgb
        } else {
            ColorSpace::Linear
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asset::TextureKind;

    #[test]
    fn gamma_only_affects_color_slots() {
        let plain = ImportOptions::default();
        assert_eq!(plain.color_space(Slot::Diffuse), ColorSpace::Linear);

        let gamma = ImportOptions::default().with_gamma(true);
        assert_eq!(gamma.color_space(Slot::Diffuse), ColorSpace::Srgb);
        for slot in [Slot::Specular, Slot::Normal, Slot::Height, Slot::Reflection] {
            assert_eq!(gamma.color_space(slot), ColorSpace::Linear);
        }
    }

    #[test]
    fn override_wins_over_format_default() {
        let options = ImportOptions::default();
        assert_eq!(
            options.slot_mapping_for(SceneFormat::Obj),
            SlotMapping::for_format(SceneFormat::Obj)
        );
        let custom = SlotMapping::default().with(Slot::Diffuse, [TextureKind::Emissive]);
        let options = options.with_slot_mapping(custom.clone());
        assert_eq!(options.slot_mapping_for(SceneFormat::Gltf), custom);
    }
}
