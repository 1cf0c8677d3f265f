//! Per-layer raster export of the mounted stage.
//!
//! Each visible region layer is cloned, stripped of UI decoration,
//! rasterized off-screen at stage size and encoded as PNG. Hidden layers
//! never reach the stage, so they are never exported.

use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbaImage};
use rayon::prelude::*;
use std::collections::BTreeMap;

use crate::raster::{ImageResolver, rasterize_layer};
use crate::stage::{Node, StageLayer, StageSlot, is_decoration};
use crate::state::{LayerId, RegionalPromptsState};

/// A decoded export shown to the user next to its layer prompt.
#[derive(Clone, Debug)]
pub struct LayerPreview {
    pub layer_id: LayerId,
    pub image: RgbaImage,
    pub caption: String,
}

/// Receives preview images in diagnostic mode.
pub trait PreviewSink {
    fn show(&mut self, preview: LayerPreview);
}

/// Collects previews in memory.
impl PreviewSink for Vec<LayerPreview> {
    fn show(&mut self, preview: LayerPreview) {
        self.push(preview);
    }
}

/// Rasterize every visible region layer of the mounted stage to a PNG blob,
/// keyed by layer id.
///
/// With a `preview` sink, each blob is additionally decoded and handed over
/// with the layer's current prompt as caption. That side channel never
/// changes the returned map.
///
/// Callers must not run two exports against the same slot concurrently.
///
/// # Panics
/// If no stage is mounted, or a layer encodes to an empty blob.
pub fn regional_prompt_layer_blobs(
    slot: &StageSlot,
    state: &RegionalPromptsState,
    images: &dyn ImageResolver,
    preview: Option<&mut dyn PreviewSink>,
) -> BTreeMap<LayerId, Vec<u8>> {
    let Some(stage) = slot.get() else {
        panic!("Stage is null");
    };

    let candidates: Vec<&StageLayer> = stage.regional_prompt_layers().collect();
    log::debug!("exporting {} region layer(s)", candidates.len());

    let encoded: Vec<(LayerId, Vec<u8>)> = candidates
        .par_iter()
        .map(|layer| {
            let Some(id) = layer.id else {
                panic!("region layer '{}' has no layer id", layer.name);
            };
            let clone = clone_for_export(layer);
            let pixels = rasterize_layer(&clone, stage.width, stage.height, images);
            drop(clone);
            let blob = encode_png(&pixels);
            assert!(!blob.is_empty(), "Blob is null for layer {}", id);
            (id, blob)
        })
        .collect();

    if let Some(sink) = preview {
        for (id, blob) in &encoded {
            match image::load_from_memory(blob) {
                Ok(decoded) => sink.show(LayerPreview {
                    layer_id: *id,
                    image: decoded.into_rgba8(),
                    caption: state.layer_prompt(*id).unwrap_or_default().to_string(),
                }),
                Err(e) => log::warn!("preview decode failed for layer {}: {}", id, e),
            }
        }
    }

    encoded.into_iter().collect()
}

/// Copy of `layer` with decoration groups removed and every remaining group
/// flagged for isolated rasterization.
pub fn clone_for_export(layer: &StageLayer) -> StageLayer {
    let mut clone = layer.clone();
    clone
        .children
        .retain(|child| !child.name().is_some_and(is_decoration));
    for child in &mut clone.children {
        if let Node::Group(group) = child {
            group.cached = true;
        }
    }
    clone
}

/// PNG-encode an RGBA buffer.
///
/// # Panics
/// If the encoder rejects the buffer.
pub fn encode_png(pixels: &RgbaImage) -> Vec<u8> {
    let mut blob = Vec::new();
    let encoder = PngEncoder::new(&mut blob);
    if let Err(e) = encoder.write_image(pixels.as_raw(), pixels.width(), pixels.height(), ColorType::Rgba8) {
        panic!("PNG encoding failed: {}", e);
    }
    blob
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::NoImages;
    use crate::renderer::render_stage;
    use crate::stage::{
        Group, REGIONAL_PROMPT_LAYER_BBOX_NAME, REGIONAL_PROMPT_LAYER_OBJECT_GROUP_NAME, Stage,
    };
    use crate::state::{Action, LayerKind, reduce};

    fn painted_state() -> RegionalPromptsState {
        let mut state = RegionalPromptsState::new();
        reduce(&mut state, Action::layer_added(LayerKind::PromptRegionLayer));
        reduce(&mut state, Action::BrushSizeChanged(4));
        reduce(&mut state, Action::line_added(vec![8.0, 8.0, 24.0, 8.0]));
        state
    }

    #[test]
    #[should_panic(expected = "Stage is null")]
    fn empty_slot_panics() {
        let state = RegionalPromptsState::new();
        regional_prompt_layer_blobs(&StageSlot::new(), &state, &NoImages, None);
    }

    #[test]
    fn clone_strips_decorations_and_caches_groups() {
        let mut layer = StageLayer::new(Some(LayerId::new()), "regional_prompt_layer");
        layer
            .children
            .push(Node::Group(Group::new(REGIONAL_PROMPT_LAYER_OBJECT_GROUP_NAME)));
        layer
            .children
            .push(Node::Group(Group::new(REGIONAL_PROMPT_LAYER_BBOX_NAME)));

        let clone = clone_for_export(&layer);
        assert_eq!(clone.children.len(), 1);
        let group = clone.children[0].as_group().unwrap();
        assert_eq!(group.name, REGIONAL_PROMPT_LAYER_OBJECT_GROUP_NAME);
        assert!(group.cached);
        // original untouched
        assert_eq!(layer.children.len(), 2);
    }

    #[test]
    fn blobs_decode_to_stage_sized_pngs() {
        let state = painted_state();
        let mut slot = StageSlot::new();
        slot.mount(render_stage(&state, None, 32, 16));

        let blobs = regional_prompt_layer_blobs(&slot, &state, &NoImages, None);
        assert_eq!(blobs.len(), 1);
        let blob = &blobs[&state.layers[0].id()];
        let img = image::load_from_memory(blob).unwrap().into_rgba8();
        assert_eq!(img.dimensions(), (32, 16));
        assert_eq!(img.get_pixel(16, 8).0, [200, 0, 0, 255]);
        assert_eq!(img.get_pixel(16, 15).0[3], 0);
    }

    #[test]
    fn preview_carries_prompt_caption() {
        let mut state = painted_state();
        let id = state.layers[0].id();
        reduce(
            &mut state,
            Action::PromptChanged {
                layer_id: id,
                prompt: "a lighthouse".into(),
            },
        );
        let mut slot = StageSlot::new();
        slot.mount(render_stage(&state, None, 32, 16));

        let mut previews: Vec<LayerPreview> = Vec::new();
        let with_preview =
            regional_prompt_layer_blobs(&slot, &state, &NoImages, Some(&mut previews as &mut dyn PreviewSink));
        let without = regional_prompt_layer_blobs(&slot, &state, &NoImages, None);

        assert_eq!(with_preview, without);
        assert_eq!(previews.len(), 1);
        assert_eq!(previews[0].layer_id, id);
        assert_eq!(previews[0].caption, "a lighthouse");
        assert_eq!(previews[0].image.dimensions(), (32, 16));
    }

    #[test]
    fn non_region_layers_are_skipped() {
        let mut stage = Stage::new(4, 4);
        stage.layers.push(StageLayer::new(None, "tool_preview_layer"));
        let mut slot = StageSlot::new();
        slot.mount(stage);
        let blobs =
            regional_prompt_layer_blobs(&slot, &RegionalPromptsState::new(), &NoImages, None);
        assert!(blobs.is_empty());
    }
}
