//! Projects the layer store into a [`Stage`].
//!
//! Pure: reads state and pointer, returns a fresh scene graph. Invisible
//! layers are left out of the stage entirely.

use crate::pointer::PointerState;
use crate::state::{DrawObject, Layer, PromptRegionLayer, RegionalPromptsState, RgbColor, Tool};
use crate::stage::{
    CircleShape, CompositeOp, Group, ImageShape, LineShape, Node, RectShape, Stage, StageLayer,
    REGIONAL_PROMPT_LAYER_BBOX_NAME, REGIONAL_PROMPT_LAYER_NAME,
    REGIONAL_PROMPT_LAYER_OBJECT_GROUP_NAME, TOOL_PREVIEW_LAYER_NAME,
};

/// Default surface size used by the canvas.
pub const DEFAULT_STAGE_SIZE: u32 = 512;

/// Gap between a layer's content and its selection box.
const BBOX_PADDING: f32 = 2.0;
const BBOX_STROKE_WIDTH: f32 = 1.0;

const PREVIEW_RING_OUTER: [u8; 4] = [0, 0, 0, 255];
const PREVIEW_RING_INNER: [u8; 4] = [255, 255, 255, 255];

/// Render the whole stage. The brush preview is added when `pointer` says
/// the cursor is over the surface.
pub fn render_stage(
    state: &RegionalPromptsState,
    pointer: Option<&PointerState>,
    width: u32,
    height: u32,
) -> Stage {
    let mut stage = Stage::new(width, height);
    for layer in &state.layers {
        let is_selected = state.selected_layer == Some(layer.id());
        if let Some(stage_layer) = render_layer(layer, is_selected) {
            stage.layers.push(stage_layer);
        }
    }
    if let Some(preview) = pointer.and_then(|p| render_brush_preview(state, p)) {
        stage.layers.push(preview);
    }
    stage
}

/// One stage layer for a visible paint layer, `None` when hidden.
pub fn render_layer(layer: &Layer, is_selected: bool) -> Option<StageLayer> {
    if !layer.is_visible() {
        return None;
    }
    match layer {
        Layer::PromptRegionLayer(region) => Some(render_region_layer(region, is_selected)),
    }
}

fn render_region_layer(layer: &PromptRegionLayer, is_selected: bool) -> StageLayer {
    let mut stage_layer = StageLayer::new(Some(layer.id), REGIONAL_PROMPT_LAYER_NAME);

    let mut objects = Group::new(REGIONAL_PROMPT_LAYER_OBJECT_GROUP_NAME);
    objects.children = layer
        .objects
        .iter()
        .filter_map(|obj| render_object(obj, layer.color))
        .collect();
    stage_layer.children.push(Node::Group(objects));

    if is_selected && let Some(bbox) = content_bounds(&layer.objects) {
        let mut decoration = Group::new(REGIONAL_PROMPT_LAYER_BBOX_NAME);
        decoration.children.push(Node::Rect(RectShape {
            id: None,
            x: bbox.0 - BBOX_PADDING,
            y: bbox.1 - BBOX_PADDING,
            width: (bbox.2 - bbox.0) + BBOX_PADDING * 2.0,
            height: (bbox.3 - bbox.1) + BBOX_PADDING * 2.0,
            fill: None,
            stroke: Some((layer.color.to_rgba(255), BBOX_STROKE_WIDTH)),
        }));
        stage_layer.children.push(Node::Group(decoration));
    }

    stage_layer
}

/// Shape for a single draw object.
pub fn render_object(obj: &DrawObject, color: RgbColor) -> Option<Node> {
    match obj {
        DrawObject::Line(line) => Some(Node::Line(LineShape {
            id: line.id,
            points: line.points.clone(),
            stroke: color.to_rgba(255),
            stroke_width: line.stroke_width,
            composite: match line.tool {
                Tool::Brush => CompositeOp::SourceOver,
                Tool::Eraser => CompositeOp::DestinationOut,
            },
        })),
        DrawObject::FillRect(rect) => Some(Node::Rect(RectShape {
            id: Some(rect.id),
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            fill: Some(color.to_rgba(255)),
            stroke: None,
        })),
        DrawObject::Image(image) => Some(Node::Image(ImageShape {
            id: image.id,
            image_name: image.image_name.clone(),
            x: image.x,
            y: image.y,
            width: image.width,
            height: image.height,
        })),
    }
}

/// `(min_x, min_y, max_x, max_y)` of everything the objects paint.
/// Eraser strokes are included; they still occupy the region.
fn content_bounds(objects: &[DrawObject]) -> Option<(f32, f32, f32, f32)> {
    let mut bounds: Option<(f32, f32, f32, f32)> = None;
    let mut include = |min_x: f32, min_y: f32, max_x: f32, max_y: f32| {
        bounds = Some(match bounds {
            Some((a, b, c, d)) => (a.min(min_x), b.min(min_y), c.max(max_x), d.max(max_y)),
            None => (min_x, min_y, max_x, max_y),
        });
    };

    for obj in objects {
        match obj {
            DrawObject::Line(line) => {
                let half = line.stroke_width / 2.0;
                for (x, y) in line.point_pairs() {
                    include(x - half, y - half, x + half, y + half);
                }
            }
            DrawObject::FillRect(r) => include(r.x, r.y, r.x + r.width, r.y + r.height),
            DrawObject::Image(i) => include(i.x, i.y, i.x + i.width, i.y + i.height),
        }
    }
    bounds
}

fn render_brush_preview(state: &RegionalPromptsState, pointer: &PointerState) -> Option<StageLayer> {
    if !pointer.is_mouse_over {
        return None;
    }
    let pos = pointer.cursor_position?;
    let color = state.selected()?.as_prompt_region()?.color;
    let radius = state.brush_size as f32 / 2.0;

    let mut layer = StageLayer::new(None, TOOL_PREVIEW_LAYER_NAME);
    layer.children.push(Node::Circle(CircleShape {
        x: pos.x,
        y: pos.y,
        radius,
        fill: match state.tool {
            Tool::Brush => Some(color.to_rgba(255)),
            Tool::Eraser => None,
        },
        stroke: Some((PREVIEW_RING_INNER, 1.0)),
    }));
    layer.children.push(Node::Circle(CircleShape {
        x: pos.x,
        y: pos.y,
        radius: radius + 1.0,
        fill: None,
        stroke: Some((PREVIEW_RING_OUTER, 1.0)),
    }));
    Some(layer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointer::Vector2;
    use crate::state::{Action, FillRectObject, LayerKind, ObjectId, reduce};

    fn two_layer_state() -> RegionalPromptsState {
        let mut state = RegionalPromptsState::new();
        reduce(&mut state, Action::layer_added(LayerKind::PromptRegionLayer));
        reduce(&mut state, Action::line_added(vec![10.0, 10.0, 20.0, 20.0]));
        reduce(&mut state, Action::layer_added(LayerKind::PromptRegionLayer));
        state
    }

    #[test]
    fn one_stage_layer_per_visible_layer_in_order() {
        let mut state = two_layer_state();
        let stage = render_stage(&state, None, 64, 64);
        let ids: Vec<_> = stage.layers.iter().map(|l| l.id).collect();
        let expected: Vec<_> = state.layers.iter().map(|l| Some(l.id())).collect();
        assert_eq!(ids, expected);

        let hidden = state.layers[1].id();
        reduce(&mut state, Action::LayerIsVisibleToggled(hidden));
        let stage = render_stage(&state, None, 64, 64);
        assert_eq!(stage.layers.len(), 1);
        assert!(stage.layer(hidden).is_none());
    }

    #[test]
    fn objects_map_to_shapes() {
        let state = two_layer_state();
        let painted = state.layers[1].id();
        let stage = render_stage(&state, None, 64, 64);
        let group = stage
            .layer(painted)
            .and_then(|l| l.find_group(REGIONAL_PROMPT_LAYER_OBJECT_GROUP_NAME))
            .unwrap();
        match &group.children[0] {
            Node::Line(line) => {
                assert_eq!(line.points, vec![10.0, 10.0, 20.0, 20.0]);
                assert_eq!(line.stroke, [200, 0, 0, 255]);
                assert_eq!(line.composite, CompositeOp::SourceOver);
                assert_eq!(line.stroke_width, 40.0);
            }
            other => panic!("expected a line, got {:?}", other),
        }
    }

    #[test]
    fn eraser_lines_cut_out() {
        let mut state = RegionalPromptsState::new();
        reduce(&mut state, Action::layer_added(LayerKind::PromptRegionLayer));
        reduce(&mut state, Action::ToolChanged(Tool::Eraser));
        reduce(&mut state, Action::line_added(vec![1.0, 1.0]));
        let node = render_object(&state.layers[0].objects()[0], RgbColor::new(1, 2, 3)).unwrap();
        match node {
            Node::Line(line) => assert_eq!(line.composite, CompositeOp::DestinationOut),
            other => panic!("expected a line, got {:?}", other),
        }
    }

    #[test]
    fn only_selected_layer_gets_a_bbox() {
        let mut state = RegionalPromptsState::new();
        reduce(&mut state, Action::layer_added(LayerKind::PromptRegionLayer));
        let id = state.layers[0].id();
        if let Some(layer) = state.layer_mut(id).and_then(Layer::as_prompt_region_mut) {
            layer.objects.push(DrawObject::FillRect(FillRectObject {
                id: ObjectId::new(),
                is_selected: false,
                x: 10.0,
                y: 10.0,
                width: 10.0,
                height: 5.0,
            }));
        }

        let stage = render_stage(&state, None, 64, 64);
        let bbox = stage.layers[0]
            .find_group(REGIONAL_PROMPT_LAYER_BBOX_NAME)
            .unwrap();
        match &bbox.children[0] {
            Node::Rect(r) => {
                assert_eq!((r.x, r.y, r.width, r.height), (8.0, 8.0, 14.0, 9.0));
                assert!(r.fill.is_none());
            }
            other => panic!("expected a rect, got {:?}", other),
        }

        reduce(&mut state, Action::LayerSelected(crate::state::LayerId::new()));
        let stage = render_stage(&state, None, 64, 64);
        assert!(stage.layers[0].find_group(REGIONAL_PROMPT_LAYER_BBOX_NAME).is_none());
    }

    #[test]
    fn empty_layer_has_no_bbox() {
        let mut state = RegionalPromptsState::new();
        reduce(&mut state, Action::layer_added(LayerKind::PromptRegionLayer));
        let stage = render_stage(&state, None, 64, 64);
        assert!(stage.layers[0].find_group(REGIONAL_PROMPT_LAYER_BBOX_NAME).is_none());
    }

    #[test]
    fn brush_preview_follows_pointer() {
        let mut state = two_layer_state();
        let mut pointer = PointerState::new();
        assert_eq!(render_stage(&state, Some(&pointer), 64, 64).layers.len(), 2);

        pointer.on_mouse_enter(&mut state, Vector2::new(30.0, 30.0), false);
        let stage = render_stage(&state, Some(&pointer), 64, 64);
        let preview = stage.layers.last().unwrap();
        assert_eq!(preview.name, TOOL_PREVIEW_LAYER_NAME);
        assert!(preview.id.is_none());
        assert!(!preview.is_regional_prompt_layer());
        match &preview.children[0] {
            Node::Circle(c) => {
                assert_eq!((c.x, c.y, c.radius), (30.0, 30.0, 20.0));
                assert!(c.fill.is_some());
            }
            other => panic!("expected a circle, got {:?}", other),
        }
    }
}
