use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::array_utils::{move_backward, move_forward, move_to_back, move_to_front};

/// Current persisted schema version.
pub const STATE_VERSION: u32 = 1;

/// Brush width used by a fresh state, in pixels.
pub const DEFAULT_BRUSH_SIZE: u32 = 40;

/// Colors handed to new region layers, indexed by the layer count at insertion.
pub const DEFAULT_COLORS: [RgbColor; 6] = [
    RgbColor { r: 200, g: 0, b: 0 },
    RgbColor { r: 0, g: 200, b: 0 },
    RgbColor { r: 0, g: 0, b: 200 },
    RgbColor { r: 200, g: 200, b: 0 },
    RgbColor { r: 0, g: 200, b: 200 },
    RgbColor { r: 200, g: 0, b: 200 },
];

// ============================================================================
// IDENTIFIERS
// ============================================================================

/// Layer identifier. `Default` generates a fresh v4 UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub Uuid);

impl LayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Draw-object identifier. `Default` generates a fresh v4 UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub Uuid);

impl ObjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// SCALARS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Brush,
    Eraser,
}

impl Tool {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tool::Brush => "brush",
            Tool::Eraser => "eraser",
        }
    }

    /// Stable u8 for binary snapshots.
    pub fn to_u8(&self) -> u8 {
        match self {
            Tool::Brush => 0,
            Tool::Eraser => 1,
        }
    }

    /// Unknown values fall back to the brush.
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Tool::Eraser,
            _ => Tool::Brush,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// CSS-style color string, e.g. `rgb(200, 0, 0)`.
    pub fn to_css(&self) -> String {
        format!("rgb({}, {}, {})", self.r, self.g, self.b)
    }

    /// CSS-style color string with an explicit alpha in `0.0..=1.0`.
    pub fn to_css_alpha(&self, alpha: f32) -> String {
        format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, alpha)
    }

    pub fn to_rgba(&self, alpha: u8) -> [u8; 4] {
        [self.r, self.g, self.b, alpha]
    }
}

// ============================================================================
// DRAW OBJECTS
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineObject {
    pub id: ObjectId,
    pub is_selected: bool,
    pub tool: Tool,
    pub stroke_width: f32,
    /// Flat `x0, y0, x1, y1, ...` sequence, extended as the stroke grows.
    pub points: Vec<f32>,
}

impl LineObject {
    /// Iterate complete `(x, y)` pairs. A dangling trailing scalar is skipped.
    pub fn point_pairs(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.points.chunks_exact(2).map(|p| (p[0], p[1]))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillRectObject {
    pub id: ObjectId,
    pub is_selected: bool,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageObject {
    pub id: ObjectId,
    pub is_selected: bool,
    pub image_name: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DrawObject {
    Line(LineObject),
    FillRect(FillRectObject),
    Image(ImageObject),
}

impl DrawObject {
    pub fn id(&self) -> ObjectId {
        match self {
            DrawObject::Line(o) => o.id,
            DrawObject::FillRect(o) => o.id,
            DrawObject::Image(o) => o.id,
        }
    }

    pub fn is_selected(&self) -> bool {
        match self {
            DrawObject::Line(o) => o.is_selected,
            DrawObject::FillRect(o) => o.is_selected,
            DrawObject::Image(o) => o.is_selected,
        }
    }

    pub fn as_line_mut(&mut self) -> Option<&mut LineObject> {
        match self {
            DrawObject::Line(line) => Some(line),
            _ => None,
        }
    }
}

// ============================================================================
// LAYERS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayerKind {
    PromptRegionLayer,
}

impl LayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::PromptRegionLayer => "promptRegionLayer",
        }
    }
}

/// Error for a layer kind name that has no variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLayerKind(pub String);

impl fmt::Display for UnknownLayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown layer kind: {}", self.0)
    }
}

impl std::error::Error for UnknownLayerKind {}

impl FromStr for LayerKind {
    type Err = UnknownLayerKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "promptRegionLayer" => Ok(LayerKind::PromptRegionLayer),
            other => Err(UnknownLayerKind(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRegionLayer {
    pub id: LayerId,
    pub is_visible: bool,
    pub objects: Vec<DrawObject>,
    pub prompt: String,
    pub color: RgbColor,
}

impl PromptRegionLayer {
    /// Last line object in paint order, if any.
    pub fn last_line_mut(&mut self) -> Option<&mut LineObject> {
        self.objects.iter_mut().rev().find_map(DrawObject::as_line_mut)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Layer {
    PromptRegionLayer(PromptRegionLayer),
}

impl Layer {
    pub fn id(&self) -> LayerId {
        match self {
            Layer::PromptRegionLayer(l) => l.id,
        }
    }

    pub fn kind(&self) -> LayerKind {
        match self {
            Layer::PromptRegionLayer(_) => LayerKind::PromptRegionLayer,
        }
    }

    pub fn is_visible(&self) -> bool {
        match self {
            Layer::PromptRegionLayer(l) => l.is_visible,
        }
    }

    pub fn objects(&self) -> &[DrawObject] {
        match self {
            Layer::PromptRegionLayer(l) => &l.objects,
        }
    }

    pub fn prompt(&self) -> &str {
        match self {
            Layer::PromptRegionLayer(l) => &l.prompt,
        }
    }

    pub fn as_prompt_region(&self) -> Option<&PromptRegionLayer> {
        match self {
            Layer::PromptRegionLayer(l) => Some(l),
        }
    }

    pub fn as_prompt_region_mut(&mut self) -> Option<&mut PromptRegionLayer> {
        match self {
            Layer::PromptRegionLayer(l) => Some(l),
        }
    }

    fn toggle_visibility(&mut self) {
        match self {
            Layer::PromptRegionLayer(l) => l.is_visible = !l.is_visible,
        }
    }

    fn clear_objects(&mut self) {
        match self {
            Layer::PromptRegionLayer(l) => l.objects.clear(),
        }
    }

    fn set_prompt(&mut self, prompt: String) {
        match self {
            Layer::PromptRegionLayer(l) => l.prompt = prompt,
        }
    }
}

// ============================================================================
// STATE
// ============================================================================

/// Persisted paint state for the regional prompts canvas.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionalPromptsState {
    #[serde(rename = "_version")]
    pub version: u32,
    pub tool: Tool,
    pub selected_layer: Option<LayerId>,
    /// Painted in sequence order: the last entry ends up on top. New layers
    /// are inserted at index 0.
    pub layers: Vec<Layer>,
    pub brush_size: u32,
}

impl Default for RegionalPromptsState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            tool: Tool::Brush,
            selected_layer: None,
            brush_size: DEFAULT_BRUSH_SIZE,
            layers: Vec::new(),
        }
    }
}

impl RegionalPromptsState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one action. See [`reduce`].
    pub fn dispatch(&mut self, action: Action) {
        reduce(self, action);
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id() == id)
    }

    /// Whether any layer holds an object with this id.
    pub fn has_object(&self, id: ObjectId) -> bool {
        self.layers
            .iter()
            .any(|l| l.objects().iter().any(|o| o.id() == id))
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id() == id)
    }

    /// Layer that must exist by contract.
    ///
    /// # Panics
    /// If no layer has this id.
    pub fn expect_layer(&self, id: LayerId) -> &Layer {
        match self.layer(id) {
            Some(layer) => layer,
            None => panic!("Layer {} doesn't exist!", id),
        }
    }

    pub fn layer_prompt(&self, id: LayerId) -> Option<&str> {
        self.layer(id).map(Layer::prompt)
    }

    pub fn layer_is_visible(&self, id: LayerId) -> Option<bool> {
        self.layer(id).map(Layer::is_visible)
    }

    pub fn selected(&self) -> Option<&Layer> {
        self.selected_layer.and_then(|id| self.layer(id))
    }

    fn selected_mut(&mut self) -> Option<&mut Layer> {
        let id = self.selected_layer?;
        self.layer_mut(id)
    }
}

// ============================================================================
// ACTIONS
// ============================================================================

/// State transitions. Actions that create entities carry their id so that
/// applying the same action sequence twice yields identical states.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Action {
    LayerAdded {
        kind: LayerKind,
        #[serde(default)]
        id: LayerId,
    },
    LayerSelected(LayerId),
    LayerIsVisibleToggled(LayerId),
    LayerReset(LayerId),
    LayerDeleted(LayerId),
    LayerMovedForward(LayerId),
    LayerMovedToFront(LayerId),
    LayerMovedBackward(LayerId),
    LayerMovedToBack(LayerId),
    PromptChanged {
        #[serde(rename = "layerId")]
        layer_id: LayerId,
        prompt: String,
    },
    PromptRegionLayerColorChanged {
        #[serde(rename = "layerId")]
        layer_id: LayerId,
        color: RgbColor,
    },
    LineAdded {
        points: Vec<f32>,
        #[serde(default)]
        id: ObjectId,
    },
    PointsAdded(Vec<f32>),
    BrushSizeChanged(u32),
    ToolChanged(Tool),
}

impl Action {
    /// `LayerAdded` with a freshly generated layer id.
    pub fn layer_added(kind: LayerKind) -> Self {
        Action::LayerAdded {
            kind,
            id: LayerId::new(),
        }
    }

    /// `LineAdded` with a freshly generated object id.
    pub fn line_added(points: Vec<f32>) -> Self {
        Action::LineAdded {
            points,
            id: ObjectId::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::LayerAdded { .. } => "layerAdded",
            Action::LayerSelected(_) => "layerSelected",
            Action::LayerIsVisibleToggled(_) => "layerIsVisibleToggled",
            Action::LayerReset(_) => "layerReset",
            Action::LayerDeleted(_) => "layerDeleted",
            Action::LayerMovedForward(_) => "layerMovedForward",
            Action::LayerMovedToFront(_) => "layerMovedToFront",
            Action::LayerMovedBackward(_) => "layerMovedBackward",
            Action::LayerMovedToBack(_) => "layerMovedToBack",
            Action::PromptChanged { .. } => "promptChanged",
            Action::PromptRegionLayerColorChanged { .. } => "promptRegionLayerColorChanged",
            Action::LineAdded { .. } => "lineAdded",
            Action::PointsAdded(_) => "pointsAdded",
            Action::BrushSizeChanged(_) => "brushSizeChanged",
            Action::ToolChanged(_) => "toolChanged",
        }
    }
}

/// Apply `action` to `state`. Actions naming a missing layer are no-ops.
pub fn reduce(state: &mut RegionalPromptsState, action: Action) {
    match action {
        Action::LayerAdded { kind, id } => {
            if state.layer(id).is_some() {
                log::warn!("layer {} already exists; add ignored", id);
                return;
            }
            let layer = build_layer(id, kind, state.layers.len());
            log::debug!("layer {} added ({})", id, kind.as_str());
            state.layers.insert(0, layer);
            state.selected_layer = Some(id);
        }
        Action::LayerSelected(id) => {
            state.selected_layer = Some(id);
        }
        Action::LayerIsVisibleToggled(id) => {
            if let Some(layer) = state.layer_mut(id) {
                layer.toggle_visibility();
            }
        }
        Action::LayerReset(id) => {
            if let Some(layer) = state.layer_mut(id) {
                layer.clear_objects();
            }
        }
        Action::LayerDeleted(id) => {
            let Some(idx) = state.layers.iter().position(|l| l.id() == id) else {
                return;
            };
            state.layers.remove(idx);
            if state.selected_layer == Some(id) {
                state.selected_layer = state.layers.first().map(Layer::id);
            }
            log::debug!("layer {} deleted", id);
        }
        Action::LayerMovedForward(id) => raise(&mut state.layers, id),
        Action::LayerMovedToFront(id) => bring_to_front(&mut state.layers, id),
        Action::LayerMovedBackward(id) => lower(&mut state.layers, id),
        Action::LayerMovedToBack(id) => send_to_back(&mut state.layers, id),
        Action::PromptChanged { layer_id, prompt } => {
            if let Some(layer) = state.layer_mut(layer_id) {
                layer.set_prompt(prompt);
            }
        }
        Action::PromptRegionLayerColorChanged { layer_id, color } => {
            if let Some(layer) = state
                .layer_mut(layer_id)
                .and_then(Layer::as_prompt_region_mut)
            {
                layer.color = color;
            }
        }
        Action::LineAdded { points, id } => {
            if state.has_object(id) {
                log::warn!("object {} already exists; line ignored", id);
                return;
            }
            let tool = state.tool;
            let brush_size = state.brush_size;
            if let Some(layer) = state.selected_mut().and_then(Layer::as_prompt_region_mut) {
                layer
                    .objects
                    .push(DrawObject::Line(build_line(id, points, brush_size, tool)));
            }
        }
        Action::PointsAdded(points) => {
            if let Some(line) = state
                .selected_mut()
                .and_then(Layer::as_prompt_region_mut)
                .and_then(PromptRegionLayer::last_line_mut)
            {
                line.points.extend_from_slice(&points);
            }
        }
        Action::BrushSizeChanged(size) => {
            state.brush_size = size;
        }
        Action::ToolChanged(tool) => {
            state.tool = tool;
        }
    }
}

// -- Stacking ------------------------------------------------------------------
//
// `layers` is painted front-to-back from the end of the sequence, so "front"
// in stacking terms is the *back* of the vector. These four wrappers are the
// only place that inversion is spelled out.

/// One step toward the front of the stack.
fn raise(layers: &mut [Layer], id: LayerId) {
    move_forward(layers, |l| l.id() == id);
}

/// One step toward the back of the stack.
fn lower(layers: &mut [Layer], id: LayerId) {
    move_backward(layers, |l| l.id() == id);
}

/// Top of the stack = end of the sequence.
fn bring_to_front(layers: &mut Vec<Layer>, id: LayerId) {
    move_to_back(layers, |l| l.id() == id);
}

/// Bottom of the stack = start of the sequence.
fn send_to_back(layers: &mut Vec<Layer>, id: LayerId) {
    move_to_front(layers, |l| l.id() == id);
}

// -- Builders ------------------------------------------------------------------

/// Build a layer with default fields. The color is chosen by the live layer
/// count, so deleting layers shifts the colors of later additions.
pub fn build_layer(id: LayerId, kind: LayerKind, layer_count: usize) -> Layer {
    match kind {
        LayerKind::PromptRegionLayer => Layer::PromptRegionLayer(PromptRegionLayer {
            id,
            is_visible: true,
            objects: Vec::new(),
            prompt: String::new(),
            color: DEFAULT_COLORS[layer_count % DEFAULT_COLORS.len()],
        }),
    }
}

fn build_line(id: ObjectId, points: Vec<f32>, brush_size: u32, tool: Tool) -> LineObject {
    LineObject {
        id,
        is_selected: false,
        tool,
        stroke_width: brush_size as f32,
        points,
    }
}
