//! Retained scene graph produced by the renderer and consumed by export.
//!
//! A [`Stage`] holds one [`StageLayer`] per rendered paint layer. Layers hold
//! [`Node`]s; groups nest. Named groups let consumers tell paint content
//! apart from UI-only decoration.

use crate::state::{LayerId, ObjectId};

/// Name given to every stage layer that renders a region layer.
pub const REGIONAL_PROMPT_LAYER_NAME: &str = "regional_prompt_layer";
/// Group holding a region layer's draw objects.
pub const REGIONAL_PROMPT_LAYER_OBJECT_GROUP_NAME: &str = "regional_prompt_layer.object_group";
/// Selection bounding box drawn around the selected layer's content.
pub const REGIONAL_PROMPT_LAYER_BBOX_NAME: &str = "regional_prompt_layer.bbox";
/// Brush cursor overlay.
pub const TOOL_PREVIEW_LAYER_NAME: &str = "tool_preview_layer";

/// Names of groups that exist only for on-screen feedback.
pub const DECORATION_GROUP_NAMES: &[&str] = &[REGIONAL_PROMPT_LAYER_BBOX_NAME];

pub fn is_decoration(name: &str) -> bool {
    DECORATION_GROUP_NAMES.contains(&name)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CompositeOp {
    #[default]
    SourceOver,
    /// Removes destination alpha where the source is painted (eraser).
    DestinationOut,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LineShape {
    pub id: ObjectId,
    pub points: Vec<f32>,
    pub stroke: [u8; 4],
    pub stroke_width: f32,
    pub composite: CompositeOp,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RectShape {
    pub id: Option<ObjectId>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub fill: Option<[u8; 4]>,
    /// Outline color and width, centred on the rectangle's edges.
    pub stroke: Option<([u8; 4], f32)>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImageShape {
    pub id: ObjectId,
    pub image_name: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CircleShape {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub fill: Option<[u8; 4]>,
    pub stroke: Option<([u8; 4], f32)>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    pub name: String,
    pub opacity: f32,
    /// Rasterize into an isolated buffer before compositing.
    pub cached: bool,
    pub children: Vec<Node>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            opacity: 1.0,
            cached: false,
            children: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Group(Group),
    Line(LineShape),
    Rect(RectShape),
    Image(ImageShape),
    Circle(CircleShape),
}

impl Node {
    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Node::Group(g) => Some(g),
            _ => None,
        }
    }

    /// Name of this node when it is a group.
    pub fn name(&self) -> Option<&str> {
        self.as_group().map(|g| g.name.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StageLayer {
    /// Paint-layer id; `None` for overlay layers such as the brush preview.
    pub id: Option<LayerId>,
    pub name: String,
    pub children: Vec<Node>,
}

impl StageLayer {
    pub fn new(id: Option<LayerId>, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn is_regional_prompt_layer(&self) -> bool {
        self.name == REGIONAL_PROMPT_LAYER_NAME
    }

    pub fn find_group(&self, name: &str) -> Option<&Group> {
        self.children
            .iter()
            .filter_map(Node::as_group)
            .find(|g| g.name == name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stage {
    pub width: u32,
    pub height: u32,
    pub layers: Vec<StageLayer>,
}

impl Stage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            layers: Vec::new(),
        }
    }

    pub fn layer(&self, id: LayerId) -> Option<&StageLayer> {
        self.layers.iter().find(|l| l.id == Some(id))
    }

    pub fn regional_prompt_layers(&self) -> impl Iterator<Item = &StageLayer> {
        self.layers.iter().filter(|l| l.is_regional_prompt_layer())
    }
}

/// Handle to the live rendering surface.
///
/// Empty until the canvas mounts a stage; consumers that need the surface
/// take a `&StageSlot` and must cope with it being empty.
#[derive(Debug, Default)]
pub struct StageSlot {
    stage: Option<Stage>,
}

impl StageSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) the mounted stage.
    pub fn mount(&mut self, stage: Stage) {
        log::debug!(
            "stage mounted ({}x{}, {} layers)",
            stage.width,
            stage.height,
            stage.layers.len()
        );
        self.stage = Some(stage);
    }

    pub fn unmount(&mut self) -> Option<Stage> {
        self.stage.take()
    }

    pub fn get(&self) -> Option<&Stage> {
        self.stage.as_ref()
    }

    pub fn is_mounted(&self) -> bool {
        self.stage.is_some()
    }
}
