//! Persisted state: the versioned JSON shape, its migration hook, and a
//! compact binary snapshot.
//!
//! JSON is the canonical form (`{ "_version": 1, "tool", "selectedLayer",
//! "layers", "brushSize" }`). Snapshots (`.rps`) are bincode-encoded DTOs
//! prefixed by a magic string.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use uuid::Uuid;

use crate::error::PersistError;
use crate::state::{
    DrawObject, FillRectObject, ImageObject, Layer, LayerId, LineObject, ObjectId,
    PromptRegionLayer, RegionalPromptsState, RgbColor, STATE_VERSION, Tool,
};

/// Magic header for v1 snapshots.
const SNAPSHOT_MAGIC_V1: &str = "RPS1";
/// Extension that selects the binary snapshot format.
pub const SNAPSHOT_EXTENSION: &str = "rps";
/// Upper bound on layers accepted from a snapshot.
const MAX_LAYERS: usize = 256;

// ============================================================================
// JSON + MIGRATION
// ============================================================================

/// Bring a persisted value up to [`STATE_VERSION`].
///
/// Version 1 passes through unchanged. Unknown fields are left in place
/// (deserialization ignores them).
pub fn migrate(value: Value) -> Result<Value, PersistError> {
    let version = match value.get("_version") {
        Some(v) => v
            .as_u64()
            .ok_or_else(|| PersistError::InvalidFormat(format!("bad `_version`: {}", v)))?,
        None => return Err(PersistError::MigrationRequired),
    };
    match version {
        1 => Ok(value),
        other => Err(PersistError::UnsupportedVersion(other)),
    }
}

pub fn to_json(state: &RegionalPromptsState) -> Result<String, PersistError> {
    Ok(serde_json::to_string_pretty(state)?)
}

pub fn from_json(text: &str) -> Result<RegionalPromptsState, PersistError> {
    let raw: Value = serde_json::from_str(text)?;
    let migrated = migrate(raw)?;
    let state: RegionalPromptsState = serde_json::from_value(migrated)?;
    sanitize(state)
}

/// Check id uniqueness and restore the selection invariant after loading
/// foreign data.
fn sanitize(mut state: RegionalPromptsState) -> Result<RegionalPromptsState, PersistError> {
    let mut layer_ids = HashSet::new();
    let mut object_ids = HashSet::new();
    for layer in &state.layers {
        if !layer_ids.insert(layer.id()) {
            return Err(PersistError::InvalidFormat(format!("duplicate layer id {}", layer.id())));
        }
        for obj in layer.objects() {
            if !object_ids.insert(obj.id()) {
                return Err(PersistError::InvalidFormat(format!("duplicate object id {}", obj.id())));
            }
        }
    }

    if let Some(id) = state.selected_layer
        && state.layer(id).is_none()
    {
        log::warn!("persisted selection {} names no layer; cleared", id);
        state.selected_layer = None;
    }
    Ok(state)
}

// ============================================================================
// FILES
// ============================================================================

/// Save by extension: `.rps` writes a snapshot, anything else JSON.
pub fn save_state(state: &RegionalPromptsState, path: &Path) -> Result<(), PersistError> {
    if is_snapshot_path(path) {
        save_snapshot(state, path)
    } else {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(to_json(state)?.as_bytes())?;
        writer.flush()?;
        Ok(())
    }
}

/// Load by extension: `.rps` reads a snapshot, anything else JSON.
pub fn load_state(path: &Path) -> Result<RegionalPromptsState, PersistError> {
    if is_snapshot_path(path) {
        load_snapshot(path)
    } else {
        from_json(&std::fs::read_to_string(path)?)
    }
}

fn is_snapshot_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(SNAPSHOT_EXTENSION))
}

// ============================================================================
// BINARY SNAPSHOT
// ============================================================================

#[derive(Serialize, Deserialize)]
struct SnapshotFileV1 {
    magic: String,
    version: u32,
    tool: u8,
    selected_layer: Option<[u8; 16]>,
    brush_size: u32,
    layers: Vec<SnapshotLayer>,
}

#[derive(Serialize, Deserialize)]
enum SnapshotLayer {
    PromptRegion {
        id: [u8; 16],
        is_visible: bool,
        prompt: String,
        color: [u8; 3],
        objects: Vec<SnapshotObject>,
    },
}

#[derive(Serialize, Deserialize)]
enum SnapshotObject {
    Line {
        id: [u8; 16],
        is_selected: bool,
        tool: u8,
        stroke_width: f32,
        points: Vec<f32>,
    },
    FillRect {
        id: [u8; 16],
        is_selected: bool,
        bounds: [f32; 4],
    },
    Image {
        id: [u8; 16],
        is_selected: bool,
        image_name: String,
        bounds: [f32; 4],
    },
}

/// Encode the state as snapshot bytes.
pub fn snapshot_bytes(state: &RegionalPromptsState) -> Result<Vec<u8>, PersistError> {
    Ok(bincode::serialize(&build_snapshot(state))?)
}

/// Decode snapshot bytes.
pub fn state_from_snapshot(raw: &[u8]) -> Result<RegionalPromptsState, PersistError> {
    // bincode writes the magic String as an 8-byte length prefix + UTF-8 data.
    if raw.len() < 12 {
        return Err(PersistError::InvalidFormat("File too small".into()));
    }
    let magic = std::str::from_utf8(&raw[8..12]).unwrap_or("");
    if magic != SNAPSHOT_MAGIC_V1 {
        return Err(PersistError::InvalidFormat(format!("Unknown magic '{}'", magic)));
    }
    let file: SnapshotFileV1 = bincode::deserialize(raw)?;
    if file.version != STATE_VERSION {
        return Err(PersistError::UnsupportedVersion(file.version as u64));
    }
    if file.layers.len() > MAX_LAYERS {
        return Err(PersistError::InvalidFormat(format!(
            "Snapshot contains {} layers, which exceeds the maximum of {}",
            file.layers.len(),
            MAX_LAYERS
        )));
    }
    sanitize(restore_snapshot(file))
}

pub fn save_snapshot(state: &RegionalPromptsState, path: &Path) -> Result<(), PersistError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, &build_snapshot(state))?;
    writer.flush()?;
    Ok(())
}

pub fn load_snapshot(path: &Path) -> Result<RegionalPromptsState, PersistError> {
    let raw = std::fs::read(path)?;
    state_from_snapshot(&raw)
}

fn build_snapshot(state: &RegionalPromptsState) -> SnapshotFileV1 {
    let layers = state
        .layers
        .iter()
        .map(|layer| match layer {
            Layer::PromptRegionLayer(l) => SnapshotLayer::PromptRegion {
                id: *l.id.0.as_bytes(),
                is_visible: l.is_visible,
                prompt: l.prompt.clone(),
                color: [l.color.r, l.color.g, l.color.b],
                objects: l.objects.iter().map(snapshot_object).collect(),
            },
        })
        .collect();

    SnapshotFileV1 {
        magic: SNAPSHOT_MAGIC_V1.to_string(),
        version: state.version,
        tool: state.tool.to_u8(),
        selected_layer: state.selected_layer.map(|id| *id.0.as_bytes()),
        brush_size: state.brush_size,
        layers,
    }
}

fn snapshot_object(obj: &DrawObject) -> SnapshotObject {
    match obj {
        DrawObject::Line(o) => SnapshotObject::Line {
            id: *o.id.0.as_bytes(),
            is_selected: o.is_selected,
            tool: o.tool.to_u8(),
            stroke_width: o.stroke_width,
            points: o.points.clone(),
        },
        DrawObject::FillRect(o) => SnapshotObject::FillRect {
            id: *o.id.0.as_bytes(),
            is_selected: o.is_selected,
            bounds: [o.x, o.y, o.width, o.height],
        },
        DrawObject::Image(o) => SnapshotObject::Image {
            id: *o.id.0.as_bytes(),
            is_selected: o.is_selected,
            image_name: o.image_name.clone(),
            bounds: [o.x, o.y, o.width, o.height],
        },
    }
}

fn restore_snapshot(file: SnapshotFileV1) -> RegionalPromptsState {
    let layers = file
        .layers
        .into_iter()
        .map(|layer| match layer {
            SnapshotLayer::PromptRegion {
                id,
                is_visible,
                prompt,
                color,
                objects,
            } => Layer::PromptRegionLayer(PromptRegionLayer {
                id: LayerId(Uuid::from_bytes(id)),
                is_visible,
                objects: objects.into_iter().map(restore_object).collect(),
                prompt,
                color: RgbColor::new(color[0], color[1], color[2]),
            }),
        })
        .collect();

    RegionalPromptsState {
        version: file.version,
        tool: Tool::from_u8(file.tool),
        selected_layer: file.selected_layer.map(|b| LayerId(Uuid::from_bytes(b))),
        layers,
        brush_size: file.brush_size,
    }
}

fn restore_object(obj: SnapshotObject) -> DrawObject {
    match obj {
        SnapshotObject::Line {
            id,
            is_selected,
            tool,
            stroke_width,
            points,
        } => DrawObject::Line(LineObject {
            id: ObjectId(Uuid::from_bytes(id)),
            is_selected,
            tool: Tool::from_u8(tool),
            stroke_width,
            points,
        }),
        SnapshotObject::FillRect {
            id,
            is_selected,
            bounds: [x, y, width, height],
        } => DrawObject::FillRect(FillRectObject {
            id: ObjectId(Uuid::from_bytes(id)),
            is_selected,
            x,
            y,
            width,
            height,
        }),
        SnapshotObject::Image {
            id,
            is_selected,
            image_name,
            bounds: [x, y, width, height],
        } => DrawObject::Image(ImageObject {
            id: ObjectId(Uuid::from_bytes(id)),
            is_selected,
            image_name,
            x,
            y,
            width,
            height,
        }),
    }
}
