//! Regional prompt painting: layer document model, scene projection and
//! per-layer raster export.
//!
//! The state store (`state`) is the single source of truth. Pointer gestures
//! (`pointer`) dispatch actions into it, the renderer (`renderer`) projects it
//! into a [`stage::Stage`], and `export` rasterizes the region layers of a
//! mounted stage into PNG blobs.

pub mod array_utils;
pub mod cli;
pub mod error;
pub mod export;
pub mod logger;
pub mod persist;
pub mod pointer;
pub mod raster;
pub mod renderer;
pub mod stage;
pub mod state;
pub mod viewer;

pub use error::{ApiError, CliError, PersistError};
pub use stage::{Stage, StageSlot};
pub use state::{Action, LayerId, LayerKind, ObjectId, RegionalPromptsState, Tool, reduce};
