// ============================================================================
// RegionalPrompts CLI: headless replay of recorded canvas actions
// ============================================================================
//
// Usage examples:
//   RegionalPrompts --input session.json --output-dir masks/
//   RegionalPrompts -i "scripts/*.json" --state saved.rps --save-state out.json
//   RegionalPrompts --state saved.json --output-dir masks/ --preview-dir preview/
//
// Each input is a JSON array of actions. All inputs are replayed in order
// into one session, then every visible region layer is exported as PNG.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::error::CliError;
use crate::export::{LayerPreview, PreviewSink, regional_prompt_layer_blobs};
use crate::persist::{load_state, save_state};
use crate::raster::{DirImageResolver, ImageResolver, NoImages};
use crate::renderer::{DEFAULT_STAGE_SIZE, render_stage};
use crate::stage::StageSlot;
use crate::state::{Action, LayerId, RegionalPromptsState, reduce};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Replay regional-prompt canvas actions and export per-layer masks.
#[derive(Parser, Debug)]
#[command(
    name = "RegionalPrompts",
    about = "Headless regional prompts canvas",
    long_about = "Replay recorded layer actions and rasterize every visible region\n\
                  layer to a PNG mask, without a UI.\n\n\
                  Example:\n  \
                  RegionalPrompts --input session.json --output-dir masks/\n  \
                  RegionalPrompts -i \"scripts/*.json\" --save-state state.rps"
)]
pub struct CliArgs {
    /// Action script(s): JSON arrays of actions. Glob patterns accepted.
    /// Scripts are replayed in the order given.
    #[arg(short, long, num_args = 1..)]
    pub input: Vec<String>,

    /// Initial state to load (JSON, or a `.rps` snapshot).
    #[arg(short, long, value_name = "FILE")]
    pub state: Option<PathBuf>,

    /// Directory receiving `<layer-id>.png` for every visible region layer.
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Stage width in pixels.
    #[arg(long, default_value_t = DEFAULT_STAGE_SIZE, value_parser = clap::value_parser!(u32).range(1..))]
    pub width: u32,

    /// Stage height in pixels.
    #[arg(long, default_value_t = DEFAULT_STAGE_SIZE, value_parser = clap::value_parser!(u32).range(1..))]
    pub height: u32,

    /// Directory image objects are resolved against.
    #[arg(long, value_name = "DIR")]
    pub images_dir: Option<PathBuf>,

    /// Write decoded previews and their prompt captions here.
    #[arg(long, value_name = "DIR")]
    pub preview_dir: Option<PathBuf>,

    /// Write the final state (format picked by extension).
    #[arg(long, value_name = "FILE")]
    pub save_state: Option<PathBuf>,

    /// Debug-level logging and per-script timing.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the session and return an OS exit code.
/// `0` = everything succeeded, `1` = a script or an output failed.
pub fn run(args: CliArgs) -> ExitCode {
    match run_session(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when at least one script failed but the session
/// still produced its outputs.
pub fn run_session(args: &CliArgs) -> Result<bool, CliError> {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() && args.state.is_none() {
        return Err(CliError::NoInputs);
    }

    let mut state = match &args.state {
        Some(path) => {
            log::info!("loading state from {}", path.display());
            load_state(path)?
        }
        None => RegionalPromptsState::new(),
    };

    let total = inputs.len();
    let mut all_ok = true;
    for (idx, path) in inputs.iter().enumerate() {
        let started = Instant::now();
        match replay_script(path, &mut state) {
            Ok(count) => {
                log::info!("[{}/{}] {}: {} action(s)", idx + 1, total, path.display(), count);
                if args.verbose {
                    println!(
                        "[{}/{}] {} ({:.0}ms)",
                        idx + 1,
                        total,
                        path.display(),
                        started.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                log::error!("{}", e);
                all_ok = false;
            }
        }
    }

    if args.output_dir.is_some() || args.preview_dir.is_some() {
        export_layers(args, &state)?;
    }

    if let Some(path) = &args.save_state {
        save_state(&state, path)?;
        log::info!("state written to {}", path.display());
    }

    Ok(all_ok)
}

// ============================================================================
// Pipeline steps
// ============================================================================

/// Parse one script and run its actions through the reducer.
pub fn replay_script(path: &Path, state: &mut RegionalPromptsState) -> Result<usize, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::ReadScript {
        path: path.to_path_buf(),
        source,
    })?;
    let actions: Vec<Action> =
        serde_json::from_str(&text).map_err(|source| CliError::ParseScript {
            path: path.to_path_buf(),
            source,
        })?;
    let count = actions.len();
    for action in actions {
        reduce(state, action);
    }
    Ok(count)
}

fn export_layers(args: &CliArgs, state: &RegionalPromptsState) -> Result<(), CliError> {
    let mut slot = StageSlot::new();
    slot.mount(render_stage(state, None, args.width, args.height));

    let dir_images;
    let images: &dyn ImageResolver = match &args.images_dir {
        Some(dir) => {
            dir_images = DirImageResolver::new(dir);
            &dir_images
        }
        None => &NoImages,
    };

    let mut previews: Vec<LayerPreview> = Vec::new();
    let sink = args
        .preview_dir
        .as_ref()
        .map(|_| &mut previews as &mut dyn PreviewSink);
    let blobs = regional_prompt_layer_blobs(&slot, state, images, sink);
    slot.unmount();

    if let Some(dir) = &args.output_dir {
        fs::create_dir_all(dir)?;
        for (id, blob) in &blobs {
            fs::write(layer_file(dir, *id), blob)?;
        }
        log::info!("exported {} layer(s) to {}", blobs.len(), dir.display());
    }

    if let Some(dir) = &args.preview_dir {
        write_previews(dir, &previews)?;
    }
    Ok(())
}

fn write_previews(dir: &Path, previews: &[LayerPreview]) -> Result<(), CliError> {
    fs::create_dir_all(dir)?;
    let mut captions = String::new();
    for preview in previews {
        let path = layer_file(dir, preview.layer_id);
        preview.image.save(&path)?;
        captions.push_str(&format!("{}.png\t{}\n", preview.layer_id, preview.caption));
    }
    fs::write(dir.join("captions.txt"), captions)?;
    Ok(())
}

fn layer_file(dir: &Path, id: LayerId) -> PathBuf {
    dir.join(format!("{}.png", id))
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    log::warn!("pattern '{}' matched no files", pattern);
                }
            }
            Err(e) => {
                log::warn!("invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}
