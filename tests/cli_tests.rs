//! CLI Tests
//!
//! Headless replay sessions driven through the public CLI entry points.

use clap::Parser;
use regional_prompts::cli::{CliArgs, run_session};
use regional_prompts::persist::load_state;
use std::fs;
use std::path::Path;

const SCRIPT: &str = r#"[
    {"type": "layerAdded", "payload": {"kind": "promptRegionLayer", "id": "6f1c4a52-0d3e-4c8e-9a55-2b7f0e3d9a11"}},
    {"type": "promptChanged", "payload": {"layerId": "6f1c4a52-0d3e-4c8e-9a55-2b7f0e3d9a11", "prompt": "a red barn"}},
    {"type": "brushSizeChanged", "payload": 6},
    {"type": "lineAdded", "payload": {"points": [4, 4, 28, 4]}},
    {"type": "layerAdded", "payload": {"kind": "promptRegionLayer", "id": "0b9e2d7a-51f4-4e0c-8d3b-7a6c1e2f4b90"}},
    {"type": "layerIsVisibleToggled", "payload": "0b9e2d7a-51f4-4e0c-8d3b-7a6c1e2f4b90"}
]"#;

const VISIBLE: &str = "6f1c4a52-0d3e-4c8e-9a55-2b7f0e3d9a11";
const HIDDEN: &str = "0b9e2d7a-51f4-4e0c-8d3b-7a6c1e2f4b90";

fn parse(dir: &Path, extra: &[&str]) -> CliArgs {
    let script = dir.join("session.json");
    fs::write(&script, SCRIPT).unwrap();
    let mut argv = vec![
        "RegionalPrompts".to_string(),
        "--input".to_string(),
        script.to_string_lossy().into_owned(),
        "--width".to_string(),
        "32".to_string(),
        "--height".to_string(),
        "16".to_string(),
    ];
    argv.extend(extra.iter().map(|s| s.to_string()));
    CliArgs::parse_from(argv)
}

#[test]
fn test_session_exports_visible_layers() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("masks");
    let args = parse(dir.path(), &["--output-dir", out.to_str().unwrap()]);

    assert!(run_session(&args).unwrap());

    let visible = out.join(format!("{}.png", VISIBLE));
    assert!(visible.exists());
    assert!(!out.join(format!("{}.png", HIDDEN)).exists());
    let img = image::open(&visible).unwrap().into_rgba8();
    assert_eq!(img.dimensions(), (32, 16));
    assert_eq!(img.get_pixel(16, 4).0, [200, 0, 0, 255]);
}

#[test]
fn test_preview_dir_writes_captions() {
    let dir = tempfile::tempdir().unwrap();
    let preview = dir.path().join("preview");
    let args = parse(dir.path(), &["--preview-dir", preview.to_str().unwrap()]);

    assert!(run_session(&args).unwrap());

    let captions = fs::read_to_string(preview.join("captions.txt")).unwrap();
    assert_eq!(captions, format!("{}.png\ta red barn\n", VISIBLE));
    assert!(preview.join(format!("{}.png", VISIBLE)).exists());
}

#[test]
fn test_saved_state_reloads_in_both_formats() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["state.json", "state.rps"] {
        let saved = dir.path().join(name);
        let args = parse(dir.path(), &["--save-state", saved.to_str().unwrap()]);
        assert!(run_session(&args).unwrap());

        let state = load_state(&saved).unwrap();
        assert_eq!(state.layers.len(), 2);
        assert_eq!(state.brush_size, 6);
        assert_eq!(state.layers[1].id().to_string(), VISIBLE);
        assert_eq!(state.layers[1].prompt(), "a red barn");
    }
}

#[test]
fn test_failed_script_still_saves() {
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("broken.json");
    fs::write(&broken, "not json").unwrap();
    let saved = dir.path().join("state.json");
    let args = parse(
        dir.path(),
        &["--input", broken.to_str().unwrap(), "--save-state", saved.to_str().unwrap()],
    );

    assert!(!run_session(&args).unwrap());
    assert!(saved.exists());
}

#[test]
fn test_zero_stage_size_is_rejected() {
    for flag in ["--width", "--height"] {
        let parsed = CliArgs::try_parse_from(["RegionalPrompts", "--input", "s.json", flag, "0"]);
        assert!(parsed.is_err(), "{} 0 should not parse", flag);
    }
    assert!(CliArgs::try_parse_from(["RegionalPrompts", "--width", "1", "--height", "1"]).is_ok());
}
