use std::fs;
use std::path::PathBuf;

use clap::Parser;
use compute_raytracer::cli::Cli;
use compute_raytracer::config::{ConfigError, RenderConfig};
use tempfile::TempDir;

#[test]
fn test_partial_json_keeps_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("render.json");
    fs::write(
        &path,
        r#"{ "width": 640, "height": 480, "camera": { "speed": 0.25, "pitch_limit": null } }"#,
    )
    .unwrap();

    let config = RenderConfig::load(&path).unwrap();
    assert_eq!((config.width, config.height), (640, 480));
    assert_eq!(config.camera.speed, 0.25);
    assert_eq!(config.camera.pitch_limit, None);
    assert_eq!(config.workgroup_size, 16);
    assert_eq!(config.shader_dir, PathBuf::from("shaders"));
    assert!(config.vsync);
}

#[test]
fn test_unknown_key_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("render.json");
    fs::write(&path, r#"{ "resolution": 4 }"#).unwrap();
    assert!(matches!(
        RenderConfig::load(&path),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn test_missing_file_reports_path() {
    let err = RenderConfig::load(&PathBuf::from("missing/render.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
    assert!(err.to_string().contains("missing/render.json"));
}

#[test]
fn test_flags_override_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("render.json");
    fs::write(&path, r#"{ "width": 640, "height": 480, "frame_limit": 100 }"#).unwrap();

    let cli = Cli::try_parse_from([
        "compute-raytracer",
        "--config",
        path.to_str().unwrap(),
        "--height",
        "320",
        "--frames",
        "5",
    ])
    .unwrap();
    let config = RenderConfig::from_cli(&cli).unwrap();
    assert_eq!((config.width, config.height), (640, 320));
    assert_eq!(config.frame_limit, Some(5));
}

#[test]
fn test_from_cli_validates() {
    let cli = Cli::try_parse_from(["compute-raytracer", "--width", "1000"]).unwrap();
    assert!(matches!(
        RenderConfig::from_cli(&cli),
        Err(ConfigError::NotDivisible { axis: "width", .. })
    ));
}

#[test]
fn test_negative_pitch_limit_in_file_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("render.json");
    fs::write(&path, r#"{ "camera": { "pitch_limit": -0.5 } }"#).unwrap();

    let cli = Cli::try_parse_from(["compute-raytracer", "--config", path.to_str().unwrap()])
        .unwrap();
    assert!(matches!(
        RenderConfig::from_cli(&cli),
        Err(ConfigError::PitchLimit(_))
    ));
}
