// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use pano_capture::PanoramaConfig;
use pano_capture::errors::PanoError;
use pano_capture::pipelines::panorama::BlendWeights;
use std::path::PathBuf;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("pano-config-{}", uuid::Uuid::new_v4()))
        .join(name)
}

#[test]
fn test_config_default() {
    // Test that default config can be created
    let config = PanoramaConfig::default();

    // Check sensible defaults
    assert_eq!(config.max_frames, 6);
    assert_eq!(config.key_frame_quality, 100);
    assert_eq!(config.blend_weights, BlendWeights::Quantized);
    assert!(config.output_dir.is_none());
    assert!(config.output_dir().ends_with("Panorama"));
}

#[test]
fn test_missing_file_uses_defaults() {
    let config = PanoramaConfig::load(Some(&temp_path("missing.json"))).unwrap();
    assert_eq!(config, PanoramaConfig::default());
}

#[test]
fn test_save_and_load() {
    let path = temp_path("config.json");
    let config = PanoramaConfig {
        max_frames: 8,
        blend_weights: BlendWeights::Linear,
        output_dir: Some(PathBuf::from("/tmp/panoramas")),
        ..Default::default()
    };
    config.save(&path).unwrap();

    let loaded = PanoramaConfig::load(Some(&path)).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.output_dir(), PathBuf::from("/tmp/panoramas"));

    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
}

#[test]
fn test_partial_file_fills_defaults() {
    let path = temp_path("partial.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, r#"{ "max_frames": 4 }"#).unwrap();

    let config = PanoramaConfig::load(Some(&path)).unwrap();
    assert_eq!(config.max_frames, 4);
    assert_eq!(config.thumbnail_size, PanoramaConfig::default().thumbnail_size);

    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
}

#[test]
fn test_invalid_files_rejected() {
    let path = temp_path("bad.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();

    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        PanoramaConfig::load(Some(&path)),
        Err(PanoError::Config(_))
    ));

    std::fs::write(&path, r#"{ "max_frames": 40 }"#).unwrap();
    assert!(matches!(
        PanoramaConfig::load(Some(&path)),
        Err(PanoError::Config(_))
    ));

    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
}
