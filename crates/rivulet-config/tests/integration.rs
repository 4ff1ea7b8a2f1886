//! Integration tests for rivulet-config.
//!
//! These tests verify file round trips and that loaded settings drive a
//! working engine.

use rivulet_config::{ConfigError, EngineConfig};
use rivulet_core::{Engine, Patch, Unit};
use tempfile::TempDir;

/// Save to a nested path, load it back, get the same settings.
#[test]
fn test_save_and_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("engine.toml");
    let config = EngineConfig {
        sample_rate: 96_000.0,
        block_size: 512,
        control_block_size: 128,
        channels: 4,
        ..EngineConfig::default()
    };

    config.save(&path).unwrap();
    assert!(path.exists());
    assert_eq!(EngineConfig::load(&path).unwrap(), config);
}

/// A partial file fills the rest from defaults.
#[test]
fn test_load_partial_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engine.toml");
    std::fs::write(&path, "channels = 1\npatch_fade_seconds = 0.0\n").unwrap();

    let config = EngineConfig::load(&path).unwrap();
    assert_eq!(config.channels, 1);
    assert_eq!(config.patch_fade_seconds, 0.0);
    assert_eq!(config.block_size, EngineConfig::default().block_size);
}

/// Missing files report the path.
#[test]
fn test_load_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    let err = EngineConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFile { .. }));
    assert!(err.to_string().contains("absent.toml"), "got: {err}");
}

/// Settings from a file build an engine that renders with them.
#[test]
fn test_config_drives_engine() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engine.toml");
    std::fs::write(
        &path,
        "sample_rate = 1000.0\nblock_size = 4\ncontrol_block_size = 2\npatch_fade_seconds = 0.0\n",
    )
    .unwrap();
    let config = EngineConfig::load(&path).unwrap();
    let ctx = config.to_context().unwrap();

    let (patch, handle) = Patch::unit(&Unit::constant(&ctx, 0.0), config.patch_options());
    let mut engine = Engine::new(&ctx, patch);
    handle.set(Unit::constant(&ctx, 0.5));

    let mut out = vec![0.0; config.block_size * 2];
    engine.process(&mut [&mut out[..]]).unwrap();
    assert!(out.iter().all(|&s| s == 0.5));
}
