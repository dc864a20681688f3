//! Configuration files feeding the run context

use loom::cli::RunContext;
use loom::config::{ConfigLoader, LoomConfig};
use loom::error::ApiError;
use std::fs;
use tempfile::TempDir;

#[test]
fn explicit_file_drives_the_run_context() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("state");
    let path = dir.path().join("loom.toml");
    fs::write(
        &path,
        format!(
            "[system]\ndata_dir = \"{}\"\n\n[executor]\nmax_workers = 2\nhistory_depth = 16\n\n[logging]\nlevel = \"warn\"\n",
            data_dir.display()
        ),
    )
    .unwrap();

    let config = ConfigLoader::load_validated(dir.path(), Some(&path)).unwrap();
    assert_eq!(config.executor.max_workers, 2);
    assert_eq!(config.executor.history_depth, 16);
    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.logging.output, "stderr");

    let ctx = RunContext::new(dir.path().to_path_buf(), config).unwrap();
    assert!(data_dir.join("store").is_dir());
    assert_eq!(ctx.config().executor.max_workers, 2);
}

#[test]
fn rendered_config_loads_back() {
    let dir = TempDir::new().unwrap();
    let mut config = LoomConfig::default();
    config.system.data_dir = dir.path().join("data");
    config.executor.max_workers = 3;
    let path = dir.path().join("rendered.toml");
    fs::write(&path, config.to_toml().unwrap()).unwrap();

    let loaded = ConfigLoader::load_from_file(&path).unwrap();
    assert_eq!(loaded.system.data_dir, config.system.data_dir);
    assert_eq!(loaded.executor.max_workers, 3);
}

#[test]
fn invalid_settings_are_all_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(
        &path,
        "[executor]\nmax_workers = 0\n\n[logging]\nformat = \"yaml\"\n",
    )
    .unwrap();

    let err = ConfigLoader::load_validated(dir.path(), Some(&path)).unwrap_err();
    let ApiError::ConfigError(message) = err else {
        panic!("expected a configuration error");
    };
    assert!(message.contains("max_workers"));
    assert!(message.contains("yaml"));
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = ConfigLoader::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ApiError::ConfigError(ref m) if m.contains("not found")));
}
