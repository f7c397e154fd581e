use dgcatalog::config::Config;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_full_config_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("dgcatalog.toml");
    fs::write(
        &path,
        r#"
consolidation_root = "/srv/store"
catalog_path = "/srv/store/catalog.db"
max_link_depth = 12
error_display_limit = 3
skip_hash = true
video_extensions = ["mp4", ".MOV"]

[retry]
max_attempts = 7
base_delay_ms = 50
"#,
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();

    assert_eq!(config.consolidation_root, Some(PathBuf::from("/srv/store")));
    assert_eq!(config.catalog_path, Some(PathBuf::from("/srv/store/catalog.db")));
    assert_eq!(config.max_link_depth, 12);
    assert_eq!(config.error_display_limit, 3);
    assert!(config.skip_hash);
    assert_eq!(config.video_extensions, vec!["mp4", ".MOV"]);
    assert_eq!(config.retry.policy().max_attempts, 7);
}

#[test]
fn test_invalid_value_is_rejected() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("dgcatalog.toml");
    fs::write(&path, "max_link_depth = \"deep\"\n").unwrap();

    assert!(Config::load(Some(&path)).is_err());
}

#[test]
fn test_empty_file_yields_defaults() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("dgcatalog.toml");
    fs::write(&path, "").unwrap();

    let config = Config::load_from_path(Some(&path)).unwrap();

    assert_eq!(config.max_link_depth, Config::default().max_link_depth);
    assert_eq!(config.video_extensions, Config::default().video_extensions);
}
