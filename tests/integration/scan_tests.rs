use dgcatalog::catalog::{Catalog, CatalogOptions, PathType, RetryPolicy};
use dgcatalog::scanner::{ScanConfig, ScanError, Scanner, HASH_SKIPPED};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn open(root: &Path) -> Catalog {
    Catalog::initialize(
        CatalogOptions::new(root).with_retry(RetryPolicy::new(2, Duration::from_millis(5))),
    )
    .expect("Failed to initialize catalog")
}

fn write(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn pattern(seed: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

// ==================== Hierarchy Tests ====================

#[test]
fn test_scan_registers_hierarchy() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    write(dir.path(), "2024/01/0115/shoot/clip.MP4", b"video");
    write(dir.path(), "2024/01/0115/shoot/notes.txt", b"text");
    write(dir.path(), "2024/01/0115/shoot/raw/take2.mov", b"take");
    write(dir.path(), "2024/.hidden/0101/x/skip.mp4", b"hidden");
    let catalog = open(dir.path());

    let summary = Scanner::new(&catalog, ScanConfig::default()).scan(None).unwrap();

    assert_eq!(summary.projects, 1);
    assert_eq!(summary.files_added, 2);
    assert!(summary.errors.is_empty());

    let files = catalog.files().list_pending().unwrap();
    assert_eq!(files.len(), 2);
    let clip = files.iter().find(|f| f.file_name == "clip.MP4").unwrap();
    assert_eq!(clip.hierarchy.year, "2024");
    assert_eq!(clip.hierarchy.month, "01");
    assert_eq!(clip.hierarchy.month_day, "0115");
    assert_eq!(clip.hierarchy.project, "shoot");
    assert_eq!(clip.size, 5);

    let paths = catalog.paths().list_for_file(clip.id).unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].path_type, PathType::Original);
}

#[test]
fn test_rescan_skips_cataloged_files() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    write(dir.path(), "2024/01/0115/shoot/clip.mp4", b"video");
    let catalog = open(dir.path());
    let scanner = Scanner::new(&catalog, ScanConfig::default());

    scanner.scan(None).unwrap();
    let second = scanner.scan(None).unwrap();

    assert_eq!(second.files_added, 0);
    assert_eq!(second.files_skipped, 1);
    assert_eq!(catalog.files().list_pending().unwrap().len(), 1);
}

#[test]
fn test_subfolder_limits_scan() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    write(dir.path(), "2024/01/0115/a/one.mp4", b"1");
    write(dir.path(), "2024/02/0201/b/two.mp4", b"2");
    let catalog = open(dir.path());
    let scanner = Scanner::new(&catalog, ScanConfig::default());

    let summary = scanner.scan(Some(Path::new("2024/02"))).unwrap();

    assert_eq!(summary.files_added, 1);
    assert_eq!(catalog.files().list_pending().unwrap()[0].file_name, "two.mp4");

    assert!(matches!(
        scanner.scan(Some(Path::new("2024/03"))),
        Err(ScanError::NotFound(_))
    ));
}

// ==================== Grouping Tests ====================

#[test]
fn test_identical_files_form_group() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let content = pattern(7, 6000);
    write(dir.path(), "2024/01/0115/a/clip.mp4", &content);
    write(dir.path(), "2024/01/0116/b/copy.mp4", &content);
    write(dir.path(), "2024/02/0201/c/other.mp4", &pattern(9, 6000));
    let catalog = open(dir.path());

    let summary = Scanner::new(&catalog, ScanConfig::default()).scan(None).unwrap();

    assert_eq!(summary.files_hashed, 3);
    let groups = catalog.duplicates().pending_groups().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].duplicate_count, 1);
    assert_eq!(groups[0].space_saved, 6000);

    let members = catalog.duplicates().group_members(&groups[0].hash).unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(groups[0].master_file_id, Some(members[0].id));
    assert!(members[1].is_duplicate);
}

#[test]
fn test_unique_sizes_are_not_hashed() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    write(dir.path(), "2024/01/0115/a/one.mp4", &pattern(1, 100));
    write(dir.path(), "2024/01/0115/a/two.mp4", &pattern(2, 200));
    let catalog = open(dir.path());

    let summary = Scanner::new(&catalog, ScanConfig::default()).scan(None).unwrap();

    assert_eq!(summary.files_hashed, 0);
    assert!(catalog
        .files()
        .list_pending()
        .unwrap()
        .iter()
        .all(|f| f.hash.is_none()));
}

#[test]
fn test_later_scan_matches_cataloged_name_and_size() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let content = pattern(3, 8000);
    write(dir.path(), "2024/01/0115/a/Clip.mp4", &content);
    let catalog = open(dir.path());
    let scanner = Scanner::new(&catalog, ScanConfig::default());
    scanner.scan(None).unwrap();

    write(dir.path(), "2024/03/0301/b/clip.MP4", &content);
    scanner.scan(Some(Path::new("2024/03"))).unwrap();

    let groups = catalog.duplicates().pending_groups().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].duplicate_count, 1);
}

#[test]
fn test_skip_hash_never_groups() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let content = pattern(4, 6000);
    write(dir.path(), "2024/01/0115/a/x.mp4", &content);
    write(dir.path(), "2024/01/0115/b/x.mp4", &content);
    let catalog = open(dir.path());

    let config = ScanConfig {
        skip_hash: true,
        ..ScanConfig::default()
    };
    Scanner::new(&catalog, config).scan(None).unwrap();

    assert!(catalog.duplicates().pending_groups().unwrap().is_empty());
    assert!(catalog
        .files()
        .list_pending()
        .unwrap()
        .iter()
        .all(|f| f.hash.as_deref() != Some(HASH_SKIPPED)));
}
