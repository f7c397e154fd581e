use dgcatalog::actions::LinkError;
use dgcatalog::catalog::statistics::{FILES_CONSOLIDATED, FILES_DEDUPLICATED, SYMLINKS_CREATED};
use dgcatalog::catalog::{Catalog, CatalogOptions, PathType, RetryPolicy};
use dgcatalog::dedupe::{DedupeConfig, DedupeError, DedupeSummary, Deduplicator};
use dgcatalog::error::ExitCode;
use dgcatalog::scanner::{ScanConfig, Scanner};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

fn open(root: &Path) -> Catalog {
    Catalog::initialize(
        CatalogOptions::new(root).with_retry(RetryPolicy::new(2, Duration::from_millis(5))),
    )
    .expect("Failed to initialize catalog")
}

fn write(root: &Path, rel: &str, content: &[u8]) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    fs::canonicalize(path).unwrap()
}

fn pattern(seed: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(17).wrapping_add(seed)).collect()
}

fn scan(catalog: &Catalog, skip_hash: bool) {
    let config = ScanConfig {
        skip_hash,
        ..ScanConfig::default()
    };
    let summary = Scanner::new(catalog, config).scan(None).unwrap();
    assert!(summary.errors.is_empty(), "{:?}", summary.errors);
}

fn dedupe(catalog: &Catalog, dry_run: bool) -> DedupeSummary {
    Deduplicator::new(
        catalog,
        DedupeConfig {
            dry_run,
            assume_yes: true,
            ..DedupeConfig::default()
        },
    )
    .run()
    .unwrap()
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

// ==================== End-to-End Tests ====================

#[test]
#[cfg(unix)]
fn test_three_identical_files() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let content = pattern(1, 6000);
    write(dir.path(), "2024/01/0115/a/clip.mp4", &content);
    let b = write(dir.path(), "2024/01/0116/b/clip.mp4", &content);
    let c = write(dir.path(), "2024/02/0201/c/clip.mp4", &content);
    let catalog = open(dir.path());
    scan(&catalog, false);

    let groups = catalog.duplicates().pending_groups().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].duplicate_count, 2);
    let master_id = groups[0].master_file_id.unwrap();

    let summary = dedupe(&catalog, false);

    assert!(summary.errors.is_empty(), "{:?}", summary.errors);
    assert_eq!(summary.exit_code(), ExitCode::Success);
    assert_eq!(summary.files_consolidated, 1);
    assert_eq!(summary.symlinks_created, 2);
    assert_eq!(summary.files_deduplicated, 3);
    assert_eq!(summary.bytes_reclaimed, 12000);

    let master = catalog
        .paths()
        .master_consolidated_path(master_id)
        .unwrap()
        .expect("master consolidated");
    assert!(master.starts_with(catalog.files_dir()));
    assert_eq!(fs::read(&master).unwrap(), content);

    for dup in [&b, &c] {
        assert!(is_symlink(dup));
        let target = fs::read_link(dup).unwrap();
        assert!(target.is_relative(), "absolute link target {}", target.display());
        assert_eq!(fs::canonicalize(dup).unwrap(), fs::canonicalize(&master).unwrap());
    }

    let stats = catalog.statistics();
    assert_eq!(stats.get_counter(FILES_DEDUPLICATED).unwrap(), 3);
    assert_eq!(stats.get_counter(SYMLINKS_CREATED).unwrap(), 2);
    assert_eq!(stats.get_counter(FILES_CONSOLIDATED).unwrap(), 1);
    assert!(catalog
        .duplicates()
        .find_group(&groups[0].hash)
        .unwrap()
        .unwrap()
        .is_complete());
    assert!(catalog.files().list_pending().unwrap().is_empty());
}

#[test]
#[cfg(unix)]
fn test_second_run_is_a_no_op() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let content = pattern(2, 6000);
    write(dir.path(), "2024/01/0115/a/clip.mp4", &content);
    write(dir.path(), "2024/01/0115/b/clip.mp4", &content);
    write(dir.path(), "2024/01/0115/c/unique.mp4", &pattern(3, 7000));
    let catalog = open(dir.path());
    scan(&catalog, false);
    dedupe(&catalog, false);
    let stats_before = catalog.statistics().list().unwrap();

    let second = dedupe(&catalog, false);

    assert_eq!(second.files_consolidated, 0);
    assert_eq!(second.symlinks_created, 0);
    assert_eq!(second.files_deduplicated, 0);
    assert!(second.errors.is_empty());
    assert_eq!(catalog.statistics().list().unwrap(), stats_before);
}

#[test]
#[cfg(unix)]
fn test_rescan_after_dedupe_adds_nothing() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let content = pattern(4, 6000);
    write(dir.path(), "2024/01/0115/a/clip.mp4", &content);
    write(dir.path(), "2024/01/0115/b/clip.mp4", &content);
    let catalog = open(dir.path());
    scan(&catalog, false);
    dedupe(&catalog, false);

    let summary = Scanner::new(&catalog, ScanConfig::default()).scan(None).unwrap();

    assert_eq!(summary.files_added, 0);
    assert!(catalog.files().list_pending().unwrap().is_empty());
}

// ==================== Failure Handling Tests ====================

#[test]
fn test_removed_duplicate_is_marked_without_link() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let content = pattern(5, 6000);
    write(dir.path(), "2024/01/0115/a/clip.mp4", &content);
    let b = write(dir.path(), "2024/01/0115/b/clip.mp4", &content);
    let catalog = open(dir.path());
    scan(&catalog, false);
    fs::remove_file(&b).unwrap();

    let summary = dedupe(&catalog, false);

    assert!(summary.errors.is_empty(), "{:?}", summary.errors);
    assert_eq!(summary.symlinks_created, 0);
    assert!(!b.exists() && !is_symlink(&b));
    assert!(catalog.files().list_pending().unwrap().is_empty());
}

#[test]
fn test_removed_unique_file_is_reported() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let gone = write(dir.path(), "2024/01/0115/a/gone.mp4", b"video");
    let catalog = open(dir.path());
    scan(&catalog, false);
    fs::remove_file(&gone).unwrap();

    let summary = dedupe(&catalog, false);

    assert_eq!(summary.exit_code(), ExitCode::PartialSuccess);
    assert!(matches!(&summary.errors[0], DedupeError::SourceMissing(p) if *p == gone));
    assert_eq!(catalog.files().list_pending().unwrap().len(), 1);
}

#[test]
#[cfg(unix)]
fn test_deep_duplicate_is_not_linked() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let content = pattern(6, 6000);
    write(dir.path(), "2024/01/0115/a/clip.mp4", &content);
    let nested: String = (0..20).map(|i| format!("n{i}/")).collect();
    let deep = write(
        dir.path(),
        &format!("2024/01/0115/b/{nested}clip.mp4"),
        &content,
    );
    let catalog = open(dir.path());
    scan(&catalog, false);

    let summary = dedupe(&catalog, false);

    assert_eq!(summary.files_consolidated, 1);
    assert_eq!(summary.symlinks_created, 0);
    assert_eq!(summary.errors.len(), 1);
    assert!(matches!(
        &summary.errors[0],
        DedupeError::Link(LinkError::TooDeep { depth, .. }) if *depth >= 20
    ));
    assert!(!is_symlink(&deep));
    assert_eq!(fs::read(&deep).unwrap(), content);

    let group = &catalog.duplicates().pending_groups().unwrap()[0];
    assert!(!group.is_complete());
}

#[test]
fn test_same_name_files_get_distinct_consolidated_paths() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    write(dir.path(), "2024/01/0115/a/clip.mp4", b"first");
    write(dir.path(), "2024/01/0115/b/clip.mp4", b"second");
    let catalog = open(dir.path());
    scan(&catalog, true);

    let summary = dedupe(&catalog, false);

    assert_eq!(summary.files_consolidated, 2);
    let shard = catalog.files_dir().join("00").join("00");
    let mut contents: Vec<Vec<u8>> = ["no_hash_clip.mp4", "no_hash_clip_1.mp4"]
        .iter()
        .map(|name| fs::read(shard.join(name)).unwrap())
        .collect();
    contents.sort();
    assert_eq!(contents, vec![b"first".to_vec(), b"second".to_vec()]);
}

// ==================== Resume Tests ====================

/// Move a file into the consolidation area and record the path, leaving
/// its status untouched, as an interrupted run would.
fn move_without_marking(catalog: &Catalog, original: &Path) -> PathBuf {
    let file = catalog
        .files()
        .list_pending()
        .unwrap()
        .into_iter()
        .find(|f| f.original_path == original)
        .expect("file cataloged");
    let destination = catalog.files_dir().join("ab").join("cd").join(&file.file_name);
    fs::create_dir_all(destination.parent().unwrap()).unwrap();
    fs::rename(original, &destination).unwrap();
    catalog
        .paths()
        .add_path(file.id, &destination, PathType::Consolidated)
        .unwrap();
    destination
}

#[test]
fn test_interrupted_unique_move_is_resumed() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let a = write(dir.path(), "2024/01/0115/a/clip.mp4", b"video");
    let catalog = open(dir.path());
    scan(&catalog, false);
    let moved = move_without_marking(&catalog, &a);

    let summary = dedupe(&catalog, false);

    assert!(summary.errors.is_empty(), "{:?}", summary.errors);
    assert_eq!(summary.exit_code(), ExitCode::Success);
    assert_eq!(summary.files_consolidated, 0);
    assert_eq!(summary.files_deduplicated, 1);
    assert_eq!(fs::read(&moved).unwrap(), b"video");
    assert!(catalog.files().list_pending().unwrap().is_empty());

    let second = dedupe(&catalog, false);
    assert!(second.errors.is_empty(), "{:?}", second.errors);
    assert_eq!(second.files_deduplicated, 0);
}

#[test]
#[cfg(unix)]
fn test_interrupted_master_move_is_resumed() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let content = pattern(8, 6000);
    let a = write(dir.path(), "2024/01/0115/a/clip.mp4", &content);
    let b = write(dir.path(), "2024/01/0115/b/clip.mp4", &content);
    let catalog = open(dir.path());
    scan(&catalog, false);
    let moved = move_without_marking(&catalog, &a);

    let summary = dedupe(&catalog, false);

    assert!(summary.errors.is_empty(), "{:?}", summary.errors);
    assert_eq!(summary.exit_code(), ExitCode::Success);
    assert_eq!(summary.files_consolidated, 0);
    assert_eq!(summary.symlinks_created, 1);
    assert_eq!(summary.files_deduplicated, 2);
    assert!(is_symlink(&b));
    assert_eq!(fs::canonicalize(&b).unwrap(), fs::canonicalize(&moved).unwrap());
    assert!(catalog.files().list_pending().unwrap().is_empty());
    assert!(catalog.duplicates().pending_groups().unwrap().iter().all(|g| g.is_complete()));
}

// ==================== Dry Run Tests ====================

#[test]
fn test_dry_run_changes_nothing() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let content = pattern(7, 6000);
    let a = write(dir.path(), "2024/01/0115/a/clip.mp4", &content);
    let b = write(dir.path(), "2024/01/0115/b/clip.mp4", &content);
    write(dir.path(), "2024/01/0115/c/x.mp4", b"same-name-a");
    write(dir.path(), "2024/01/0115/d/x.mp4", b"same-name-b");
    let catalog = open(dir.path());
    scan(&catalog, false);
    let pending_before = catalog.files().list_pending().unwrap();

    let summary = dedupe(&catalog, true);

    assert!(summary.dry_run);
    assert!(summary.errors.is_empty(), "{:?}", summary.errors);
    assert_eq!(summary.files_consolidated, 3);
    assert_eq!(summary.symlinks_created, 1);
    assert_eq!(summary.files_deduplicated, 4);
    assert!(summary.render(10).contains("[DRY RUN]"));

    assert!(!catalog.files_dir().exists());
    assert_eq!(fs::read(&a).unwrap(), content);
    assert!(!is_symlink(&b));
    assert_eq!(catalog.files().list_pending().unwrap(), pending_before);
    assert_eq!(catalog.statistics().get_counter(FILES_DEDUPLICATED).unwrap(), 0);
}
