use dgcatalog::catalog::statistics::{
    DUPLICATE_FILES, DUPLICATE_GROUPS, SPACE_SAVED_BYTES, SPACE_SAVED_PERCENTAGE, TOTAL_FILES,
    TOTAL_SIZE_BYTES, UNIQUE_FILES,
};
use dgcatalog::catalog::{
    Catalog, CatalogOptions, DedupCounters, Hierarchy, NewFile, PathType, CONSOLIDATION_DIR_NAME,
    DB_FILENAME,
};
use std::path::Path;
use tempfile::TempDir;

const HASH: &str = "aabbccddeeff00112233445566778899";

fn add(catalog: &Catalog, name: &str, size: u64) -> i64 {
    let path = catalog.scan_root().join(name);
    let id = catalog
        .files()
        .upsert(&NewFile {
            original_path: path.clone(),
            file_name: name.to_string(),
            size,
            created_at: None,
            hierarchy: Hierarchy::default(),
        })
        .unwrap();
    catalog.paths().add_path(id, &path, PathType::Original).unwrap();
    id
}

// ==================== Layout Tests ====================

#[test]
fn test_initialize_creates_hidden_catalog() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let catalog = Catalog::initialize(CatalogOptions::new(dir.path())).unwrap();

    let consolidation = catalog.consolidation_dir();
    assert!(consolidation.is_dir());
    assert_eq!(consolidation.file_name().unwrap(), CONSOLIDATION_DIR_NAME);
    assert_eq!(catalog.catalog_path(), consolidation.join(DB_FILENAME));
    assert!(catalog.catalog_path().is_file());
    assert!(!catalog.files_dir().exists());
}

#[test]
fn test_separate_consolidation_root_and_catalog_path() {
    let media = TempDir::new().expect("Failed to create temp dir");
    let store = TempDir::new().expect("Failed to create temp dir");
    let db = store.path().join("elsewhere").join("catalog.db");

    let catalog = Catalog::initialize(
        CatalogOptions::new(media.path())
            .with_consolidation_root(Some(store.path().to_path_buf()))
            .with_catalog_path(Some(db.clone())),
    )
    .unwrap();

    assert!(catalog
        .consolidation_dir()
        .starts_with(std::fs::canonicalize(store.path()).unwrap()));
    assert_eq!(catalog.catalog_path(), db.as_path());
    assert!(db.is_file());
    assert!(!media.path().join(CONSOLIDATION_DIR_NAME).exists());
}

#[test]
fn test_catalog_survives_reopen() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    {
        let catalog = Catalog::initialize(CatalogOptions::new(dir.path())).unwrap();
        add(&catalog, "a.mp4", 10);
        catalog.close();
    }
    let catalog = Catalog::initialize(CatalogOptions::new(dir.path())).unwrap();
    assert!(catalog
        .files()
        .exists_by_path(&catalog.scan_root().join("a.mp4"))
        .unwrap());
    assert!(!catalog.files().exists_by_path(Path::new("/nope.mp4")).unwrap());
}

// ==================== Statistics Tests ====================

#[test]
fn test_refresh_statistics() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let catalog = Catalog::initialize(CatalogOptions::new(dir.path())).unwrap();
    let a = add(&catalog, "a.mp4", 100);
    let b = add(&catalog, "b.mp4", 100);
    add(&catalog, "c.mp4", 200);
    catalog.files().set_hash(a, HASH).unwrap();
    catalog.files().set_hash(b, HASH).unwrap();
    catalog.duplicates().reconcile_group(HASH).unwrap();

    let stats = catalog.statistics();
    stats.refresh().unwrap();

    assert_eq!(stats.get_counter(TOTAL_FILES).unwrap(), 3);
    assert_eq!(stats.get_counter(TOTAL_SIZE_BYTES).unwrap(), 400);
    assert_eq!(stats.get_counter(UNIQUE_FILES).unwrap(), 2);
    assert_eq!(stats.get_counter(DUPLICATE_FILES).unwrap(), 1);
    assert_eq!(stats.get_counter(DUPLICATE_GROUPS).unwrap(), 1);
    assert_eq!(stats.get_counter(SPACE_SAVED_BYTES).unwrap(), 100);
    assert_eq!(
        stats.get(SPACE_SAVED_PERCENTAGE).unwrap().unwrap().value,
        "25.00"
    );
}

#[test]
fn test_refresh_keeps_engine_counters() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let catalog = Catalog::initialize(CatalogOptions::new(dir.path())).unwrap();
    let stats = catalog.statistics();

    stats
        .record_deduplication_counters(DedupCounters {
            files_consolidated: 2,
            symlinks_created: 1,
            files_deduplicated: 3,
        })
        .unwrap();
    stats.refresh().unwrap();
    stats
        .record_deduplication_counters(DedupCounters {
            files_consolidated: 1,
            symlinks_created: 0,
            files_deduplicated: 1,
        })
        .unwrap();

    assert_eq!(stats.get_counter("files_consolidated").unwrap(), 3);
    assert_eq!(stats.get_counter("symlinks_created").unwrap(), 1);
    assert_eq!(stats.get_counter("files_deduplicated").unwrap(), 4);
}
