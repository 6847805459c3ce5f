use repackage::config::{ConfigOverrides, MigrationConfig};
use repackage::mapping::MappingStore;
use repackage::ErrorCode;
use std::fs;

#[test]
fn loads_both_mapping_files_and_counts_skipped_lines() {
    let dir = tempfile::tempdir().unwrap();
    let packages = dir.path().join("package_mismatches.txt");
    let symbols = dir.path().join("symbol_renames.txt");
    fs::write(
        &packages,
        "# header\n\nsrc/A.kt|a.old|a.new\nmalformed line\nsrc/B.kt|b.same|b.same\n",
    )
    .unwrap();
    fs::write(&symbols, "x.Old|x.New\nx.Old|x.Newer\ntoo|many|fields\n").unwrap();

    let store = MappingStore::load(dir.path(), Some(&packages), Some(&symbols)).unwrap();

    assert_eq!(store.mismatches.len(), 1);
    assert_eq!(store.mismatch_for("./src/A.kt").unwrap().new_namespace, "a.new");
    assert!(store.mismatch_for("src/B.kt").is_none());
    assert_eq!(store.symbol_renames.len(), 1);
    assert_eq!(store.symbol_renames[0].new, "x.Newer");
    assert_eq!(store.stats.skipped_lines, 3);
}

#[test]
fn missing_symbol_mapping_reports_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("symbol_renames.txt");

    let err = MappingStore::load(dir.path(), None, Some(&missing)).unwrap_err();

    assert_eq!(err.code, ErrorCode::MappingLoadFailed);
    assert_eq!(err.details["path"], missing.display().to_string());
}

#[test]
fn invalid_config_json_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("repackage.json"), "{ \"source_dir\": ").unwrap();

    let err = MigrationConfig::load(dir.path(), None).unwrap_err();

    assert_eq!(err.code, ErrorCode::ConfigInvalidJson);
    assert!(err.details["path"].as_str().unwrap().ends_with("repackage.json"));
}

#[test]
fn overrides_can_leave_nothing_to_migrate() {
    let mut config = MigrationConfig::default();
    config.package_mapping = None;
    config.apply(ConfigOverrides {
        no_symbol_mapping: true,
        ..Default::default()
    });

    let err = config.validate().unwrap_err();
    assert_eq!(err.code, ErrorCode::ConfigInvalidValue);
}
