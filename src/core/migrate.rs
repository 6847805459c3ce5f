//! Migration driver.
//!
//! Loads mappings, derives symbols, plans rules, then rewrites the tree.
//! Mapping and planning failures abort before any file is touched. Per-file
//! read/write failures are recorded in the report and the run continues.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use similar::TextDiff;

use crate::config::MigrationConfig;
use crate::declarations::{derive_symbol_rules, Derivation, PatternScanner};
use crate::error::{FileWarning, Result};
use crate::mapping::MappingStore;
use crate::plan::{build_plan, Plan, PlanOptions, PlanWarning, RuleSet};
use crate::rewrite::{rewrite, RewriteStats};
use crate::utils::io;
use crate::walker::{collect_files, SourceEntry, WalkOptions};

#[derive(Debug, Clone, Copy, Default)]
pub struct MigrateOptions {
    /// Write changed files back. Dry run otherwise.
    pub write: bool,
    /// Attach a unified diff to every edit.
    pub include_diff: bool,
}

/// A file whose content changes.
#[derive(Debug, Clone, Serialize)]
pub struct FileEdit {
    pub file: String,
    pub replacements: usize,
    #[serde(flatten)]
    pub stats: RewriteStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    pub applied: bool,
    #[serde(skip)]
    pub new_content: String,
    #[serde(skip)]
    path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub files_scanned: usize,
    pub files_changed: usize,
    pub total_replacements: usize,
    pub rules: usize,
    pub derived_symbols: usize,
    pub edits: Vec<FileEdit>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub plan_warnings: Vec<PlanWarning>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub file_warnings: Vec<FileWarning>,
    pub applied: bool,
}

impl MigrationReport {
    pub fn has_file_failures(&self) -> bool {
        !self.file_warnings.is_empty()
    }
}

/// Everything computed before the tree is touched.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub store: MappingStore,
    pub derivation: Derivation,
    pub plan: Plan,
}

/// Load mappings, derive symbol rules and build the ordered rule set.
pub fn prepare(root: &Path, config: &MigrationConfig) -> Result<Prepared> {
    config.validate()?;

    let store = MappingStore::load(
        root,
        config.package_mapping_path(root).as_deref(),
        config.symbol_mapping_path(root).as_deref(),
    )?;

    let scanner = PatternScanner::new(&config.exclude_symbols);
    let derivation = derive_symbol_rules(&store.mismatches, root, &scanner);

    let plan = build_plan(
        &store.symbol_renames,
        &derivation.rules,
        &store.mismatches,
        PlanOptions {
            allow_ambiguous: config.allow_ambiguous,
        },
    )?;

    Ok(Prepared {
        store,
        derivation,
        plan,
    })
}

struct Transformed {
    entry: SourceEntry,
    original: String,
    content: String,
    stats: RewriteStats,
}

fn transform(
    entry: &SourceEntry,
    store: &MappingStore,
    rules: &RuleSet,
    keyword: &str,
) -> Result<Option<Transformed>> {
    let original = io::read_source(&entry.path, &entry.relative)?;
    let mismatch = store.mismatch_for(&entry.relative);
    let result = rewrite(&original, mismatch, rules, keyword);

    if !result.changed {
        return Ok(None);
    }

    Ok(Some(Transformed {
        entry: entry.clone(),
        original,
        content: result.content,
        stats: result.stats,
    }))
}

fn unified_diff(relative: &str, old: &str, new: &str) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{}", relative), &format!("b/{}", relative))
        .to_string()
}

/// Run a full migration over the tree at `root`.
pub fn run(root: &Path, config: &MigrationConfig, options: MigrateOptions) -> Result<MigrationReport> {
    let prepared = prepare(root, config)?;
    let store = &prepared.store;
    let rules = &prepared.plan.rule_set;

    let mismatch_files: Vec<String> = store.mismatches.iter().map(|m| m.file_path.clone()).collect();
    let entries = collect_files(
        root,
        &WalkOptions {
            source_dir: &config.source_dir,
            extensions: &config.extensions,
            manifests: &config.manifests,
            extra_files: &mismatch_files,
            exclude: &config.exclude,
        },
    );

    let keyword = config.declaration_keyword.as_str();

    // Every read and transform completes before the first write.
    let outcomes: Vec<Result<Option<Transformed>>> = if config.parallel {
        entries
            .par_iter()
            .map(|entry| transform(entry, store, rules, keyword))
            .collect()
    } else {
        entries
            .iter()
            .map(|entry| transform(entry, store, rules, keyword))
            .collect()
    };

    let mut edits = Vec::new();
    let mut file_warnings = prepared.derivation.warnings.clone();

    for (entry, outcome) in entries.iter().zip(outcomes) {
        match outcome {
            Ok(Some(done)) => {
                let diff = options
                    .include_diff
                    .then(|| unified_diff(&done.entry.relative, &done.original, &done.content));
                edits.push(FileEdit {
                    file: done.entry.relative,
                    replacements: done.stats.replacements(),
                    stats: done.stats,
                    diff,
                    applied: false,
                    new_content: done.content,
                    path: done.entry.path,
                });
            }
            Ok(None) => {}
            Err(err) if err.code.is_per_file() => {
                file_warnings.push(FileWarning::from_error(entry.relative.clone(), &err))
            }
            Err(err) => return Err(err),
        }
    }

    crate::log_status!(
        "rewrite",
        "{} of {} file(s) need changes",
        edits.len(),
        entries.len()
    );

    if options.write {
        apply_edits(&mut edits, &mut file_warnings)?;
    }

    let total_replacements = edits.iter().map(|e| e.replacements).sum();

    Ok(MigrationReport {
        files_scanned: entries.len(),
        files_changed: edits.len(),
        total_replacements,
        rules: rules.len(),
        derived_symbols: prepared.derivation.symbol_count(),
        edits,
        plan_warnings: prepared.plan.warnings.clone(),
        file_warnings,
        applied: options.write,
    })
}

/// Write edits in path order. A per-file write failure is recorded and the rest proceed.
fn apply_edits(edits: &mut [FileEdit], warnings: &mut Vec<FileWarning>) -> Result<()> {
    let mut written = 0;
    for edit in edits.iter_mut() {
        match io::write_source_atomic(&edit.path, &edit.new_content, &edit.file) {
            Ok(()) => {
                edit.applied = true;
                written += 1;
            }
            Err(err) if err.code.is_per_file() => {
                warnings.push(FileWarning::from_error(edit.file.clone(), &err))
            }
            Err(err) => {
                crate::log_status!("write", "{} file(s) written before failure", written);
                return Err(err);
            }
        }
    }

    crate::log_status!("write", "{} file(s) written", written);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let src = root.join("src/old/pkg");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(root.join("src/app")).unwrap();

        fs::write(src.join("Foo.kt"), "package old.pkg\n\nclass Foo {\n    fun doThing() {}\n}\n")
            .unwrap();
        fs::write(
            root.join("src/app/Main.kt"),
            "package app\n\nimport old.pkg.Foo\n\nfun main() = old.pkg.Foo.doThing()\n",
        )
        .unwrap();
        fs::write(root.join("src/app/Other.kt"), "package app\n\nclass Other\n").unwrap();
        fs::write(
            root.join("package_mismatches.txt"),
            "src/old/pkg/Foo.kt|old.pkg|new.pkg\n",
        )
        .unwrap();
        dir
    }

    fn config() -> MigrationConfig {
        MigrationConfig {
            source_dir: "src".to_string(),
            manifests: vec![],
            symbol_mapping: None,
            ..Default::default()
        }
    }

    #[test]
    fn dry_run_reports_without_writing() {
        let dir = project();
        let report = run(dir.path(), &config(), MigrateOptions::default()).unwrap();

        assert_eq!(report.files_scanned, 3);
        assert_eq!(report.files_changed, 2);
        assert_eq!(report.derived_symbols, 1);
        assert!(!report.applied);
        assert!(report.edits.iter().all(|e| !e.applied));

        let main = fs::read_to_string(dir.path().join("src/app/Main.kt")).unwrap();
        assert!(main.contains("import old.pkg.Foo"));
    }

    #[test]
    fn write_applies_and_second_run_is_noop() {
        let dir = project();
        let options = MigrateOptions {
            write: true,
            include_diff: false,
        };

        let first = run(dir.path(), &config(), options).unwrap();
        assert_eq!(first.files_changed, 2);
        assert!(first.edits.iter().all(|e| e.applied));

        let main = fs::read_to_string(dir.path().join("src/app/Main.kt")).unwrap();
        assert_eq!(main, "package app\n\nimport new.pkg.Foo\n\nfun main() = new.pkg.Foo.doThing()\n");
        let foo = fs::read_to_string(dir.path().join("src/old/pkg/Foo.kt")).unwrap();
        assert!(foo.starts_with("package new.pkg\n"));

        let second = run(dir.path(), &config(), options).unwrap();
        assert_eq!(second.files_changed, 0);
    }

    #[test]
    fn parallel_run_matches_sequential() {
        let a = project();
        let b = project();
        let options = MigrateOptions {
            write: true,
            include_diff: true,
        };
        let mut parallel = config();
        parallel.parallel = true;

        let seq = run(a.path(), &config(), options).unwrap();
        let par = run(b.path(), &parallel, options).unwrap();

        let seq_files: Vec<_> = seq.edits.iter().map(|e| (&e.file, &e.diff)).collect();
        let par_files: Vec<_> = par.edits.iter().map(|e| (&e.file, &e.diff)).collect();
        assert_eq!(seq_files, par_files);
    }

    #[test]
    fn diff_is_attached_on_request() {
        let dir = project();
        let report = run(
            dir.path(),
            &config(),
            MigrateOptions {
                write: false,
                include_diff: true,
            },
        )
        .unwrap();

        let main = report.edits.iter().find(|e| e.file == "src/app/Main.kt").unwrap();
        let diff = main.diff.as_deref().unwrap();
        assert!(diff.contains("-import old.pkg.Foo"));
        assert!(diff.contains("+import new.pkg.Foo"));
    }

    #[test]
    fn missing_mapping_aborts_before_touching_files() {
        let dir = project();
        let mut cfg = config();
        cfg.symbol_mapping = Some("symbol_renames.txt".to_string());

        let err = run(
            dir.path(),
            &cfg,
            MigrateOptions {
                write: true,
                include_diff: false,
            },
        )
        .unwrap_err();

        assert_eq!(err.code.as_str(), "mapping.load_failed");
        let main = fs::read_to_string(dir.path().join("src/app/Main.kt")).unwrap();
        assert!(main.contains("old.pkg.Foo"));
    }

    #[test]
    fn absolute_mismatch_path_rewrites_file_once() {
        let dir = project();
        let absolute = dir.path().join("src/old/pkg/Foo.kt");
        fs::write(
            dir.path().join("package_mismatches.txt"),
            format!("{}|old.pkg|new.pkg\n", absolute.display()),
        )
        .unwrap();

        let report = run(
            dir.path(),
            &config(),
            MigrateOptions {
                write: true,
                include_diff: false,
            },
        )
        .unwrap();

        assert_eq!(report.files_scanned, 3);
        let files: Vec<&str> = report.edits.iter().map(|e| e.file.as_str()).collect();
        assert_eq!(files, vec!["src/app/Main.kt", "src/old/pkg/Foo.kt"]);
        let foo = fs::read_to_string(&absolute).unwrap();
        assert!(foo.starts_with("package new.pkg\n"));
    }

    #[test]
    fn dotted_mismatch_path_keeps_declaration_edit() {
        let dir = project();
        fs::write(
            dir.path().join("package_mismatches.txt"),
            "src/old/../old/pkg/Foo.kt|old.pkg|new.pkg\n",
        )
        .unwrap();

        let report = run(dir.path(), &config(), MigrateOptions::default()).unwrap();

        let foo = report
            .edits
            .iter()
            .find(|e| e.file == "src/old/pkg/Foo.kt")
            .unwrap();
        assert!(foo.stats.declaration);
        assert_eq!(report.files_changed, 2);
    }

    #[test]
    fn ambiguous_mapping_aborts() {
        let dir = project();
        fs::write(dir.path().join("src/old/pkg/Bar.kt"), "package old.pkg\n\nclass Bar\n").unwrap();
        fs::write(
            dir.path().join("package_mismatches.txt"),
            "src/old/pkg/Foo.kt|old.pkg|new.a\nsrc/old/pkg/Bar.kt|old.pkg|new.b\n",
        )
        .unwrap();

        let err = run(dir.path(), &config(), MigrateOptions::default()).unwrap_err();
        assert_eq!(err.code.as_str(), "mapping.ambiguous");
    }

    #[test]
    fn unreadable_file_is_reported_and_run_continues() {
        let dir = project();
        fs::write(dir.path().join("src/app/Broken.kt"), [0xff, 0xfe]).unwrap();

        let report = run(dir.path(), &config(), MigrateOptions::default()).unwrap();

        assert_eq!(report.files_changed, 2);
        assert!(report.has_file_failures());
        assert_eq!(report.file_warnings[0].file, "src/app/Broken.kt");
        assert_eq!(report.file_warnings[0].code, "file.read_failed");
    }
}
