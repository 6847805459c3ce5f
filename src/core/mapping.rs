//! Declared renames for one run.
//!
//! Two line-oriented, `|`-delimited files:
//! - package mismatches: `filePath|oldNamespace|newNamespace`
//! - symbol renames: `oldQualifiedName|newQualifiedName`
//!
//! Blank lines, `#` comments and malformed records are skipped. A configured
//! file that cannot be read aborts the run before any source file is touched.

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::plan::{RenameRule, RuleKind};

const DELIMITER: char = '|';

/// A file whose namespace declaration must move from one namespace to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageMismatch {
    /// Project-relative path, `/`-separated.
    pub file_path: String,
    pub old_namespace: String,
    pub new_namespace: String,
}

/// Counters reported back to the caller after loading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub package_records: usize,
    pub symbol_records: usize,
    pub skipped_lines: usize,
}

/// Canonical rename declarations. Read-only once loaded.
#[derive(Debug, Clone, Default)]
pub struct MappingStore {
    pub mismatches: Vec<PackageMismatch>,
    pub symbol_renames: Vec<RenameRule>,
    pub stats: LoadStats,
}

impl MappingStore {
    /// Load whichever mapping files are configured. Each configured path is required.
    ///
    /// Mismatch file paths are re-keyed relative to `root`, so an absolute or
    /// `..`-laden path names the same file the walker finds.
    pub fn load(
        root: &Path,
        package_mapping: Option<&Path>,
        symbol_mapping: Option<&Path>,
    ) -> Result<Self> {
        let mut store = MappingStore::default();

        if let Some(path) = package_mapping {
            let content = read_mapping(path)?;
            let (parsed, skipped) = parse_package_mismatches(&content);
            let mismatches = keep_last_per_file(
                parsed
                    .into_iter()
                    .map(|m| PackageMismatch {
                        file_path: project_relative(root, &m.file_path),
                        ..m
                    })
                    .collect(),
            );
            store.stats.package_records = mismatches.len();
            store.stats.skipped_lines += skipped;
            store.mismatches = mismatches;
        }

        if let Some(path) = symbol_mapping {
            let content = read_mapping(path)?;
            let (renames, skipped) = parse_symbol_renames(&content);
            store.stats.symbol_records = renames.len();
            store.stats.skipped_lines += skipped;
            store.symbol_renames = renames;
        }

        crate::log_status!(
            "mapping",
            "{} package mismatch(es), {} symbol rename(s), {} line(s) skipped",
            store.stats.package_records,
            store.stats.symbol_records,
            store.stats.skipped_lines
        );

        Ok(store)
    }

    /// The mismatch declared for a project-relative file path, if any.
    pub fn mismatch_for(&self, relative: &str) -> Option<&PackageMismatch> {
        let wanted = normalize_path(relative);
        self.mismatches.iter().find(|m| m.file_path == wanted)
    }
}

fn read_mapping(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::mapping_load_failed(path.display().to_string(), e.to_string()))
}

/// Normalize a mapping path so it compares equal to walker output.
pub fn normalize_path(path: &str) -> String {
    let unified = path.trim().replace('\\', "/");
    let mut rest = unified.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest.to_string()
}

/// Drop `.` segments and fold `..` into its parent. Leading `..` that escape
/// the start are kept.
fn collapse_dots(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(last) if *last != ".." => {
                    parts.pop();
                }
                _ => parts.push(".."),
            },
            _ => parts.push(part),
        }
    }
    parts.join("/")
}

/// Key a configured path the way the walker keys files under `root`.
///
/// Absolute paths inside the root become relative, comparing canonical forms
/// when the literal prefix differs. Absolute paths outside the root are kept.
pub fn project_relative(root: &Path, path: &str) -> String {
    let normalized = normalize_path(path);
    let candidate = Path::new(&normalized);
    if !candidate.is_absolute() {
        return collapse_dots(&normalized);
    }

    let inside = candidate
        .strip_prefix(root)
        .ok()
        .map(Path::to_path_buf)
        .or_else(|| {
            let root = std::fs::canonicalize(root).ok()?;
            let full = std::fs::canonicalize(candidate).ok()?;
            full.strip_prefix(&root).ok().map(Path::to_path_buf)
        });

    match inside {
        Some(rest) => collapse_dots(&normalize_path(&rest.to_string_lossy())),
        None => normalized,
    }
}

/// A file listed twice keeps its last declaration, at its first position.
fn keep_last_per_file(mismatches: Vec<PackageMismatch>) -> Vec<PackageMismatch> {
    let mut kept: Vec<PackageMismatch> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for mismatch in mismatches {
        match index.get(&mismatch.file_path) {
            Some(&i) => kept[i] = mismatch,
            None => {
                index.insert(mismatch.file_path.clone(), kept.len());
                kept.push(mismatch);
            }
        }
    }

    kept
}

/// Split a record into exactly `arity` non-empty trimmed fields.
fn split_record(line: &str, arity: usize) -> Option<Vec<&str>> {
    let fields: Vec<&str> = line.split(DELIMITER).map(str::trim).collect();
    if fields.len() != arity || fields.iter().any(|f| f.is_empty()) {
        return None;
    }
    Some(fields)
}

fn is_ignorable(line: &str) -> bool {
    line.is_empty() || line.starts_with('#')
}

/// Parse package-mismatch records. Returns the records and the number of
/// malformed lines that were skipped.
///
/// A file listed twice keeps its last declaration.
pub fn parse_package_mismatches(content: &str) -> (Vec<PackageMismatch>, usize) {
    let mut mismatches: Vec<PackageMismatch> = Vec::new();
    let mut skipped = 0;

    for line in content.lines() {
        let line = line.trim();
        if is_ignorable(line) {
            continue;
        }

        let Some(fields) = split_record(line, 3) else {
            skipped += 1;
            continue;
        };

        if fields[1] == fields[2] {
            skipped += 1;
            continue;
        }

        mismatches.push(PackageMismatch {
            file_path: normalize_path(fields[0]),
            old_namespace: fields[1].to_string(),
            new_namespace: fields[2].to_string(),
        });
    }

    (keep_last_per_file(mismatches), skipped)
}

/// Parse explicit symbol renames. Duplicated `old` names keep the last
/// declaration; `old == new` records are no-ops and are skipped.
pub fn parse_symbol_renames(content: &str) -> (Vec<RenameRule>, usize) {
    let mut renames: Vec<RenameRule> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut skipped = 0;

    for line in content.lines() {
        let line = line.trim();
        if is_ignorable(line) {
            continue;
        }

        let Some(fields) = split_record(line, 2) else {
            skipped += 1;
            continue;
        };

        let Some(rule) = RenameRule::new(fields[0], fields[1], RuleKind::Symbol) else {
            skipped += 1;
            continue;
        };

        match index.get(&rule.old) {
            Some(&i) => renames[i] = rule,
            None => {
                index.insert(rule.old.clone(), renames.len());
                renames.push(rule);
            }
        }
    }

    (renames, skipped)
}
