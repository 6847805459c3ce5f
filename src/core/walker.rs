//! Resolve the candidate file list for a run.
//!
//! Files come from three places: every matching extension under the source
//! directory, configured singleton manifests, and the files named by package
//! mismatches. The result is de-duplicated and sorted by relative path.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use glob_match::glob_match;
use walkdir::{DirEntry, WalkDir};

use crate::mapping::project_relative;

/// Directories never descended into.
const ALWAYS_SKIP_DIRS: &[&str] = &[".git", ".gradle", ".idea", "build", "node_modules"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub path: PathBuf,
    /// Project-relative, `/`-separated.
    pub relative: String,
}

#[derive(Debug, Clone, Default)]
pub struct WalkOptions<'a> {
    pub source_dir: &'a str,
    pub extensions: &'a [String],
    pub manifests: &'a [String],
    pub extra_files: &'a [String],
    pub exclude: &'a [String],
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| ALWAYS_SKIP_DIRS.contains(&name))
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    extensions
        .iter()
        .any(|wanted| wanted.trim_start_matches('.') == ext)
}

fn relative_to(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    project_relative(root, &relative.to_string_lossy())
}

fn is_excluded(relative: &str, exclude: &[String]) -> bool {
    exclude.iter().any(|pattern| glob_match(pattern, relative))
}

/// Enumerate the files a run should consider, in lexicographic relative-path order.
pub fn collect_files(root: &Path, options: &WalkOptions<'_>) -> Vec<SourceEntry> {
    let mut files: BTreeMap<String, PathBuf> = BTreeMap::new();

    let source_root = root.join(options.source_dir);
    if source_root.is_dir() {
        let walker = WalkDir::new(&source_root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_skipped_dir(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| has_extension(e.path(), options.extensions));

        for entry in walker {
            let relative = relative_to(root, entry.path());
            files.insert(relative, entry.into_path());
        }
    } else {
        crate::log_status!(
            "walk",
            "Source directory {} not found; only singleton files will be rewritten",
            source_root.display()
        );
    }

    for singleton in options.manifests.iter().chain(options.extra_files) {
        let relative = project_relative(root, singleton);
        let path = root.join(&relative);
        if path.is_file() {
            files.entry(relative).or_insert(path);
        }
    }

    files
        .into_iter()
        .filter(|(relative, _)| !is_excluded(relative, options.exclude))
        .map(|(relative, path)| SourceEntry { path, relative })
        .collect()
}
